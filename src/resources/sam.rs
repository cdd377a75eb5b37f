//! Serverless Application Repository deployments.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use super::Resource;
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Presence, Schema};
use crate::types::{is_dynamic_reference, Token};

/// CloudFormation type of a nested serverless application.
pub const APPLICATION_TYPE: &str = "AWS::Serverless::Application";

const APPLICATION_ARN_PREFIX: &str = "arn:aws:serverlessrepo:";

/// An instance of a published, versioned serverless application.
///
/// Every parameter value is a string once resolved. Parameters added with
/// [`ServerlessApplication::with_sensitive_parameter`] are expected to carry a
/// secret reference; a plain literal, or an inline `password=` value anywhere
/// in a joined value, produces a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessApplication {
    application_id: String,
    semantic_version: String,
    parameters: BTreeMap<String, Token>,
    sensitive: BTreeSet<String>,
}

impl ServerlessApplication {
    /// Pin a published application version.
    pub fn new(application_id: impl Into<String>, semantic_version: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            semantic_version: semantic_version.into(),
            parameters: BTreeMap::new(),
            sensitive: BTreeSet::new(),
        }
    }

    /// Set a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Token>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set a parameter that carries credentials.
    pub fn with_sensitive_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Token>,
    ) -> Self {
        let name = name.into();
        self.sensitive.insert(name.clone());
        self.parameters.insert(name, value.into());
        self
    }

    /// Properties schema.
    pub fn schema() -> Schema {
        Schema::new()
            .with_block(
                "Location",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("ApplicationId", Attribute::required_string())
                        .with_attribute("SemanticVersion", Attribute::required_string()),
                )
                .required(),
            )
            .with_attribute("Parameters", Attribute::optional_string_map())
            .with_attribute(
                "NotificationARNs",
                Attribute::new(AttributeType::list(AttributeType::String), Presence::Optional),
            )
            .with_attribute("Tags", Attribute::optional_string_map())
            .with_attribute("TimeoutInMinutes", Attribute::optional_int64())
    }
}

impl Resource for ServerlessApplication {
    fn resource_type(&self) -> &'static str {
        APPLICATION_TYPE
    }

    fn properties(&self) -> Value {
        let mut props = Map::new();
        props.insert(
            "Location".into(),
            json!({
                "ApplicationId": self.application_id,
                "SemanticVersion": self.semantic_version,
            }),
        );
        if !self.parameters.is_empty() {
            let params: Map<String, Value> = self
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect();
            props.insert("Parameters".into(), Value::Object(params));
        }
        Value::Object(props)
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if !self.application_id.starts_with(APPLICATION_ARN_PREFIX) {
            diagnostics.push(
                Diagnostic::error("Application id is not a serverless repository ARN")
                    .with_detail(format!(
                        "'{}' does not start with '{}'",
                        self.application_id, APPLICATION_ARN_PREFIX
                    ))
                    .with_attribute("Location.ApplicationId"),
            );
        }
        if self.semantic_version.trim().is_empty() {
            diagnostics.push(
                Diagnostic::error("Semantic version is empty")
                    .with_attribute("Location.SemanticVersion"),
            );
        }

        for (name, token) in &self.parameters {
            let path = format!("Parameters.{}", name);
            if token.render_static().is_some_and(|s| s.is_empty()) {
                diagnostics.push(
                    Diagnostic::error(format!("Parameter '{}' is empty", name))
                        .with_attribute(&path),
                );
            }
            if self.sensitive.contains(name) && embeds_plaintext(token) {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "Parameter '{}' embeds credentials in plaintext",
                        name
                    ))
                    .with_detail(
                        "The value is rendered into the template; reference a secrets-manager secret instead",
                    )
                    .with_attribute(&path),
                );
            }
        }

        diagnostics
    }
}

/// A fully static value must be a dynamic reference. Any value, static or
/// not, must not carry a password inline in one of its literal parts.
fn embeds_plaintext(token: &Token) -> bool {
    let static_plaintext = token
        .render_static()
        .is_some_and(|rendered| !is_dynamic_reference(&rendered));
    static_plaintext || has_inline_password(token)
}

fn has_inline_password(token: &Token) -> bool {
    match token {
        Token::Literal(s) => literal_has_password(s),
        Token::Join(_, parts) => parts.iter().any(has_inline_password),
        Token::Ref(_) | Token::GetAtt(..) | Token::Pseudo(_) | Token::Secret { .. } => false,
    }
}

// `password=` followed by a value before the next `&` or the end
fn literal_has_password(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.match_indices("password=").any(|(i, key)| {
        lower[i + key.len()..]
            .chars()
            .next()
            .is_some_and(|c| c != '&')
    })
}
