//! Deployment context and deploy-time value types.
//!
//! A [`Token`] is a value the provisioning engine resolves when it applies the
//! template: a reference to another resource, one of its attributes, a pseudo
//! parameter, or a secret. Tokens render to CloudFormation intrinsic functions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StackError;

/// The CloudFormation template format version.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Transform required by templates that declare serverless applications.
pub const SERVERLESS_TRANSFORM: &str = "AWS::Serverless-2016-10-31";

/// The account and region a stack is deployed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Twelve-digit AWS account id.
    pub account: String,
    /// Region name, e.g. `us-east-1`.
    pub region: String,
}

impl Environment {
    /// Create a new environment.
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// The environment as an assembly URI: `aws://<account>/<region>`.
    pub fn uri(&self) -> String {
        format!("aws://{}/{}", self.account, self.region)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Pseudo parameters the provisioning engine provides to every template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoParameter {
    /// `AWS::Partition`
    Partition,
    /// `AWS::Region`
    Region,
    /// `AWS::AccountId`
    AccountId,
    /// `AWS::StackName`
    StackName,
}

impl PseudoParameter {
    /// The parameter name as written in a `Ref`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Partition => "AWS::Partition",
            Self::Region => "AWS::Region",
            Self::AccountId => "AWS::AccountId",
            Self::StackName => "AWS::StackName",
        }
    }
}

/// Whether a `Ref` target names a pseudo parameter rather than a resource.
pub fn is_pseudo_parameter(name: &str) -> bool {
    name.starts_with("AWS::")
}

/// A value resolved by the provisioning engine at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain string.
    Literal(String),
    /// `{"Ref": logical_id}`
    Ref(String),
    /// `{"Fn::GetAtt": [logical_id, attribute]}`
    GetAtt(String, String),
    /// `{"Ref": "AWS::..."}`
    Pseudo(PseudoParameter),
    /// `{"Fn::Join": [delimiter, [parts...]]}`
    Join(String, Vec<Token>),
    /// A secrets-manager dynamic reference, rendered as
    /// `{{resolve:secretsmanager:<secret_id>:SecretString:<json_key>}}`.
    Secret {
        /// Secret name or ARN.
        secret_id: String,
        /// Key inside the secret's JSON string.
        json_key: String,
    },
}

impl Token {
    /// A literal string token.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// A secrets-manager dynamic reference.
    pub fn secret(secret_id: impl Into<String>, json_key: impl Into<String>) -> Self {
        Self::Secret {
            secret_id: secret_id.into(),
            json_key: json_key.into(),
        }
    }

    /// Join tokens with a delimiter.
    pub fn join(delimiter: impl Into<String>, parts: Vec<Token>) -> Self {
        Self::Join(delimiter.into(), parts)
    }

    /// Render the token as CloudFormation JSON.
    ///
    /// Joins made only of literals and secrets collapse into a single string.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(s) => Value::String(s.clone()),
            Self::Ref(id) => json!({ "Ref": id }),
            Self::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
            Self::Pseudo(p) => json!({ "Ref": p.name() }),
            Self::Secret { .. } => Value::String(self.render_static().unwrap_or_default()),
            Self::Join(delimiter, parts) => {
                if let Some(flat) = self.render_static() {
                    return Value::String(flat);
                }
                let parts: Vec<Value> = merge_literals(delimiter, parts)
                    .iter()
                    .map(Token::to_value)
                    .collect();
                json!({ "Fn::Join": [delimiter, parts] })
            },
        }
    }

    /// The token as a plain string, if it needs no intrinsic function.
    pub fn render_static(&self) -> Option<String> {
        match self {
            Self::Literal(s) => Some(s.clone()),
            Self::Secret {
                secret_id,
                json_key,
            } => Some(format!(
                "{{{{resolve:secretsmanager:{}:SecretString:{}}}}}",
                secret_id, json_key
            )),
            Self::Join(delimiter, parts) => parts
                .iter()
                .map(Token::render_static)
                .collect::<Option<Vec<_>>>()
                .map(|rendered| rendered.join(delimiter)),
            Self::Ref(_) | Self::GetAtt(..) | Self::Pseudo(_) => None,
        }
    }
}

fn merge_literals(delimiter: &str, parts: &[Token]) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(Token::Literal(prev)), Token::Literal(next)) => {
                prev.push_str(delimiter);
                prev.push_str(next);
            },
            _ => merged.push(part.clone()),
        }
    }
    merged
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<PseudoParameter> for Token {
    fn from(value: PseudoParameter) -> Self {
        Self::Pseudo(value)
    }
}

/// Whether a JSON value is an intrinsic-function object.
pub fn is_intrinsic(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) if obj.len() == 1 => obj
            .keys()
            .next()
            .is_some_and(|k| k == "Ref" || k.starts_with("Fn::")),
        _ => false,
    }
}

/// Whether a string contains a `{{resolve:...}}` dynamic reference.
pub fn is_dynamic_reference(value: &str) -> bool {
    value.contains("{{resolve:")
}

/// Derive a logical id from a construct id by dropping every character that
/// is not ASCII alphanumeric.
pub fn logical_id(construct_id: &str) -> Result<String, StackError> {
    let id: String = construct_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if id.is_empty() {
        return Err(StackError::InvalidConstructId(construct_id.to_string()));
    }
    if id.len() > 255 {
        return Err(StackError::InvalidConstructId(format!(
            "{} (logical id longer than 255 characters)",
            construct_id
        )));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_uri() {
        let env = Environment::new("793852398767", "us-east-1");
        assert_eq!(env.uri(), "aws://793852398767/us-east-1");
        assert_eq!(env.to_string(), env.uri());
    }

    #[test]
    fn test_token_rendering() {
        assert_eq!(Token::from("plain").to_value(), json!("plain"));
        assert_eq!(
            Token::Ref("AthenaFederatedSpill".into()).to_value(),
            json!({"Ref": "AthenaFederatedSpill"})
        );
        assert_eq!(
            Token::GetAtt("NewSecurityGroup".into(), "GroupId".into()).to_value(),
            json!({"Fn::GetAtt": ["NewSecurityGroup", "GroupId"]})
        );
        assert_eq!(
            Token::from(PseudoParameter::Partition).to_value(),
            json!({"Ref": "AWS::Partition"})
        );
    }

    #[test]
    fn test_secret_renders_dynamic_reference() {
        let token = Token::secret("AthenaMySQLFederation/test-db", "password");
        assert_eq!(
            token.to_value(),
            json!("{{resolve:secretsmanager:AthenaMySQLFederation/test-db:SecretString:password}}")
        );
        assert!(is_dynamic_reference(token.to_value().as_str().unwrap()));
    }

    #[test]
    fn test_join_collapses_static_parts() {
        let token = Token::join(
            "",
            vec![
                Token::from("mysql://host/db?password="),
                Token::secret("db", "password"),
            ],
        );
        assert_eq!(
            token.to_value(),
            json!("mysql://host/db?password={{resolve:secretsmanager:db:SecretString:password}}")
        );
    }

    #[test]
    fn test_join_with_intrinsics_merges_adjacent_literals() {
        let token = Token::join(
            "",
            vec![
                Token::from("arn:"),
                PseudoParameter::Partition.into(),
                Token::from(":lambda:"),
                Token::from("us-east-1"),
            ],
        );
        assert_eq!(
            token.to_value(),
            json!({"Fn::Join": ["", ["arn:", {"Ref": "AWS::Partition"}, ":lambda:us-east-1"]]})
        );
    }

    #[test]
    fn test_join_keeps_delimiter_between_merged_literals() {
        let token = Token::join(
            ",",
            vec![Token::from("a"), Token::from("b"), Token::Ref("C".into())],
        );
        assert_eq!(token.to_value(), json!({"Fn::Join": [",", ["a,b", {"Ref": "C"}]]}));
    }

    #[test]
    fn test_is_intrinsic() {
        assert!(is_intrinsic(&json!({"Ref": "X"})));
        assert!(is_intrinsic(&json!({"Fn::GetAtt": ["X", "Arn"]})));
        assert!(!is_intrinsic(&json!({"Ref": "X", "Other": 1})));
        assert!(!is_intrinsic(&json!({"Name": "X"})));
        assert!(!is_intrinsic(&json!("Ref")));
    }

    #[test]
    fn test_logical_id() {
        assert_eq!(
            logical_id("athena-datasource-cdk").unwrap(),
            "athenadatasourcecdk"
        );
        assert_eq!(logical_id("NewSecurityGroup").unwrap(), "NewSecurityGroup");
        assert!(matches!(
            logical_id("--"),
            Err(StackError::InvalidConstructId(_))
        ));
        assert!(logical_id(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_pseudo_parameter_detection() {
        assert!(is_pseudo_parameter(PseudoParameter::AccountId.name()));
        assert!(!is_pseudo_parameter("MyDB"));
    }
}
