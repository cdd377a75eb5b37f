//! Athena data catalog registrations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::Resource;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::Token;

/// CloudFormation type of a data catalog.
pub const DATA_CATALOG_TYPE: &str = "AWS::Athena::DataCatalog";

/// Catalog parameter naming the connector function of a `LAMBDA` catalog.
pub const FUNCTION_PARAMETER: &str = "function";

/// Kind of external data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CatalogType {
    /// A federated connector running as a Lambda function.
    Lambda,
    /// An AWS Glue catalog.
    Glue,
    /// An external Hive metastore.
    Hive,
}

impl CatalogType {
    /// The value written to the `Type` property.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lambda => "LAMBDA",
            Self::Glue => "GLUE",
            Self::Hive => "HIVE",
        }
    }
}

/// A named registration telling Athena how to reach a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCatalog {
    name: String,
    catalog_type: CatalogType,
    description: Option<String>,
    parameters: BTreeMap<String, Token>,
}

impl DataCatalog {
    /// Create a catalog entry.
    pub fn new(name: impl Into<String>, catalog_type: CatalogType) -> Self {
        Self {
            name: name.into(),
            catalog_type,
            description: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a catalog parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Token>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Properties schema.
    pub fn schema() -> Schema {
        Schema::new()
            .with_attribute("Name", Attribute::required_string())
            .with_attribute("Type", Attribute::required_string())
            .with_attribute("Description", Attribute::optional_string())
            .with_attribute("Parameters", Attribute::optional_string_map())
    }
}

impl Resource for DataCatalog {
    fn resource_type(&self) -> &'static str {
        DATA_CATALOG_TYPE
    }

    fn properties(&self) -> Value {
        let mut props = Map::new();
        if let Some(description) = &self.description {
            props.insert("Description".into(), json!(description));
        }
        props.insert("Name".into(), json!(self.name));
        if !self.parameters.is_empty() {
            let params: Map<String, Value> = self
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect();
            props.insert("Parameters".into(), Value::Object(params));
        }
        props.insert("Type".into(), json!(self.catalog_type.as_str()));
        Value::Object(props)
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let name_ok = (1..=127).contains(&self.name.len())
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '@');
        if !name_ok {
            diagnostics.push(
                Diagnostic::error("Invalid catalog name")
                    .with_detail(format!(
                        "'{}' must be 1-127 letters, digits, '_', '-' or '@'",
                        self.name
                    ))
                    .with_attribute("Name"),
            );
        }

        let has_function = self.parameters.contains_key(FUNCTION_PARAMETER)
            || (self.parameters.contains_key("metadata-function")
                && self.parameters.contains_key("record-function"));
        if self.catalog_type == CatalogType::Lambda && !has_function {
            diagnostics.push(
                Diagnostic::error("LAMBDA catalog has no connector function")
                    .with_detail("Set the 'function' parameter to the connector function ARN")
                    .with_attribute("Parameters"),
            );
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_error_contains, assert_has_errors};
    use crate::validation::validate;

    #[test]
    fn test_lambda_catalog_properties() {
        let catalog = DataCatalog::new("athena-mysql-ds", CatalogType::Lambda)
            .with_description("athena mysql ds")
            .with_parameter(FUNCTION_PARAMETER, "arn:aws:lambda:us-east-1:1:function:f");

        let props = catalog.properties();
        assert_eq!(
            props,
            json!({
                "Description": "athena mysql ds",
                "Name": "athena-mysql-ds",
                "Parameters": {"function": "arn:aws:lambda:us-east-1:1:function:f"},
                "Type": "LAMBDA"
            })
        );
        assert!(validate(&DataCatalog::schema(), &props).is_empty());
        assert!(catalog.diagnostics().is_empty());
    }

    #[test]
    fn test_lambda_catalog_requires_function() {
        let catalog = DataCatalog::new("athena-mysql-ds", CatalogType::Lambda);
        let diagnostics = catalog.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_error_contains(&diagnostics, "no connector function");

        let split = DataCatalog::new("ds", CatalogType::Lambda)
            .with_parameter("metadata-function", "a")
            .with_parameter("record-function", "b");
        assert!(split.diagnostics().is_empty());
    }

    #[test]
    fn test_invalid_name() {
        let diagnostics = DataCatalog::new("my catalog", CatalogType::Glue).diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_has_errors(&diagnostics);
    }

    #[test]
    fn test_catalog_type_serde() {
        assert_eq!(serde_json::to_value(CatalogType::Lambda).unwrap(), json!("LAMBDA"));
        assert_eq!(CatalogType::Hive.as_str(), "HIVE");
    }
}
