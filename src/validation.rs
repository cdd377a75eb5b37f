//! Property validation against resource schemas.
//!
//! This module validates the `Properties` of a declared resource against its
//! [`Schema`]. Values that are intrinsic functions (`Ref`, `Fn::GetAtt`,
//! `Fn::Join`, ...) resolve at deploy time, so they are accepted wherever a
//! scalar, list, or map is expected.
//!
//! # Example
//!
//! ```
//! use athena_federation_stack::schema::{Attribute, Schema};
//! use athena_federation_stack::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_attribute("GroupDescription", Attribute::required_string())
//!     .with_attribute("VpcId", Attribute::optional_string());
//!
//! let props = json!({"GroupDescription": "sg", "VpcId": {"Ref": "Vpc"}});
//! assert!(validate(&schema, &props).is_empty());
//!
//! let props = json!({"VpcId": 42});
//! assert_eq!(validate(&schema, &props).len(), 2);
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema,
};
use crate::types::is_intrinsic;
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics. Warnings do not make the value invalid;
/// check [`Diagnostic::is_error`] or use [`is_valid`].
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Attribute types must match the schema, intrinsics match any type
/// - Properties the schema does not declare are errors
/// - Nested blocks are validated recursively; a required list needs an item
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if there are no errors
/// or Err with every diagnostic.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(())
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate_result(schema, value).is_ok()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // An absent block has nothing further to check
            return;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }

    for name in obj.keys() {
        if !block.attributes.contains_key(name) && !block.blocks.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unknown property '{}'", join_path(path, name)))
                    .with_attribute(join_path(path, name)),
            );
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.is_required() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required property '{}'", path))
                        .with_detail("This property is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if is_intrinsic(value) {
        return;
    }

    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("This block is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List, Value::Array(arr)) => {
            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        (BlockNestingMode::List, v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for property '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
        resource: None,
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Block, NestedBlock, Presence, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::new().with_attribute("Name", Attribute::required_string());

        assert!(validate(&schema, &json!({"Name": "athena-mysql-ds"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("Name".to_string()));

        let diagnostics = validate(&schema, &json!({"Name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"Name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_intrinsics_accepted_for_any_type() {
        let schema = Schema::new()
            .with_attribute("VpcId", Attribute::required_string())
            .with_attribute("Port", Attribute::optional_int64())
            .with_attribute(
                "SubnetIds",
                Attribute::new(AttributeType::list(AttributeType::String), Presence::Optional),
            );

        let props = json!({
            "VpcId": {"Ref": "Vpc"},
            "Port": {"Fn::GetAtt": ["Db", "Endpoint.Port"]},
            "SubnetIds": {"Fn::Split": [",", "a,b"]}
        });
        assert!(validate(&schema, &props).is_empty());
    }

    #[test]
    fn test_unknown_property_rejected() {
        let schema = Schema::new().with_attribute("Name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!({"Name": "x", "Nmae": "typo"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unknown property 'Nmae'"));
    }

    #[test]
    fn test_plain_literal_in_string_attribute_is_not_flagged() {
        // credential checks belong to the resource that knows which values are secret
        let schema = Schema::new().with_attribute("DefaultConnectionString", Attribute::required_string());
        assert!(validate(
            &schema,
            &json!({"DefaultConnectionString": "mysql://jdbc:mysql://db:3306/mysql?user=admin&password=hunter2"})
        )
        .is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::new().with_attribute("FromPort", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"FromPort": 3306})).is_empty());
        assert!(validate(&schema, &json!({"FromPort": 3306.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"FromPort": 33.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"FromPort": "3306"})).len(), 1);
    }

    #[test]
    fn test_validate_map() {
        let schema = Schema::new().with_attribute("Parameters", Attribute::optional_string_map());

        assert!(validate(&schema, &json!({"Parameters": {"function": "arn"}})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"Parameters": {"a": "x", "count": 42}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("Parameters.count".to_string()));

        let diagnostics = validate(&schema, &json!({"Parameters": "not a map"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_nested_block_list() {
        let schema = Schema::new().with_block(
            "SecurityGroupIngress",
            NestedBlock::list(
                Block::new()
                    .with_attribute("IpProtocol", Attribute::required_string())
                    .with_attribute("FromPort", Attribute::optional_int64()),
            ),
        );

        let diagnostics = validate(
            &schema,
            &json!({"SecurityGroupIngress": [{"IpProtocol": "-1"}, {"IpProtocol": "tcp", "FromPort": 3306}]}),
        );
        assert!(diagnostics.is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics =
            validate(&schema, &json!({"SecurityGroupIngress": [{"FromPort": "x"}]}));
        assert_eq!(diagnostics.len(), 2);

        let diagnostics = validate(&schema, &json!({"SecurityGroupIngress": {"IpProtocol": "-1"}}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_required_single_block() {
        let schema = Schema::new().with_block(
            "Location",
            NestedBlock::single(
                Block::new()
                    .with_attribute("ApplicationId", Attribute::required_string())
                    .with_attribute("SemanticVersion", Attribute::required_string()),
            )
            .required(),
        );

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));

        let diagnostics = validate(&schema, &json!({"Location": {"ApplicationId": "arn"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("Location.SemanticVersion".to_string())
        );
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::new().with_attribute("Name", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"Name": "test"})).is_ok());

        let result = validate_result(&schema, &json!({}));
        assert_eq!(result.unwrap_err().len(), 1);

        assert!(is_valid(&schema, &json!({"Name": {"Ref": "CatalogName"}})));
        assert!(!is_valid(&schema, &json!({"Name": 1})));
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::new().with_attribute("Name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
