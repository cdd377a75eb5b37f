//! Schema types for describing resource property structure.
//!
//! Every resource type a stack can declare has a [`Schema`] describing the
//! shape of its `Properties` block. Schemas drive validation at synthesis time
//! so malformed declarations are caught before the template is handed to the
//! provisioning engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Whether an attribute must be declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The attribute must be declared and non-null.
    Required,
    /// The attribute may be absent or null.
    Optional,
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The type of the attribute.
    pub attr_type: AttributeType,
    /// Whether the attribute must be declared.
    pub presence: Presence,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Optional)
    }

    /// Create an optional map-of-strings attribute.
    pub fn optional_string_map() -> Self {
        Self::new(AttributeType::map(AttributeType::String), Presence::Optional)
    }

    /// Whether the attribute must be declared.
    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockNestingMode {
    /// A single nested object.
    Single,
    /// An ordered list of nested objects.
    List,
}

/// A structured property with its own attributes, such as the
/// `SecurityGroupIngress` rules of a security group or the `Location` of a
/// serverless application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// The attributes within this block.
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    pub blocks: BTreeMap<String, NestedBlock>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }
}

/// A nested block with its nesting mode and whether it must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedBlock {
    /// The block definition.
    pub block: Block,
    /// How the block is nested.
    pub nesting_mode: BlockNestingMode,
    /// The block must be declared.
    pub required: bool,
}

impl NestedBlock {
    /// A single nested object.
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            required: false,
        }
    }

    /// A list of nested objects.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            required: false,
        }
    }

    /// Make the block mandatory.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema for the `Properties` of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// The root block containing all attributes and nested blocks.
    pub block: Block,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }
}

/// Resource schemas keyed by CloudFormation type name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Schema>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every resource type this crate can declare.
    pub fn aws() -> Self {
        use crate::resources::{athena, ec2, s3, sam};

        Self::new()
            .with_resource(ec2::SECURITY_GROUP_TYPE, ec2::SecurityGroup::schema())
            .with_resource(s3::BUCKET_TYPE, s3::Bucket::schema())
            .with_resource(sam::APPLICATION_TYPE, sam::ServerlessApplication::schema())
            .with_resource(athena::DATA_CATALOG_TYPE, athena::DataCatalog::schema())
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, type_name: impl Into<String>, schema: Schema) -> Self {
        self.types.insert(type_name.into(), schema);
        self
    }

    /// Look up the schema for a resource type.
    pub fn get(&self, type_name: &str) -> Option<&Schema> {
        self.types.get(type_name)
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents synthesis.
    Error,
    /// A warning that doesn't prevent synthesis but should be addressed.
    Warning,
}

/// A diagnostic produced while validating a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The property path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// The logical id of the resource the issue concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
            resource: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(summary)
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Set the resource this diagnostic concerns.
    pub fn with_resource(mut self, logical_id: impl Into<String>) -> Self {
        self.resource = Some(logical_id.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        match (&self.resource, &self.attribute) {
            (Some(resource), Some(attr)) => write!(f, " (at {}.{})", resource, attr),
            (Some(resource), None) => write!(f, " (at {})", resource),
            (None, Some(attr)) => write!(f, " (at {})", attr),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_constructors() {
        let name = Attribute::required_string();
        assert!(name.is_required());
        assert_eq!(name.attr_type, AttributeType::String);

        let params = Attribute::optional_string_map();
        assert!(!params.is_required());
        assert_eq!(params.attr_type, AttributeType::map(AttributeType::String));
        assert!(matches!(
            AttributeType::list(AttributeType::Int64),
            AttributeType::List(_)
        ));
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::new()
            .with_attribute("GroupDescription", Attribute::required_string())
            .with_block(
                "Location",
                NestedBlock::single(
                    Block::new().with_attribute("ApplicationId", Attribute::required_string()),
                )
                .required(),
            )
            .with_block("SecurityGroupIngress", NestedBlock::list(Block::new()));

        assert!(schema.block.attributes.contains_key("GroupDescription"));
        assert!(schema.block.blocks["Location"].required);
        assert_eq!(schema.block.blocks["Location"].nesting_mode, BlockNestingMode::Single);
        assert!(!schema.block.blocks["SecurityGroupIngress"].required);
    }

    #[test]
    fn test_aws_registry_knows_declared_types() {
        let registry = TypeRegistry::aws();
        for type_name in [
            "AWS::EC2::SecurityGroup",
            "AWS::S3::Bucket",
            "AWS::Serverless::Application",
            "AWS::Athena::DataCatalog",
        ] {
            assert!(registry.get(type_name).is_some(), "missing {}", type_name);
        }
        assert!(registry.get("AWS::EC2::VPC").is_none());
        assert!(registry.get("AWS::Lambda::Function").is_none());
        assert!(TypeRegistry::new().get("AWS::S3::Bucket").is_none());
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid type")
            .with_detail("Expected string, got number")
            .with_attribute("GroupDescription")
            .with_resource("NewSecurityGroup");

        assert!(err.is_error());
        assert_eq!(
            err.to_string(),
            "error: Invalid type: Expected string, got number (at NewSecurityGroup.GroupDescription)"
        );

        let warn = Diagnostic::warning("Permissive ingress");
        assert!(!warn.is_error());
        assert_eq!(warn.to_string(), "warning: Permissive ingress");
    }
}
