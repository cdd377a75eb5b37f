//! Typed resource declarations.
//!
//! Each submodule covers one service. A declaration implements [`Resource`],
//! which renders it into the CloudFormation `Properties` block the stack
//! hands to the provisioning engine.

pub mod athena;
pub mod ec2;
pub mod lambda;
pub mod s3;
pub mod sam;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Diagnostic;
use crate::types::Token;

/// A resource the stack owns and the provisioning engine creates.
pub trait Resource {
    /// The CloudFormation type name, e.g. `AWS::S3::Bucket`.
    fn resource_type(&self) -> &'static str;

    /// The rendered `Properties` block.
    fn properties(&self) -> Value;

    /// What happens to the physical resource when the stack drops it.
    fn deletion_policy(&self) -> Option<DeletionPolicy> {
        None
    }

    /// Findings about the declaration itself (policy warnings, bad values).
    fn diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// CloudFormation `DeletionPolicy` / `UpdateReplacePolicy` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Keep the physical resource.
    Retain,
    /// Delete the physical resource.
    Delete,
}

/// Handle to a resource declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    logical_id: String,
    resource_type: &'static str,
}

impl ResourceRef {
    pub(crate) fn new(logical_id: String, resource_type: &'static str) -> Self {
        Self {
            logical_id,
            resource_type,
        }
    }

    /// The logical id in the synthesized template.
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The CloudFormation type name.
    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// `{"Ref": <logical id>}`
    pub fn reference(&self) -> Token {
        Token::Ref(self.logical_id.clone())
    }

    /// `{"Fn::GetAtt": [<logical id>, attribute]}`
    pub fn get_att(&self, attribute: impl Into<String>) -> Token {
        Token::GetAtt(self.logical_id.clone(), attribute.into())
    }
}

/// A resource the stack does not own, looked up by identifier at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExternalReference {
    /// The CloudFormation type of the referenced resource.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Which property the lookup matches on, e.g. `VpcId`.
    pub lookup_by: String,
    /// The value matched exactly.
    pub identifier: String,
}

impl ExternalReference {
    /// Create a new external reference.
    pub fn new(
        resource_type: impl Into<String>,
        lookup_by: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            lookup_by: lookup_by.into(),
            identifier: identifier.into(),
        }
    }
}
