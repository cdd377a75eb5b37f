//! The synthesized declaration tree.
//!
//! A [`Template`] is the wire contract with the provisioning engine: a
//! CloudFormation template in JSON form. Resources are keyed by logical id and
//! kept sorted so synthesis is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StackError;
use crate::resources::{DeletionPolicy, ExternalReference};

/// Metadata key listing the resources the stack looks up but does not own.
pub const EXTERNAL_REFERENCES_KEY: &str = "ExternalReferences";

/// A CloudFormation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Always `2010-09-09`.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Stack description.
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Macro applied by the engine before provisioning.
    #[serde(rename = "Transform", default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Free-form template metadata.
    #[serde(rename = "Metadata", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Declared resources by logical id.
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, ResourceDeclaration>,
    /// Stack outputs by logical id.
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

/// One entry of the `Resources` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDeclaration {
    /// CloudFormation type name.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Resource properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    /// Explicit ordering edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Behaviour when the resource leaves the stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// Behaviour when an update replaces the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

impl ResourceDeclaration {
    /// A property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }
}

/// One entry of the `Outputs` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Output description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The output value.
    pub value: Value,
}

impl Template {
    /// Resources of the given type, as `(logical id, declaration)` pairs.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceDeclaration)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
    }

    /// A resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&ResourceDeclaration> {
        self.resources.get(logical_id)
    }

    /// The lookups recorded under [`EXTERNAL_REFERENCES_KEY`], keyed by
    /// construct id.
    pub fn external_references(&self) -> Result<BTreeMap<String, ExternalReference>, StackError> {
        match self.metadata.get(EXTERNAL_REFERENCES_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a template from JSON.
    pub fn from_json(json: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Template {
        let mut resources = BTreeMap::new();
        resources.insert(
            "AthenaFederatedSpill".to_string(),
            ResourceDeclaration {
                resource_type: "AWS::S3::Bucket".to_string(),
                properties: None,
                depends_on: Vec::new(),
                deletion_policy: Some(DeletionPolicy::Retain),
                update_replace_policy: Some(DeletionPolicy::Retain),
            },
        );
        let mut metadata = BTreeMap::new();
        metadata.insert(
            EXTERNAL_REFERENCES_KEY.to_string(),
            json!({"VPC": {"Type": "AWS::EC2::VPC", "LookupBy": "VpcId", "Identifier": "vpc-AAA"}}),
        );
        Template {
            format_version: "2010-09-09".to_string(),
            description: None,
            transform: None,
            metadata,
            resources,
            outputs: BTreeMap::new(),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(
            value["Resources"]["AthenaFederatedSpill"],
            json!({"Type": "AWS::S3::Bucket", "DeletionPolicy": "Retain", "UpdateReplacePolicy": "Retain"})
        );
        assert!(value.get("Outputs").is_none());
        assert!(value.get("Transform").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let template = sample();
        let parsed = Template::from_json(&template.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn test_queries() {
        let template = sample();
        assert_eq!(template.resources_of_type("AWS::S3::Bucket").count(), 1);
        assert_eq!(template.resources_of_type("AWS::EC2::SecurityGroup").count(), 0);
        assert!(template.resource("AthenaFederatedSpill").is_some());

        let refs = template.external_references().unwrap();
        assert_eq!(refs["VPC"].identifier, "vpc-AAA");
    }
}
