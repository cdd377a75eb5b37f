//! Spill storage bucket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DeletionPolicy, Resource, ResourceRef};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::Token;

/// CloudFormation type of a bucket.
pub const BUCKET_TYPE: &str = "AWS::S3::Bucket";

/// What happens to the bucket when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Keep the bucket and its objects.
    #[default]
    Retain,
    /// Delete the bucket. Deletion fails if the bucket is not empty.
    Destroy,
}

/// An S3 bucket. With no name the engine generates one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bucket {
    bucket_name: Option<String>,
    removal_policy: RemovalPolicy,
}

impl Bucket {
    /// A bucket with a generated name, retained on removal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed bucket name.
    pub fn with_bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    /// Set the removal policy.
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Token for the name of a declared bucket.
    pub fn bucket_name(handle: &ResourceRef) -> Token {
        handle.reference()
    }

    /// Properties schema.
    pub fn schema() -> Schema {
        Schema::new().with_attribute("BucketName", Attribute::optional_string())
    }
}

impl Resource for Bucket {
    fn resource_type(&self) -> &'static str {
        BUCKET_TYPE
    }

    fn properties(&self) -> Value {
        let mut props = Map::new();
        if let Some(name) = &self.bucket_name {
            props.insert("BucketName".into(), Value::String(name.clone()));
        }
        Value::Object(props)
    }

    fn deletion_policy(&self) -> Option<DeletionPolicy> {
        Some(match self.removal_policy {
            RemovalPolicy::Retain => DeletionPolicy::Retain,
            RemovalPolicy::Destroy => DeletionPolicy::Delete,
        })
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        match &self.bucket_name {
            Some(name) if !is_valid_bucket_name(name) => vec![Diagnostic::error(
                "Invalid bucket name",
            )
            .with_detail(format!(
                "'{}' must be 3-63 lowercase letters, digits, dots or hyphens",
                name
            ))
            .with_attribute("BucketName")],
            _ => Vec::new(),
        }
    }
}

fn is_valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !name.starts_with(['-', '.'])
        && !name.ends_with(['-', '.'])
}
