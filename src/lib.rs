//! Athena Federation Stack
//!
//! This crate declares the infrastructure that lets Amazon Athena query a MySQL
//! database through the federated query connector, and synthesizes it into a
//! CloudFormation template. It does not deploy anything: the template and
//! its manifest are handed to a provisioning engine, which orders, creates,
//! updates and rolls back the resources.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Tokens**: deploy-time values (`Ref`, `Fn::GetAtt`, `Fn::Join`, pseudo
//!   parameters and secrets-manager dynamic references)
//! - **Resources**: typed declarations for security groups, buckets,
//!   serverless applications, Athena data catalogs, plus VPC and Lambda lookups
//! - **Schemas and validation**: every declaration is checked against its
//!   property schema during synthesis
//! - **Stack**: construct ids, dependencies, outputs and synthesis
//! - **FederationStack**: the connector stack itself, built from a [`StackConfig`]
//! - **Assembly**: `manifest.json` plus template files on disk
//! - **Logging**: `tracing` integration writing to stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use athena_federation_stack::{FederationStack, StackConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = StackConfig::load_or_default()?;
//!     config.apply_env_overrides();
//!
//!     let synthesis = FederationStack::build(&config)?.synth()?;
//!     for warning in &synthesis.diagnostics {
//!         eprintln!("{}", warning);
//!     }
//!     println!("{}", synthesis.template.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! # Declared Resources
//!
//! | Construct id            | Kind                           | Owned |
//! |-------------------------|--------------------------------|-------|
//! | `VPC`                   | `AWS::EC2::VPC` lookup         | no    |
//! | `NewSecurityGroup`      | `AWS::EC2::SecurityGroup`      | yes   |
//! | `AthenaFederatedSpill`  | `AWS::S3::Bucket`              | yes   |
//! | `MyDB`                  | `AWS::Serverless::Application` | yes   |
//! | `connector-lambda`      | `AWS::Lambda::Function` lookup | no    |
//! | `athena-datasource-cdk` | `AWS::Athena::DataCatalog`     | yes   |
//!
//! Lookups are recorded under `Metadata.ExternalReferences` in the template.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembly;
pub mod config;
pub mod error;
pub mod federation;
pub mod logging;
pub mod resources;
pub mod schema;
pub mod stack;
pub mod template;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use assembly::CloudAssembly;
pub use config::StackConfig;
pub use error::StackError;
pub use federation::FederationStack;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use resources::{Resource, ResourceRef};
pub use schema::{Diagnostic, DiagnosticSeverity, TypeRegistry};
pub use stack::{Stack, Synthesis};
pub use template::Template;
pub use types::{Environment, Token};
pub use validation::{is_valid, validate, validate_result};

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
