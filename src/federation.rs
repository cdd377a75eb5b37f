//! The Athena MySQL federation stack.
//!
//! Declares, in one stack:
//!
//! - a lookup of the existing VPC,
//! - the connector's security group,
//! - the spill bucket,
//! - the MySQL connector application from the Serverless Application Repository,
//! - a lookup of the Lambda function the connector deploys,
//! - the Athena data catalog pointing at that function.
//!
//! The function lookup and the connector's `LambdaFunctionName` parameter read
//! the same configured name, and the catalog carries an explicit dependency on
//! the connector application so the function exists before Athena is told
//! about it.

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::StackError;
use crate::resources::athena::{CatalogType, DataCatalog, FUNCTION_PARAMETER};
use crate::resources::ec2::{Port, SecurityGroup, VpcRef};
use crate::resources::lambda::FunctionRef;
use crate::resources::s3::Bucket;
use crate::resources::sam::ServerlessApplication;
use crate::schema::TypeRegistry;
use crate::stack::{Stack, Synthesis};
use crate::types::Token;

/// Construct id of the VPC lookup.
pub const VPC_ID: &str = "VPC";
/// Construct id of the connector security group.
pub const SECURITY_GROUP_ID: &str = "NewSecurityGroup";
/// Construct id of the spill bucket.
pub const SPILL_BUCKET_ID: &str = "AthenaFederatedSpill";
/// Construct id of the connector application.
pub const CONNECTOR_ID: &str = "MyDB";
/// Construct id of the connector function lookup.
pub const FUNCTION_ID: &str = "connector-lambda";
/// Construct id of the catalog entry.
pub const CATALOG_ID: &str = "athena-datasource-cdk";

/// Connector application parameter names.
pub mod parameters {
    /// Connection string used when no catalog-specific one is set.
    pub const DEFAULT_CONNECTION_STRING: &str = "DefaultConnectionString";
    /// Name of the Lambda function the connector deploys.
    pub const LAMBDA_FUNCTION_NAME: &str = "LambdaFunctionName";
    /// Prefix of secrets the connector may read.
    pub const SECRET_NAME_PREFIX: &str = "SecretNamePrefix";
    /// Comma-separated security group ids.
    pub const SECURITY_GROUP_IDS: &str = "SecurityGroupIds";
    /// Spill bucket name.
    pub const SPILL_BUCKET: &str = "SpillBucket";
    /// Comma-separated subnet ids.
    pub const SUBNET_IDS: &str = "SubnetIds";
}

/// The declared federation stack plus the connector function lookup.
#[derive(Debug, Clone)]
pub struct FederationStack {
    stack: Stack,
    function: FunctionRef,
}

impl FederationStack {
    /// Declare every resource of the stack from configuration.
    pub fn build(config: &StackConfig) -> Result<Self, StackError> {
        config.validate()?;
        debug!(stack = %config.stack_name, environment = %config.environment, "building federation stack");

        let mut stack = Stack::new(&config.stack_name, config.environment.clone());
        if let Some(description) = &config.description {
            stack = stack.with_description(description);
        }

        let network = &config.network;
        let vpc = VpcRef::from_lookup(&network.vpc_id);
        stack.reference(VPC_ID, vpc.external_reference())?;

        let security_group = stack.add(
            SECURITY_GROUP_ID,
            SecurityGroup::new(&network.security_group_description, &vpc)
                .allow_all_outbound(network.allow_all_outbound)
                .add_ingress_rule(
                    network.ingress.peer()?,
                    Port::from(network.ingress.port),
                    &network.ingress.description,
                ),
        )?;

        let spill_bucket = stack.add(
            SPILL_BUCKET_ID,
            Bucket::new().with_removal_policy(config.spill.removal_policy),
        )?;

        let connector_config = &config.connector;
        let connector = stack.add(
            CONNECTOR_ID,
            ServerlessApplication::new(
                &connector_config.application_id,
                &connector_config.semantic_version,
            )
            .with_sensitive_parameter(
                parameters::DEFAULT_CONNECTION_STRING,
                connector_config.connection.to_token(),
            )
            .with_parameter(
                parameters::LAMBDA_FUNCTION_NAME,
                connector_config.function_name.as_str(),
            )
            .with_parameter(
                parameters::SECRET_NAME_PREFIX,
                connector_config.secret_name_prefix.as_str(),
            )
            .with_parameter(
                parameters::SECURITY_GROUP_IDS,
                SecurityGroup::group_id(&security_group),
            )
            .with_parameter(parameters::SPILL_BUCKET, Bucket::bucket_name(&spill_bucket))
            .with_parameter(parameters::SUBNET_IDS, network.subnet_ids.join(",")),
        )?;

        let function = FunctionRef::from_function_name(&connector_config.function_name);
        stack.reference(FUNCTION_ID, function.external_reference())?;
        let function_arn = function.function_arn(&config.environment);

        let catalog = stack.add(
            CATALOG_ID,
            DataCatalog::new(&config.catalog.name, CatalogType::Lambda)
                .with_description(&config.catalog.description)
                .with_parameter(FUNCTION_PARAMETER, function_arn.clone()),
        )?;
        stack.depends_on(&catalog, &connector)?;

        stack.add_output(
            "SpillBucketName",
            Bucket::bucket_name(&spill_bucket),
            "Bucket the connector spills large results to",
        )?;
        stack.add_output(
            "ConnectorSecurityGroupId",
            SecurityGroup::group_id(&security_group),
            "Security group attached to the connector function",
        )?;
        stack.add_output(
            "ConnectorFunctionArn",
            function_arn,
            "ARN of the connector function registered with Athena",
        )?;

        info!(
            stack = %config.stack_name,
            resources = stack.resource_count(),
            connector_version = %connector_config.semantic_version,
            "declared federation stack"
        );

        Ok(Self { stack, function })
    }

    /// Synthesize against the built-in resource types.
    pub fn synth(&self) -> Result<Synthesis, StackError> {
        self.stack.synth(&TypeRegistry::aws())
    }

    /// The underlying stack.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// ARN of the connector function in the stack's environment.
    pub fn function_arn(&self) -> Token {
        self.function.function_arn(self.stack.environment())
    }
}
