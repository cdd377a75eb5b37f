//! Stack configuration.
//!
//! Configuration comes from, in increasing priority:
//! 1. Built-in defaults
//! 2. A TOML file: an explicit path, or `./stack.toml` / `./.federation-stack.toml`
//! 3. `FEDERATION_*` environment variables

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StackError;
use crate::resources::ec2::{Peer, Port, ANY_IPV4};
use crate::resources::s3::RemovalPolicy;
use crate::types::{Environment, Token};

const DEFAULT_CONFIG_PATHS: &[&str] = &["stack.toml", ".federation-stack.toml"];

/// Full configuration of the federation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Name of the deployed stack.
    #[serde(default = "default_stack_name")]
    pub stack_name: String,
    /// Template description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target account and region.
    pub environment: Environment,
    /// Existing network the connector runs in.
    pub network: NetworkConfig,
    /// The marketplace connector application.
    pub connector: ConnectorConfig,
    /// Spill bucket settings.
    #[serde(default)]
    pub spill: SpillConfig,
    /// Athena catalog registration.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_stack_name() -> String {
    "AwsCdkLambdaStack".to_string()
}

/// Network placement of the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Existing VPC id.
    pub vpc_id: String,
    /// Subnets the connector function attaches to.
    pub subnet_ids: Vec<String>,
    /// Security group description.
    #[serde(default = "default_security_group_description")]
    pub security_group_description: String,
    /// Allow all outbound traffic from the connector.
    #[serde(default = "default_true")]
    pub allow_all_outbound: bool,
    /// The single inbound rule.
    #[serde(default)]
    pub ingress: IngressConfig,
}

fn default_security_group_description() -> String {
    "sg for athena lambda connector".to_string()
}

fn default_true() -> bool {
    true
}

/// Inbound rule of the connector security group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Source CIDR, IPv4 (`CidrIp`) or IPv6 (`CidrIpv6`).
    #[serde(default = "default_cidr")]
    pub cidr: String,
    /// Ports covered.
    #[serde(default)]
    pub port: PortConfig,
    /// Rule description.
    #[serde(default = "default_ingress_description")]
    pub description: String,
}

fn default_cidr() -> String {
    ANY_IPV4.to_string()
}

fn default_ingress_description() -> String {
    "allow all inbound".to_string()
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            port: PortConfig::default(),
            description: default_ingress_description(),
        }
    }
}

impl IngressConfig {
    /// The rule's source. Fails on a malformed CIDR block.
    pub fn peer(&self) -> Result<Peer, StackError> {
        Peer::from_cidr(self.cidr.trim()).map_err(|e| {
            StackError::Configuration(format!("network.ingress.cidr: {}", e.message()))
        })
    }
}

/// Ports an ingress rule covers, written as `"all"`, `{ tcp = 3306 }` or
/// `{ tcp_range = [1024, 2048] }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortConfig {
    /// Every port, every protocol.
    #[default]
    All,
    /// One TCP port.
    Tcp(u16),
    /// Inclusive TCP range.
    TcpRange(u16, u16),
}

impl From<PortConfig> for Port {
    fn from(port: PortConfig) -> Self {
        match port {
            PortConfig::All => Port::AllTraffic,
            PortConfig::Tcp(p) => Port::Tcp(p),
            PortConfig::TcpRange(from, to) => Port::TcpRange(from, to),
        }
    }
}

/// The connector application and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Serverless repository application ARN.
    #[serde(default = "default_application_id")]
    pub application_id: String,
    /// Pinned application version.
    pub semantic_version: String,
    /// Name the connector gives its Lambda function.
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// Prefix of secrets the connector may read.
    #[serde(default = "default_secret_name_prefix")]
    pub secret_name_prefix: String,
    /// Where the datastore connection string comes from.
    pub connection: ConnectionSource,
}

fn default_application_id() -> String {
    "arn:aws:serverlessrepo:us-east-1:292517598671:applications/AthenaMySQLConnector".to_string()
}

fn default_function_name() -> String {
    "athena-mysql-connector".to_string()
}

fn default_secret_name_prefix() -> String {
    "AthenaMySQLFederation".to_string()
}

/// Source of the connector's default connection string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSource {
    /// The full connection string, credentials included, rendered into the
    /// template as-is.
    Plaintext(String),
    /// A connection URL whose credentials come from a secrets-manager secret
    /// resolved by the provisioning engine.
    Secret(SecretConnection),
}

/// Connection URL plus the secret holding its credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretConnection {
    /// Connection URL without credentials.
    pub url: String,
    /// Secret name or ARN.
    pub secret_id: String,
    /// JSON key of the user name inside the secret.
    #[serde(default = "default_username_key")]
    pub username_key: String,
    /// JSON key of the password inside the secret.
    #[serde(default = "default_password_key")]
    pub password_key: String,
}

fn default_username_key() -> String {
    "username".to_string()
}

fn default_password_key() -> String {
    "password".to_string()
}

impl ConnectionSource {
    /// The connection string as a deploy-time value.
    pub fn to_token(&self) -> Token {
        match self {
            Self::Plaintext(s) => Token::literal(s.clone()),
            Self::Secret(secret) => {
                let separator = if secret.url.contains('?') { '&' } else { '?' };
                Token::join(
                    "",
                    vec![
                        Token::literal(format!("{}{}user=", secret.url, separator)),
                        Token::secret(&secret.secret_id, &secret.username_key),
                        Token::literal("&password="),
                        Token::secret(&secret.secret_id, &secret.password_key),
                    ],
                )
            },
        }
    }
}

/// Spill bucket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpillConfig {
    /// What happens to the bucket when the stack is deleted.
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

/// Athena catalog registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog name queries use.
    #[serde(default = "default_catalog_name")]
    pub name: String,
    /// Catalog description.
    #[serde(default = "default_catalog_description")]
    pub description: String,
}

fn default_catalog_name() -> String {
    "athena-mysql-ds".to_string()
}

fn default_catalog_description() -> String {
    "athena mysql ds".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            name: default_catalog_name(),
            description: default_catalog_description(),
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: default_stack_name(),
            description: None,
            environment: Environment::new("793852398767", "us-east-1"),
            network: NetworkConfig {
                vpc_id: "vpc-003cf21b3b23d45c9".to_string(),
                subnet_ids: vec!["subnet-06e15f21f40dd64fd".to_string()],
                security_group_description: default_security_group_description(),
                allow_all_outbound: true,
                ingress: IngressConfig::default(),
            },
            connector: ConnectorConfig {
                application_id: default_application_id(),
                semantic_version: "2023.14.1".to_string(),
                function_name: default_function_name(),
                secret_name_prefix: default_secret_name_prefix(),
                connection: ConnectionSource::Secret(SecretConnection {
                    url: "mysql://jdbc:mysql://test-db.cujh1cewjarc.us-east-1.rds.amazonaws.com:3306/test_db"
                        .to_string(),
                    secret_id: "AthenaMySQLFederation/test-db".to_string(),
                    username_key: default_username_key(),
                    password_key: default_password_key(),
                }),
            },
            spill: SpillConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl StackConfig {
    /// Parse configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, StackError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, StackError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading stack config");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the first default config file found, or the built-in defaults.
    pub fn load_or_default() -> Result<Self, StackError> {
        Self::load_from_dir_or_default(Path::new("."))
    }

    /// Like [`StackConfig::load_or_default`], searching `dir`.
    pub fn load_from_dir_or_default(dir: &Path) -> Result<Self, StackError> {
        match find_config_file(dir) {
            Some(path) => Self::load_from_path(path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            },
        }
    }

    /// Apply `FEDERATION_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(account) = lookup("FEDERATION_ACCOUNT") {
            self.environment.account = account;
        }
        if let Some(region) = lookup("FEDERATION_REGION") {
            self.environment.region = region;
        }
        if let Some(vpc_id) = lookup("FEDERATION_VPC_ID") {
            self.network.vpc_id = vpc_id;
        }
        if let Some(subnets) = lookup("FEDERATION_SUBNET_IDS") {
            self.network.subnet_ids = subnets
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(version) = lookup("FEDERATION_CONNECTOR_VERSION") {
            self.connector.semantic_version = version;
        }
    }

    /// Check identifiers before any declaration is built.
    pub fn validate(&self) -> Result<(), StackError> {
        require_non_empty("stack_name", &self.stack_name)?;

        let account = &self.environment.account;
        if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(StackError::Configuration(format!(
                "environment.account must be a 12-digit account id, got '{}'",
                account
            )));
        }
        require_non_empty("environment.region", &self.environment.region)?;

        if !self.network.vpc_id.starts_with("vpc-") {
            return Err(StackError::Configuration(format!(
                "network.vpc_id must start with 'vpc-', got '{}'",
                self.network.vpc_id
            )));
        }
        if self.network.subnet_ids.is_empty() {
            return Err(StackError::Configuration(
                "network.subnet_ids must list at least one subnet".to_string(),
            ));
        }
        if let Some(bad) = self
            .network
            .subnet_ids
            .iter()
            .find(|s| !s.starts_with("subnet-"))
        {
            return Err(StackError::Configuration(format!(
                "network.subnet_ids entries must start with 'subnet-', got '{}'",
                bad
            )));
        }
        self.network.ingress.peer()?;

        require_non_empty("connector.application_id", &self.connector.application_id)?;
        require_non_empty("connector.semantic_version", &self.connector.semantic_version)?;
        require_non_empty("connector.function_name", &self.connector.function_name)?;
        require_non_empty(
            "connector.secret_name_prefix",
            &self.connector.secret_name_prefix,
        )?;
        match &self.connector.connection {
            ConnectionSource::Plaintext(s) => require_non_empty("connector.connection.plaintext", s)?,
            ConnectionSource::Secret(secret) => {
                require_non_empty("connector.connection.secret.url", &secret.url)?;
                require_non_empty("connector.connection.secret.secret_id", &secret.secret_id)?;
            },
        }

        require_non_empty("catalog.name", &self.catalog.name)?;
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), StackError> {
    if value.trim().is_empty() {
        return Err(StackError::Configuration(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
[environment]
account = "111122223333"
region = "eu-west-1"

[network]
vpc_id = "vpc-AAA"
subnet_ids = ["subnet-BBB"]

[connector]
semantic_version = "2023.14.1"

[connector.connection.secret]
url = "mysql://jdbc:mysql://db:3306/test_db"
secret_id = "AthenaMySQLFederation/db"
"#;

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let config = StackConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.stack_name, "AwsCdkLambdaStack");
        assert_eq!(config.environment.region, "eu-west-1");
        assert_eq!(config.network.ingress, IngressConfig::default());
        assert!(config.network.allow_all_outbound);
        assert_eq!(config.connector.function_name, "athena-mysql-connector");
        assert_eq!(config.spill.removal_policy, RemovalPolicy::Retain);
        assert_eq!(config.catalog.name, "athena-mysql-ds");
        config.validate().unwrap();
    }

    #[test]
    fn test_port_and_plaintext_variants() {
        let content = r#"
[environment]
account = "111122223333"
region = "us-east-1"

[network]
vpc_id = "vpc-AAA"
subnet_ids = ["subnet-BBB", "subnet-CCC"]
allow_all_outbound = false

[network.ingress]
cidr = "10.0.0.0/16"
port = { tcp = 3306 }
description = "mysql from vpc"

[connector]
semantic_version = "2024.1.0"
connection = { plaintext = "mysql://jdbc:mysql://db:3306/x?user=a&password=b" }

[spill]
removal_policy = "destroy"
"#;
        let config = StackConfig::from_toml_str(content).unwrap();
        assert_eq!(config.network.ingress.port, PortConfig::Tcp(3306));
        assert_eq!(Port::from(config.network.ingress.port), Port::Tcp(3306));
        assert_eq!(
            config.network.ingress.peer().unwrap(),
            Peer::Ipv4("10.0.0.0/16".into())
        );
        assert!(matches!(config.connector.connection, ConnectionSource::Plaintext(_)));
        assert_eq!(config.spill.removal_policy, RemovalPolicy::Destroy);

        let range: IngressConfig =
            toml::from_str("port = { tcp_range = [1024, 2048] }").unwrap();
        assert_eq!(range.port, PortConfig::TcpRange(1024, 2048));
        let all: IngressConfig = toml::from_str("port = \"all\"").unwrap();
        assert_eq!(all.port, PortConfig::All);
    }

    #[test]
    fn test_secret_connection_token() {
        let config = StackConfig::default();
        let rendered = config.connector.connection.to_token().render_static().unwrap();
        assert_eq!(
            rendered,
            "mysql://jdbc:mysql://test-db.cujh1cewjarc.us-east-1.rds.amazonaws.com:3306/test_db\
             ?user={{resolve:secretsmanager:AthenaMySQLFederation/test-db:SecretString:username}}\
             &password={{resolve:secretsmanager:AthenaMySQLFederation/test-db:SecretString:password}}"
        );
        assert!(!rendered.contains("123_Phoenix"));

        let with_query = ConnectionSource::Secret(SecretConnection {
            url: "mysql://jdbc:mysql://db/x?useSSL=true".into(),
            secret_id: "s".into(),
            username_key: "u".into(),
            password_key: "p".into(),
        });
        let rendered = with_query.to_token().render_static().unwrap();
        assert!(rendered.starts_with("mysql://jdbc:mysql://db/x?useSSL=true&user="));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FEDERATION_VPC_ID", "vpc-AAA"),
            ("FEDERATION_SUBNET_IDS", "subnet-BBB, subnet-CCC,"),
            ("FEDERATION_CONNECTOR_VERSION", "2024.2.0"),
        ]
        .into_iter()
        .collect();

        let mut config = StackConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.network.vpc_id, "vpc-AAA");
        assert_eq!(config.network.subnet_ids, vec!["subnet-BBB", "subnet-CCC"]);
        assert_eq!(config.connector.semantic_version, "2024.2.0");
        assert_eq!(config.environment.account, "793852398767");
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let mut config = StackConfig::default();
        config.environment.account = "12345".into();
        assert!(matches!(config.validate(), Err(StackError::Configuration(_))));

        let mut config = StackConfig::default();
        config.network.vpc_id = "AAA".into();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.network.subnet_ids.clear();
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.network.subnet_ids = vec!["sn-1".into()];
        assert!(config.validate().is_err());

        let mut config = StackConfig::default();
        config.connector.semantic_version = " ".into();
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("semantic_version"));

        assert!(StackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_cidr() {
        for cidr in ["garbage", "", "10.0.0.0", "10.0.0.0/40"] {
            let mut config = StackConfig::default();
            config.network.ingress.cidr = cidr.into();
            let err = config.validate().unwrap_err();
            assert!(matches!(err, StackError::Configuration(_)));
            assert!(err.message().starts_with("network.ingress.cidr"), "{}", err);
        }

        let mut config = StackConfig::default();
        config.network.ingress.cidr = "::/0".into();
        config.validate().unwrap();
        assert_eq!(config.network.ingress.peer().unwrap(), Peer::AnyIpv6);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::load_from_dir_or_default(dir.path()).unwrap();
        assert_eq!(config, StackConfig::default());

        std::fs::write(dir.path().join("stack.toml"), MINIMAL).unwrap();
        let config = StackConfig::load_from_dir_or_default(dir.path()).unwrap();
        assert_eq!(config.network.vpc_id, "vpc-AAA");
    }

    #[test]
    fn test_parse_error() {
        let err = StackConfig::from_toml_str("[environment]\naccount = 1").unwrap_err();
        assert!(matches!(err, StackError::ConfigParse(_)));
    }
}
