//! Network access: VPC lookups and security groups.

use std::net::IpAddr;

use serde_json::{json, Map, Value};

use super::{ExternalReference, Resource, ResourceRef};
use crate::error::StackError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::Token;

/// CloudFormation type of a security group.
pub const SECURITY_GROUP_TYPE: &str = "AWS::EC2::SecurityGroup";

/// CloudFormation type of a VPC.
pub const VPC_TYPE: &str = "AWS::EC2::VPC";

/// IPv4 CIDR matching every address.
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// IPv6 CIDR matching every address.
pub const ANY_IPV6: &str = "::/0";

const ALL_PROTOCOLS: &str = "-1";

/// A VPC that already exists in the target account and region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcRef {
    vpc_id: String,
}

impl VpcRef {
    /// Reference an existing VPC by id.
    pub fn from_lookup(vpc_id: impl Into<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
        }
    }

    /// The VPC id.
    pub fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    /// The lookup the provisioning engine performs.
    pub fn external_reference(&self) -> ExternalReference {
        ExternalReference::new(VPC_TYPE, "VpcId", &self.vpc_id)
    }
}

/// The source of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    /// Any IPv4 address.
    AnyIpv4,
    /// A specific IPv4 CIDR block.
    Ipv4(String),
    /// Any IPv6 address.
    AnyIpv6,
    /// A specific IPv6 CIDR block.
    Ipv6(String),
}

impl Peer {
    /// Any IPv4 address.
    pub fn any_ipv4() -> Self {
        Self::AnyIpv4
    }

    /// Any IPv6 address.
    pub fn any_ipv6() -> Self {
        Self::AnyIpv6
    }

    /// Parse an IPv4 or IPv6 CIDR block such as `10.0.0.0/16` or `::/0`.
    ///
    /// A zero-length prefix is the same as [`Peer::any_ipv4`] or
    /// [`Peer::any_ipv6`].
    pub fn from_cidr(cidr: &str) -> Result<Self, StackError> {
        match parse_cidr(cidr)? {
            (IpAddr::V4(_), 0) => Ok(Self::AnyIpv4),
            (IpAddr::V4(_), _) => Ok(Self::Ipv4(cidr.to_string())),
            (IpAddr::V6(_), 0) => Ok(Self::AnyIpv6),
            (IpAddr::V6(_), _) => Ok(Self::Ipv6(cidr.to_string())),
        }
    }

    /// The CIDR block.
    pub fn cidr(&self) -> &str {
        match self {
            Self::AnyIpv4 => ANY_IPV4,
            Self::AnyIpv6 => ANY_IPV6,
            Self::Ipv4(cidr) | Self::Ipv6(cidr) => cidr,
        }
    }

    /// Whether the peer matches every address of its family.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::AnyIpv4 | Self::AnyIpv6)
    }

    fn property(&self) -> &'static str {
        match self {
            Self::AnyIpv4 | Self::Ipv4(_) => "CidrIp",
            Self::AnyIpv6 | Self::Ipv6(_) => "CidrIpv6",
        }
    }
}

fn parse_cidr(cidr: &str) -> Result<(IpAddr, u8), StackError> {
    let invalid = |reason: &str| {
        StackError::Configuration(format!("Invalid CIDR block '{}': {}", cidr, reason))
    };
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("expected <address>/<prefix>"))?;
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| invalid("not an IPv4 or IPv6 address"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| invalid("prefix length is not a number"))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid(&format!("prefix length exceeds {}", max)));
    }
    Ok((addr, prefix))
}

/// The ports and protocol a rule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Every port on every protocol.
    AllTraffic,
    /// A single TCP port.
    Tcp(u16),
    /// An inclusive range of TCP ports.
    TcpRange(u16, u16),
}

impl Port {
    /// Every port on every protocol.
    pub fn all_traffic() -> Self {
        Self::AllTraffic
    }

    /// A single TCP port.
    pub fn tcp(port: u16) -> Self {
        Self::Tcp(port)
    }

    /// An inclusive range of TCP ports.
    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self::TcpRange(from, to)
    }

    /// Whether the rule covers every port: all traffic, or a TCP range
    /// spanning 0 (or 1) through 65535.
    pub fn is_full_range(self) -> bool {
        match self {
            Self::AllTraffic => true,
            Self::TcpRange(from, to) => from <= 1 && to == u16::MAX,
            Self::Tcp(_) => false,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::AllTraffic => "every port on every protocol",
            _ => "every TCP port",
        }
    }

    fn render_into(self, rule: &mut Map<String, Value>) {
        match self {
            Self::AllTraffic => {
                rule.insert("IpProtocol".into(), json!(ALL_PROTOCOLS));
            },
            Self::Tcp(port) => {
                rule.insert("IpProtocol".into(), json!("tcp"));
                rule.insert("FromPort".into(), json!(port));
                rule.insert("ToPort".into(), json!(port));
            },
            Self::TcpRange(from, to) => {
                rule.insert("IpProtocol".into(), json!("tcp"));
                rule.insert("FromPort".into(), json!(from));
                rule.insert("ToPort".into(), json!(to));
            },
        }
    }
}

/// One inbound rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// Where traffic may come from.
    pub peer: Peer,
    /// Which traffic is allowed.
    pub port: Port,
    /// Rule description.
    pub description: String,
}

impl IngressRule {
    /// Create a new ingress rule.
    pub fn new(peer: Peer, port: Port, description: impl Into<String>) -> Self {
        Self {
            peer,
            port,
            description: description.into(),
        }
    }

    /// Whether the rule opens every port to every IPv4 or IPv6 address.
    pub fn is_unrestricted(&self) -> bool {
        self.peer.is_any() && self.port.is_full_range()
    }

    fn to_value(&self) -> Value {
        let mut rule = Map::new();
        rule.insert(self.peer.property().into(), json!(self.peer.cidr()));
        rule.insert("Description".into(), json!(self.description));
        self.port.render_into(&mut rule);
        Value::Object(rule)
    }
}

/// A security group attached to an existing VPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    description: String,
    vpc_id: String,
    allow_all_outbound: bool,
    ingress: Vec<IngressRule>,
}

impl SecurityGroup {
    /// Create a security group in the given VPC. Outbound traffic is allowed
    /// by default.
    pub fn new(description: impl Into<String>, vpc: &VpcRef) -> Self {
        Self {
            description: description.into(),
            vpc_id: vpc.vpc_id().to_string(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }

    /// Allow or deny all outbound traffic.
    pub fn allow_all_outbound(mut self, allow: bool) -> Self {
        self.allow_all_outbound = allow;
        self
    }

    /// Add an inbound rule.
    pub fn add_ingress_rule(mut self, peer: Peer, port: Port, description: impl Into<String>) -> Self {
        self.ingress.push(IngressRule::new(peer, port, description));
        self
    }

    /// Token for the security group id of a declared group.
    pub fn group_id(handle: &ResourceRef) -> Token {
        handle.get_att("GroupId")
    }

    /// Properties schema.
    pub fn schema() -> Schema {
        Schema::new()
            .with_attribute("GroupDescription", Attribute::required_string())
            .with_attribute("GroupName", Attribute::optional_string())
            .with_attribute("VpcId", Attribute::optional_string())
            .with_block("SecurityGroupIngress", NestedBlock::list(rule_block()))
            .with_block("SecurityGroupEgress", NestedBlock::list(rule_block()))
    }

    fn egress(&self) -> Value {
        if self.allow_all_outbound {
            json!([{
                "CidrIp": ANY_IPV4,
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": ALL_PROTOCOLS
            }])
        } else {
            // An empty egress list means "allow all" to the engine, so
            // denying outbound needs a rule that matches nothing.
            json!([{
                "CidrIp": "255.255.255.255/32",
                "Description": "Disallow all traffic",
                "FromPort": 252,
                "IpProtocol": "icmp",
                "ToPort": 86
            }])
        }
    }
}

fn rule_block() -> Block {
    Block::new()
        .with_attribute("CidrIp", Attribute::optional_string())
        .with_attribute("CidrIpv6", Attribute::optional_string())
        .with_attribute("Description", Attribute::optional_string())
        .with_attribute("IpProtocol", Attribute::required_string())
        .with_attribute("FromPort", Attribute::optional_int64())
        .with_attribute("ToPort", Attribute::optional_int64())
}

impl Resource for SecurityGroup {
    fn resource_type(&self) -> &'static str {
        SECURITY_GROUP_TYPE
    }

    fn properties(&self) -> Value {
        let mut props = Map::new();
        props.insert("GroupDescription".into(), json!(self.description));
        props.insert("SecurityGroupEgress".into(), self.egress());
        if !self.ingress.is_empty() {
            let rules: Vec<Value> = self.ingress.iter().map(IngressRule::to_value).collect();
            props.insert("SecurityGroupIngress".into(), Value::Array(rules));
        }
        props.insert("VpcId".into(), json!(self.vpc_id));
        Value::Object(props)
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (i, rule) in self.ingress.iter().enumerate() {
            if let Peer::Ipv4(cidr) | Peer::Ipv6(cidr) = &rule.peer {
                if let Err(e) = parse_cidr(cidr) {
                    diagnostics.push(
                        Diagnostic::error("Invalid ingress CIDR block")
                            .with_detail(e.message())
                            .with_attribute(format!("SecurityGroupIngress.{}", i)),
                    );
                }
            }
            if rule.is_unrestricted() {
                diagnostics.push(
                    Diagnostic::warning("Security group allows all inbound traffic")
                        .with_detail(format!(
                            "Ingress rule '{}' opens {} to {}",
                            rule.description,
                            rule.port.describe(),
                            rule.peer.cidr()
                        ))
                        .with_attribute(format!("SecurityGroupIngress.{}", i)),
                );
            }
            if let Port::TcpRange(from, to) = rule.port {
                if from > to {
                    diagnostics.push(
                        Diagnostic::error("Invalid port range")
                            .with_detail(format!("FromPort {} is greater than ToPort {}", from, to))
                            .with_attribute(format!("SecurityGroupIngress.{}", i)),
                    );
                }
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;
    use crate::validation::validate;

    fn vpc() -> VpcRef {
        VpcRef::from_lookup("vpc-AAA")
    }

    #[test]
    fn test_allow_all_inbound_rule() {
        let sg = SecurityGroup::new("sg for athena lambda connector", &vpc()).add_ingress_rule(
            Peer::any_ipv4(),
            Port::all_traffic(),
            "allow all inbound",
        );

        let props = sg.properties();
        assert_eq!(props["VpcId"], "vpc-AAA");
        assert_eq!(props["GroupDescription"], "sg for athena lambda connector");
        assert_eq!(
            props["SecurityGroupIngress"],
            json!([{"CidrIp": "0.0.0.0/0", "Description": "allow all inbound", "IpProtocol": "-1"}])
        );
        assert_eq!(props["SecurityGroupEgress"][0]["CidrIp"], "0.0.0.0/0");
        assert!(validate(&SecurityGroup::schema(), &props).is_empty());

        let diagnostics = sg.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn test_tightened_rule_renders_ports() {
        let sg = SecurityGroup::new("sg", &vpc()).add_ingress_rule(
            Peer::from_cidr("10.0.0.0/16").unwrap(),
            Port::tcp(3306),
            "mysql",
        );

        let rule = &sg.properties()["SecurityGroupIngress"][0];
        assert_eq!(rule["IpProtocol"], "tcp");
        assert_eq!(rule["FromPort"], 3306);
        assert_eq!(rule["ToPort"], 3306);
        assert_eq!(rule["CidrIp"], "10.0.0.0/16");
        assert!(sg.diagnostics().is_empty());
    }

    #[test]
    fn test_deny_outbound_placeholder() {
        let sg = SecurityGroup::new("sg", &vpc()).allow_all_outbound(false);
        let props = sg.properties();
        assert_eq!(props["SecurityGroupEgress"][0]["CidrIp"], "255.255.255.255/32");
        assert!(props.get("SecurityGroupIngress").is_none());
    }

    #[test]
    fn test_inverted_port_range_is_error() {
        let sg = SecurityGroup::new("sg", &vpc()).add_ingress_rule(
            Peer::from_cidr("10.0.0.0/8").unwrap(),
            Port::tcp_range(9000, 8000),
            "bad",
        );
        let diagnostics = sg.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_peer_normalizes_any_address() {
        assert_eq!(Peer::from_cidr("0.0.0.0/0").unwrap(), Peer::AnyIpv4);
        assert_eq!(Peer::from_cidr("::/0").unwrap(), Peer::any_ipv6());
        assert_eq!(
            Peer::from_cidr("2001:db8::/32").unwrap(),
            Peer::Ipv6("2001:db8::/32".into())
        );
        assert!(IngressRule::new(Peer::from_cidr(ANY_IPV4).unwrap(), Port::AllTraffic, "x")
            .is_unrestricted());
        assert!(!IngressRule::new(Peer::AnyIpv4, Port::Tcp(443), "x").is_unrestricted());
    }

    #[test]
    fn test_malformed_cidr_rejected() {
        for cidr in ["garbage", "10.0.0.0", "10.0.0.0/33", "::/129", "10.0.0.300/8", "/0"] {
            assert!(
                matches!(Peer::from_cidr(cidr), Err(StackError::Configuration(_))),
                "accepted {}",
                cidr
            );
        }

        // a hand-built peer is checked again at synthesis
        let sg = SecurityGroup::new("sg", &vpc()).add_ingress_rule(
            Peer::Ipv4("garbage".into()),
            Port::tcp(3306),
            "mysql",
        );
        let diagnostics = sg.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("SecurityGroupIngress.0"));
    }

    #[test]
    fn test_full_tcp_range_to_anyone_warns() {
        for port in [Port::tcp_range(0, 65535), Port::tcp_range(1, 65535)] {
            let sg = SecurityGroup::new("sg", &vpc()).add_ingress_rule(Peer::any_ipv4(), port, "wide");
            let diagnostics = sg.diagnostics();
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
            assert!(diagnostics[0].detail.as_deref().unwrap().contains("every TCP port"));
        }

        let narrow = SecurityGroup::new("sg", &vpc()).add_ingress_rule(
            Peer::any_ipv4(),
            Port::tcp_range(1024, 65535),
            "ephemeral",
        );
        assert!(narrow.diagnostics().is_empty());
    }

    #[test]
    fn test_any_ipv6_renders_cidr_ipv6_and_warns() {
        let sg = SecurityGroup::new("sg", &vpc()).add_ingress_rule(
            Peer::from_cidr("::/0").unwrap(),
            Port::all_traffic(),
            "allow all inbound v6",
        );

        let props = sg.properties();
        let rule = &props["SecurityGroupIngress"][0];
        assert_eq!(rule["CidrIpv6"], "::/0");
        assert!(rule.get("CidrIp").is_none());
        assert!(validate(&SecurityGroup::schema(), &props).is_empty());

        let diagnostics = sg.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert!(diagnostics[0].detail.as_deref().unwrap().ends_with("to ::/0"));
    }

    #[test]
    fn test_vpc_lookup_reference() {
        let reference = vpc().external_reference();
        assert_eq!(reference.resource_type, VPC_TYPE);
        assert_eq!(reference.lookup_by, "VpcId");
        assert_eq!(reference.identifier, "vpc-AAA");
    }
}
