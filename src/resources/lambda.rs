//! Lambda function references.

use super::ExternalReference;
use crate::types::{Environment, PseudoParameter, Token};

/// CloudFormation type of a Lambda function.
pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";

/// A function the stack does not declare, addressed by its exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    function_name: String,
}

impl FunctionRef {
    /// Reference a function by name.
    pub fn from_function_name(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }

    /// The function ARN in the given environment:
    /// `arn:${AWS::Partition}:lambda:<region>:<account>:function:<name>`.
    pub fn function_arn(&self, env: &Environment) -> Token {
        Token::join(
            "",
            vec![
                Token::from("arn:"),
                PseudoParameter::Partition.into(),
                Token::from(format!(
                    ":lambda:{}:{}:function:{}",
                    env.region, env.account, self.function_name
                )),
            ],
        )
    }

    /// The lookup the provisioning engine performs.
    pub fn external_reference(&self) -> ExternalReference {
        ExternalReference::new(FUNCTION_TYPE, "FunctionName", &self.function_name)
    }
}
