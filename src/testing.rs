//! Testing utilities for stack definitions.
//!
//! [`TemplateAssertions`] inspects a synthesized [`Template`] without caring
//! about properties a test does not mention.
//!
//! # Example
//!
//! ```ignore
//! use athena_federation_stack::testing::TemplateAssertions;
//! use serde_json::json;
//!
//! let template = FederationStack::build(&config)?.synth()?.template;
//! let assertions = TemplateAssertions::new(&template);
//! assertions.resource_count_is("AWS::S3::Bucket", 1);
//! assertions.has_resource_properties(
//!     "AWS::Athena::DataCatalog",
//!     &json!({"Type": "LAMBDA"}),
//! );
//! ```

use serde_json::Value;

use crate::error::StackError;
use crate::schema::{Diagnostic, DiagnosticSeverity, TypeRegistry};
use crate::stack::Stack;
use crate::template::{ResourceDeclaration, Template};

/// Assertions over a synthesized template.
pub struct TemplateAssertions<'a> {
    template: &'a Template,
}

impl<'a> TemplateAssertions<'a> {
    /// Wrap a template.
    pub fn new(template: &'a Template) -> Self {
        Self { template }
    }

    /// Resources of `resource_type` whose properties contain `properties`.
    pub fn find_resources(
        &self,
        resource_type: &str,
        properties: &Value,
    ) -> Vec<(&'a str, &'a ResourceDeclaration)> {
        let template: &'a Template = self.template;
        template
            .resources
            .iter()
            .filter(|(_, r)| {
                r.resource_type == resource_type
                    && match &r.properties {
                        Some(actual) => json_contains(actual, properties),
                        None => json_contains(&Value::Object(Default::default()), properties),
                    }
            })
            .map(|(id, r)| (id.as_str(), r))
            .collect()
    }

    /// Assert the template declares exactly `count` resources of a type.
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    pub fn resource_count_is(&self, resource_type: &str, count: usize) {
        let actual = self.template.resources_of_type(resource_type).count();
        assert_eq!(
            actual, count,
            "Expected {} resource(s) of type {}, but found {}",
            count, resource_type, actual
        );
    }

    /// Assert at least one resource of a type has properties containing
    /// `properties`. Objects match on the keys given; arrays must match
    /// element by element.
    ///
    /// # Panics
    ///
    /// Panics if no resource matches.
    pub fn has_resource_properties(&self, resource_type: &str, properties: &Value) {
        let matches = self.find_resources(resource_type, properties);
        assert!(
            !matches.is_empty(),
            "Expected a {} with properties {}, but none matched. Candidates: {:?}",
            resource_type,
            properties,
            self.template
                .resources_of_type(resource_type)
                .map(|(id, r)| (id, r.properties.clone()))
                .collect::<Vec<_>>()
        );
    }

    /// Assert the template has an output whose value contains `value`.
    ///
    /// # Panics
    ///
    /// Panics if the output is missing or its value does not match.
    pub fn has_output(&self, name: &str, value: &Value) {
        let output = self.template.outputs.get(name).unwrap_or_else(|| {
            panic!(
                "Expected output '{}', but the template has {:?}",
                name,
                self.template.outputs.keys().collect::<Vec<_>>()
            )
        });
        assert!(
            json_contains(&output.value, value),
            "Output '{}' is {}, expected {}",
            name,
            output.value,
            value
        );
    }
}

/// Whether `actual` contains `expected`: objects by subset of keys, arrays
/// element-wise with equal length, scalars by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|a| json_contains(a, v))),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual.iter().zip(expected).all(|(a, e)| json_contains(a, e))
        },
        _ => actual == expected,
    }
}

/// Error type for synthesis in tests.
#[derive(Debug)]
pub enum TestError {
    /// Synthesis failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// Synthesis failed before validation.
    Stack(StackError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Synthesis failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    writeln!(f, "  {}", diag)?;
                }
                Ok(())
            },
            TestError::Stack(e) => write!(f, "Stack error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<StackError> for TestError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Validation(diagnostics) => TestError::Diagnostics(diagnostics),
            other => TestError::Stack(other),
        }
    }
}

/// Synthesize a stack, separating validation failures from other errors.
pub fn synth_template(stack: &Stack, registry: &TypeRegistry) -> Result<Template, TestError> {
    Ok(stack.synth(registry)?.template)
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert_severity_contains(diagnostics, DiagnosticSeverity::Error, substring);
}

/// Assert that diagnostics contain a warning with the given summary substring.
///
/// # Panics
///
/// Panics if no warning contains the given substring.
pub fn assert_has_warning(diagnostics: &[Diagnostic], substring: &str) {
    assert_severity_contains(diagnostics, DiagnosticSeverity::Warning, substring);
}

fn assert_severity_contains(
    diagnostics: &[Diagnostic],
    severity: DiagnosticSeverity,
    substring: &str,
) {
    let found = diagnostics
        .iter()
        .any(|d| d.severity == severity && d.summary.contains(substring));

    assert!(
        found,
        "Expected a {:?} containing '{}', but no match found. Got: {:?}",
        severity,
        substring,
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
