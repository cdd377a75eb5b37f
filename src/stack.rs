//! Stack construction and synthesis.
//!
//! A [`Stack`] collects resource declarations, external lookups, explicit
//! dependency edges and outputs, then synthesizes them into a [`Template`].
//! Synthesis validates every declaration against the [`TypeRegistry`] and
//! checks that every intra-stack reference points at something declared.
//! Applying the template is left to the provisioning engine.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::StackError;
use crate::resources::{sam, DeletionPolicy, ExternalReference, Resource, ResourceRef};
use crate::schema::{Diagnostic, TypeRegistry};
use crate::template::{Output, ResourceDeclaration, Template, EXTERNAL_REFERENCES_KEY};
use crate::types::{
    is_pseudo_parameter, logical_id, Environment, Token, SERVERLESS_TRANSFORM,
    TEMPLATE_FORMAT_VERSION,
};
use crate::validation::validate;

#[derive(Debug, Clone)]
struct Declaration {
    resource_type: &'static str,
    properties: Value,
    depends_on: BTreeSet<String>,
    deletion_policy: Option<DeletionPolicy>,
}

/// A deployable collection of declared resources.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    environment: Environment,
    description: Option<String>,
    construct_ids: BTreeSet<String>,
    declarations: BTreeMap<String, Declaration>,
    references: BTreeMap<String, ExternalReference>,
    outputs: BTreeMap<String, Output>,
    diagnostics: Vec<Diagnostic>,
}

/// The result of a successful synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// The stack name.
    pub stack_name: String,
    /// Where the stack deploys.
    pub environment: Environment,
    /// The synthesized template.
    pub template: Template,
    /// Warnings found during synthesis.
    pub diagnostics: Vec<Diagnostic>,
}

impl Stack {
    /// Create an empty stack for the given environment.
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            description: None,
            construct_ids: BTreeSet::new(),
            declarations: BTreeMap::new(),
            references: BTreeMap::new(),
            outputs: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Set the template description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The deployment environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Declare a resource owned by this stack.
    pub fn add<R: Resource>(
        &mut self,
        construct_id: &str,
        resource: R,
    ) -> Result<ResourceRef, StackError> {
        let id = logical_id(construct_id)?;
        if self.declarations.contains_key(&id) {
            return Err(StackError::DuplicateConstruct(format!(
                "{} (logical id {} already declared)",
                construct_id, id
            )));
        }
        self.claim_construct_id(construct_id)?;

        let resource_type = resource.resource_type();
        debug!(construct_id, logical_id = %id, resource_type, "declaring resource");

        self.diagnostics.extend(
            resource
                .diagnostics()
                .into_iter()
                .map(|d| d.with_resource(id.clone())),
        );
        self.declarations.insert(
            id.clone(),
            Declaration {
                resource_type,
                properties: resource.properties(),
                depends_on: BTreeSet::new(),
                deletion_policy: resource.deletion_policy(),
            },
        );

        Ok(ResourceRef::new(id, resource_type))
    }

    /// Record a resource the stack looks up but does not own.
    pub fn reference(
        &mut self,
        construct_id: &str,
        reference: ExternalReference,
    ) -> Result<(), StackError> {
        self.claim_construct_id(construct_id)?;
        debug!(
            construct_id,
            resource_type = %reference.resource_type,
            identifier = %reference.identifier,
            "recording external reference"
        );
        self.references.insert(construct_id.to_string(), reference);
        Ok(())
    }

    /// Declare that `dependent` must be created after `dependency`.
    pub fn depends_on(
        &mut self,
        dependent: &ResourceRef,
        dependency: &ResourceRef,
    ) -> Result<(), StackError> {
        if dependent == dependency {
            return Err(StackError::Configuration(format!(
                "{} cannot depend on itself",
                dependent.logical_id()
            )));
        }
        if !self.declarations.contains_key(dependency.logical_id()) {
            return Err(StackError::UnresolvedReference(
                dependency.logical_id().to_string(),
            ));
        }
        let declaration = self
            .declarations
            .get_mut(dependent.logical_id())
            .ok_or_else(|| StackError::UnresolvedReference(dependent.logical_id().to_string()))?;
        declaration
            .depends_on
            .insert(dependency.logical_id().to_string());
        Ok(())
    }

    /// Add a stack output.
    pub fn add_output(
        &mut self,
        name: &str,
        value: Token,
        description: impl Into<String>,
    ) -> Result<(), StackError> {
        let id = logical_id(name)?;
        if self.outputs.contains_key(&id) {
            return Err(StackError::DuplicateConstruct(format!("output {}", name)));
        }
        self.outputs.insert(
            id,
            Output {
                description: Some(description.into()),
                value: value.to_value(),
            },
        );
        Ok(())
    }

    /// Number of owned resources.
    pub fn resource_count(&self) -> usize {
        self.declarations.len()
    }

    /// Synthesize the template.
    ///
    /// Fails with [`StackError::Validation`] when any error diagnostic is
    /// found; warnings are logged and returned with the template.
    pub fn synth(&self, registry: &TypeRegistry) -> Result<Synthesis, StackError> {
        let mut diagnostics = self.diagnostics.clone();

        for (id, declaration) in &self.declarations {
            match registry.get(declaration.resource_type) {
                Some(schema) => diagnostics.extend(
                    validate(schema, &declaration.properties)
                        .into_iter()
                        .map(|d| d.with_resource(id.clone())),
                ),
                None => diagnostics.push(
                    Diagnostic::error(format!(
                        "Unknown resource type '{}'",
                        declaration.resource_type
                    ))
                    .with_resource(id.clone()),
                ),
            }

            for target in collect_references(&declaration.properties) {
                if !self.declarations.contains_key(&target) {
                    diagnostics.push(unresolved(&target).with_resource(id.clone()));
                }
            }
        }

        for (name, output) in &self.outputs {
            for target in collect_references(&output.value) {
                if !self.declarations.contains_key(&target) {
                    diagnostics.push(unresolved(&target).with_attribute(format!("Outputs.{}", name)));
                }
            }
        }

        // Reporting is left to the caller, which gets every diagnostic back
        for diagnostic in &diagnostics {
            debug!(stack = %self.name, "{}", diagnostic);
        }
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(StackError::Validation(diagnostics));
        }

        let template = self.render()?;
        info!(
            stack = %self.name,
            environment = %self.environment,
            resources = template.resources.len(),
            warnings = diagnostics.len(),
            "synthesized stack"
        );

        Ok(Synthesis {
            stack_name: self.name.clone(),
            environment: self.environment.clone(),
            template,
            diagnostics,
        })
    }

    fn render(&self) -> Result<Template, StackError> {
        let resources = self
            .declarations
            .iter()
            .map(|(id, d)| {
                let properties = match &d.properties {
                    Value::Object(map) if map.is_empty() => None,
                    other => Some(other.clone()),
                };
                let declaration = ResourceDeclaration {
                    resource_type: d.resource_type.to_string(),
                    properties,
                    depends_on: d.depends_on.iter().cloned().collect(),
                    deletion_policy: d.deletion_policy,
                    update_replace_policy: d.deletion_policy,
                };
                (id.clone(), declaration)
            })
            .collect();

        let transform = self
            .declarations
            .values()
            .any(|d| d.resource_type == sam::APPLICATION_TYPE)
            .then(|| SERVERLESS_TRANSFORM.to_string());

        let mut metadata = BTreeMap::new();
        if !self.references.is_empty() {
            metadata.insert(
                EXTERNAL_REFERENCES_KEY.to_string(),
                serde_json::to_value(&self.references)?,
            );
        }

        Ok(Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: self.description.clone(),
            transform,
            metadata,
            resources,
            outputs: self.outputs.clone(),
        })
    }

    fn claim_construct_id(&mut self, construct_id: &str) -> Result<(), StackError> {
        if !self.construct_ids.insert(construct_id.to_string()) {
            return Err(StackError::DuplicateConstruct(construct_id.to_string()));
        }
        Ok(())
    }
}

fn unresolved(target: &str) -> Diagnostic {
    Diagnostic::error(format!("Unresolved reference to '{}'", target))
        .with_detail("No resource with this logical id is declared in the stack")
}

/// Logical ids targeted by `Ref` and `Fn::GetAtt` anywhere inside a value.
/// Pseudo parameters are skipped.
fn collect_references(value: &Value) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    walk_references(value, &mut targets);
    targets
}

fn walk_references(value: &Value, targets: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                if !is_pseudo_parameter(target) {
                    targets.insert(target.clone());
                }
            }
            match map.get("Fn::GetAtt") {
                Some(Value::Array(parts)) => {
                    if let Some(Value::String(target)) = parts.first() {
                        targets.insert(target.clone());
                    }
                },
                Some(Value::String(dotted)) => {
                    if let Some((target, _)) = dotted.split_once('.') {
                        targets.insert(target.to_string());
                    }
                },
                _ => {},
            }
            for v in map.values() {
                walk_references(v, targets);
            }
        },
        Value::Array(items) => {
            for v in items {
                walk_references(v, targets);
            }
        },
        _ => {},
    }
}
