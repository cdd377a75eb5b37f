//! Cloud assembly output.
//!
//! A synthesized stack is written as a directory holding the template and a
//! `manifest.json` describing it, the layout deployment tooling reads:
//!
//! ```text
//! cdk.out/
//!   manifest.json
//!   AwsCdkLambdaStack.template.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StackError;
use crate::stack::Synthesis;

/// Manifest schema version written by this crate.
pub const MANIFEST_VERSION: &str = "36.0.0";

/// Artifact type of a stack template.
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

const MANIFEST_FILE: &str = "manifest.json";

/// `manifest.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest schema version.
    pub version: String,
    /// Artifacts by id.
    pub artifacts: BTreeMap<String, Artifact>,
}

/// One deployable artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact type.
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Target environment URI, `aws://<account>/<region>`.
    pub environment: String,
    /// Type-specific properties.
    pub properties: ArtifactProperties,
}

/// Properties of a stack artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    /// Template path relative to the assembly directory.
    pub template_file: String,
}

/// A written assembly directory.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    directory: PathBuf,
    manifest: Manifest,
}

impl CloudAssembly {
    /// Write the template and manifest of `synthesis` into `dir`, creating it
    /// if needed. Existing files with the same names are replaced.
    pub fn write(dir: impl AsRef<Path>, synthesis: &Synthesis) -> Result<Self, StackError> {
        let directory = dir.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        let template_file = format!("{}.template.json", synthesis.stack_name);
        fs::write(
            directory.join(&template_file),
            synthesis.template.to_json_pretty()?,
        )?;

        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            synthesis.stack_name.clone(),
            Artifact {
                artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                environment: synthesis.environment.uri(),
                properties: ArtifactProperties {
                    template_file: template_file.clone(),
                },
            },
        );
        let manifest = Manifest {
            version: MANIFEST_VERSION.to_string(),
            artifacts,
        };
        fs::write(
            directory.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        info!(
            directory = %directory.display(),
            template = %template_file,
            "wrote cloud assembly"
        );
        Ok(Self {
            directory,
            manifest,
        })
    }

    /// Read the manifest of an existing assembly directory.
    pub fn read_manifest(dir: impl AsRef<Path>) -> Result<Manifest, StackError> {
        let content = fs::read_to_string(dir.as_ref().join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The assembly directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The manifest that was written.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Path of a stack's template file.
    pub fn template_path(&self, stack_name: &str) -> Option<PathBuf> {
        self.manifest
            .artifacts
            .get(stack_name)
            .map(|a| self.directory.join(&a.properties.template_file))
    }
}
