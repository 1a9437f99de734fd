//! Rule registry: the per-rule directories in the working directory and the
//! `parameters.json` file each one carries.

use crate::error::{RdkError, Result};
use crate::io;
use crate::paths;
use crate::types::{Frequency, Runtime, RuntimeFamily};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// RuleProject
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleProject {
    pub rule_name: String,
    pub source_runtime: Runtime,
    pub code_bucket: String,
    pub code_key: String,
    /// Opaque JSON blob handed to the rule; never interpreted here.
    #[serde(default)]
    pub input_parameters: Option<String>,
    /// Comma separated resource types, e.g. `AWS::S3::Bucket,AWS::IAM::Role`.
    #[serde(default)]
    pub source_events: Option<String>,
    #[serde(default)]
    pub source_periodic: Option<Frequency>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParametersFile {
    #[serde(rename = "Parameters")]
    parameters: RuleProject,
}

/// Attributes supplied to `create`.
#[derive(Debug, Clone, Default)]
pub struct NewRule {
    pub name: String,
    pub runtime: Option<Runtime>,
    pub events: Option<String>,
    pub periodic: Option<Frequency>,
    pub input_parameters: Option<String>,
}

/// Attributes supplied to `modify`; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct RuleChanges {
    pub runtime: Option<Runtime>,
    pub events: Option<String>,
    pub periodic: Option<Frequency>,
    pub input_parameters: Option<String>,
}

impl NewRule {
    /// Checks that need no filesystem or account access.
    pub fn validate(&self) -> Result<()> {
        paths::validate_rule_name(&self.name)?;
        if self.runtime.is_none() {
            return Err(RdkError::MissingRuntime("create"));
        }
        let has_events = self.events.as_deref().is_some_and(|e| !e.trim().is_empty());
        if !has_events && self.periodic.is_none() {
            return Err(RdkError::MissingTrigger(self.name.clone()));
        }
        Ok(())
    }
}

impl RuleChanges {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none()
            && self.events.is_none()
            && self.periodic.is_none()
            && self.input_parameters.is_none()
    }
}

impl RuleProject {
    pub fn name(&self) -> &str {
        &self.rule_name
    }

    pub fn has_trigger(&self) -> bool {
        self.source_events.is_some() || self.source_periodic.is_some()
    }

    /// Resource types from the event trigger, in declaration order.
    pub fn resource_types(&self) -> Vec<String> {
        self.source_events
            .as_deref()
            .map(split_resource_types)
            .unwrap_or_default()
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        paths::rule_dir(root, &self.rule_name)
    }

    pub fn source_path(&self, root: &Path) -> PathBuf {
        paths::rule_source(root, &self.rule_name, self.source_runtime.extension())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path, name: &str) -> Result<Self> {
        if !paths::rule_dir(root, name).is_dir() {
            return Err(RdkError::RuleNotFound(name.to_string()));
        }
        let path = paths::parameters_path(root, name);
        if !path.exists() {
            return Err(RdkError::ParametersNotFound(name.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let file: ParametersFile = serde_json::from_str(&data)?;
        Ok(file.parameters)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let file = ParametersFile {
            parameters: self.clone(),
        };
        io::write_json(&paths::parameters_path(root, &self.rule_name), &file)
    }

    /// Create the rule directory, copy the runtime's code template into it
    /// and write `parameters.json`.
    pub fn create(root: &Path, new: NewRule, code_bucket: String) -> Result<Self> {
        new.validate()?;
        let runtime = new.runtime.ok_or(RdkError::MissingRuntime("create"))?;

        let project = RuleProject {
            code_key: paths::artifact_key(&new.name),
            rule_name: new.name,
            source_runtime: runtime,
            code_bucket,
            input_parameters: non_empty(new.input_parameters),
            source_events: normalize_events(new.events),
            source_periodic: new.periodic,
        };
        if !project.has_trigger() {
            return Err(RdkError::MissingTrigger(project.rule_name));
        }

        let dir = project.dir(root);
        if dir.exists() {
            return Err(RdkError::RuleExists(project.rule_name));
        }
        if !paths::rdk_dir(root).is_dir() {
            return Err(RdkError::NotInitialized);
        }

        io::ensure_dir(&dir)?;
        let populated = copy_code_templates(root, &project).and_then(|()| project.save(root));
        if let Err(e) = populated {
            // Leave nothing half-built behind.
            if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), "could not remove partial rule: {cleanup}");
            }
            return Err(e);
        }
        tracing::debug!(rule = %project.rule_name, runtime = %runtime, "created rule");
        Ok(project)
    }

    /// Apply `changes` to a stored rule and persist the result.
    pub fn modify(root: &Path, name: &str, changes: RuleChanges) -> Result<Self> {
        let mut project = Self::load(root, name)?;
        if let Some(runtime) = changes.runtime {
            project.source_runtime = runtime;
        }
        if let Some(events) = changes.events {
            project.source_events = normalize_events(Some(events));
        }
        if let Some(periodic) = changes.periodic {
            project.source_periodic = Some(periodic);
        }
        if let Some(params) = changes.input_parameters {
            project.input_parameters = non_empty(Some(params));
        }
        if !project.has_trigger() {
            return Err(RdkError::MissingTrigger(project.rule_name));
        }
        project.save(root)?;
        Ok(project)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Store the event trigger as a trimmed, comma-joined list so the stack
/// template's plain split sees the same types the local harness does.
fn normalize_events(value: Option<String>) -> Option<String> {
    value
        .map(|raw| split_resource_types(&raw).join(","))
        .filter(|joined| !joined.is_empty())
}

fn copy_code_templates(root: &Path, project: &RuleProject) -> Result<()> {
    let rdk = paths::rdk_dir(root);
    let dir = project.dir(root);
    let source = project.source_path(root);

    match project.source_runtime.family() {
        RuntimeFamily::Python => {
            copy_template(&rdk.join(paths::PYTHON_CODE_TEMPLATE), &source)?;
            copy_template(&rdk.join(paths::UTIL_FILE), &dir.join(paths::UTIL_FILE))?;
        }
        RuntimeFamily::Node => {
            copy_template(&rdk.join(paths::NODE_CODE_TEMPLATE), &source)?;
        }
        RuntimeFamily::Java | RuntimeFamily::DotNet => {
            let stub = format!("// {} rule code\n", project.rule_name);
            io::atomic_write(&source, stub.as_bytes())?;
        }
    }
    Ok(())
}

fn copy_template(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        return Err(RdkError::NotInitialized);
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Split a comma separated resource-type list, trimming entries and dropping
/// empty ones.
pub fn split_resource_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Discovery and selection
// ---------------------------------------------------------------------------

/// A directory is a rule iff it holds `<dirname>.<ext>` for a known extension.
pub fn is_rule_dir(dir: &Path) -> bool {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    RuntimeFamily::all_extensions()
        .iter()
        .any(|ext| dir.join(format!("{name}.{ext}")).is_file())
}

/// All rules in the working directory, sorted by name. Skips the scaffold
/// directory and hidden directories.
pub fn list_rules(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == paths::RDK_DIR || name.starts_with('.') {
            continue;
        }
        if is_rule_dir(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve the rules a command acts on.
///
/// Explicit names are checked up front so a typo fails before anything is
/// packaged or uploaded.
pub fn select_rules(root: &Path, names: &[String], all: bool) -> Result<Vec<String>> {
    match (all, names.is_empty()) {
        (true, false) => Err(RdkError::ConflictingSelection),
        (false, true) => Err(RdkError::NoRulesSelected),
        (true, true) => list_rules(root),
        (false, false) => {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let dir = paths::rule_dir(root, name);
                if !dir.is_dir() || !is_rule_dir(&dir) {
                    return Err(RdkError::RuleNotFound(name.clone()));
                }
                if !paths::parameters_path(root, name).exists() {
                    return Err(RdkError::ParametersNotFound(name.clone()));
                }
                if !selected.contains(name) {
                    selected.push(name.clone());
                }
            }
            Ok(selected)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
