//! Loading and merging of global, project and override configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{GeneralConfig, IactConfig, ProjectConfig, TestConfig};

/// Prefix used for generated names, tags and sentinels.
pub const PRODUCT_PREFIX: &str = "iact3";

/// Default project file name, looked up under the project root.
pub const DEFAULT_CONFIG_FILE: &str = ".iact3.yml";

const GENERAL: &str = "general";
const PROJECT: &str = "project";
const TESTS: &str = "tests";

/// Settings given on the command line, merged above the project section.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub regions: Option<Vec<String>>,
    pub template_location: Option<PathBuf>,
    pub project_name: Option<String>,
}

impl ConfigOverrides {
    fn is_empty(&self) -> bool {
        self.regions.is_none() && self.template_location.is_none() && self.project_name.is_none()
    }

    fn to_value(&self) -> Value {
        let mut project = Mapping::new();
        if let Some(name) = &self.project_name {
            project.insert("name".into(), name.clone().into());
        }
        if let Some(regions) = &self.regions {
            project.insert(
                "regions".into(),
                Value::Sequence(regions.iter().cloned().map(Value::from).collect()),
            );
        }
        if let Some(location) = &self.template_location {
            let mut template = Mapping::new();
            template.insert(
                "template_location".into(),
                location.to_string_lossy().into_owned().into(),
            );
            project.insert("template_config".into(), Value::Mapping(template));
        }
        let mut root = Mapping::new();
        root.insert(PROJECT.into(), Value::Mapping(project));
        Value::Mapping(root)
    }
}

/// Loader for project configuration files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_root: PathBuf,
    config_file: PathBuf,
    global_file: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    /// Create a loader for the project rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            global_file: default_global_file(),
            overrides: ConfigOverrides::default(),
        }
    }

    /// Use a different project file, relative to the project root unless absolute.
    pub fn with_config_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config_file = file.into();
        self
    }

    /// Use a different global file, or none.
    pub fn with_global_file(mut self, file: Option<PathBuf>) -> Self {
        self.global_file = file;
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Path of the project configuration file.
    pub fn config_path(&self) -> PathBuf {
        if self.config_file.is_absolute() {
            self.config_file.clone()
        } else {
            self.project_root.join(&self.config_file)
        }
    }

    /// Read every source and merge general, project and test sections.
    pub fn load(&self) -> ConfigResult<IactConfig> {
        let mut merged = Value::Mapping(Mapping::new());

        if let Some(global) = &self.global_file {
            if global.is_file() {
                merged = merge_values(merged, read_yaml(global)?);
            } else {
                debug!("No global config at {:?}", global);
            }
        }

        let project_path = self.config_path();
        if !project_path.is_file() {
            return Err(ConfigError::NotFound(project_path));
        }
        merged = merge_values(merged, read_yaml(&project_path)?);

        if !self.overrides.is_empty() {
            merged = merge_values(merged, self.overrides.to_value());
        }

        let config = split_sections(merged, &project_path)?;
        if config.project.name.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("project.name".to_string()));
        }
        debug!(
            project = config.project.name.as_deref().unwrap_or_default(),
            tests = config.tests.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

fn default_global_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
}

fn read_yaml(path: &Path) -> ConfigResult<Value> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match value {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(value),
        _ => Err(ConfigError::InvalidFormat {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

/// Deep-merge two YAML values; mappings merge per key, anything else in
/// `overlay` replaces `base`. Null overlays keep the base.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => {
                        let previous = std::mem::replace(existing, Value::Null);
                        *existing = merge_values(previous, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn section(root: &Mapping, name: &str) -> Value {
    root.get(name)
        .cloned()
        .unwrap_or_else(|| Value::Mapping(Mapping::new()))
}

fn split_sections(merged: Value, path: &Path) -> ConfigResult<IactConfig> {
    let invalid = |section: &str, e: serde_yaml::Error| ConfigError::InvalidFormat {
        path: path.to_path_buf(),
        message: format!("{} section: {}", section, e),
    };

    let root = match merged {
        Value::Mapping(m) => m,
        _ => Mapping::new(),
    };
    for key in root.keys() {
        match key.as_str() {
            Some(GENERAL) | Some(PROJECT) | Some(TESTS) => {}
            other => warn!("Ignoring unknown config section {:?}", other),
        }
    }

    let general_value = section(&root, GENERAL);
    let project_value = merge_values(general_value.clone(), section(&root, PROJECT));

    let general: GeneralConfig =
        serde_yaml::from_value(general_value).map_err(|e| invalid(GENERAL, e))?;
    let project: ProjectConfig =
        serde_yaml::from_value(project_value.clone()).map_err(|e| invalid(PROJECT, e))?;

    let mut config = IactConfig {
        general,
        project,
        ..Default::default()
    };

    if let Value::Mapping(tests) = section(&root, TESTS) {
        for (name, value) in tests {
            let Some(name) = name.as_str().map(String::from) else {
                return Err(ConfigError::InvalidFormat {
                    path: path.to_path_buf(),
                    message: "test names must be strings".to_string(),
                });
            };
            let merged = merge_values(project_value.clone(), value);
            let test: TestConfig =
                serde_yaml::from_value(merged).map_err(|e| invalid(&name, e))?;
            config.tests.insert(name, test);
        }
    }
    Ok(config)
}
