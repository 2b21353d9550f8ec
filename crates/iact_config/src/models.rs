//! Configuration sections and the test specifications built from them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use iact_cloud::{Credential, Parameters, Tags, TemplateRef};
use serde::{Deserialize, Serialize};

/// Template source settings of a project or test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub template_id: Option<String>,
    pub template_version: Option<String>,
    /// Local file or directory, relative to the project root.
    pub template_location: Option<PathBuf>,
    /// Transform used when wrapping Terraform files.
    pub tf_version: Option<String>,
}

/// The `general` section, shared by every project on the machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub auth: Credential,
    pub regions: Vec<String>,
    pub parameters: Parameters,
    pub parameters_order: Vec<String>,
    pub tags: Tags,
}

/// The `project` section and, after merging, every test section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub auth: Credential,
    pub regions: Vec<String>,
    pub parameters: Parameters,
    pub parameters_order: Vec<String>,
    pub tags: Tags,
    pub role_name: Option<String>,
    pub template_config: TemplateConfig,
}

/// A test section has the same shape as the project section.
pub type TestConfig = ProjectConfig;

/// Fully merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IactConfig {
    pub general: GeneralConfig,
    pub project: ProjectConfig,
    pub tests: BTreeMap<String, TestConfig>,
}

/// Terminal error attached to a test specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecError {
    pub code: String,
    pub message: String,
}

impl SpecError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// One (test, region) pair ready for parameter resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpecification {
    pub test_name: String,
    pub region: String,
    pub template: TemplateRef,
    /// Raw values, possibly holding sentinel placeholders until resolved.
    pub parameters: Parameters,
    #[serde(default)]
    pub parameters_order: Vec<String>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub error: Option<SpecError>,
}

impl TestSpecification {
    pub fn new(
        test_name: impl Into<String>,
        region: impl Into<String>,
        template: TemplateRef,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            region: region.into(),
            template,
            parameters: Parameters::new(),
            parameters_order: Vec::new(),
            tags: Tags::new(),
            credential: Credential::default(),
            role_name: None,
            error: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters_order(mut self, order: Vec<String>) -> Self {
        self.parameters_order = order;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: SpecError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_reject_unknown_fields() {
        let yaml = "auth: {name: default}\nregions: [cn-hangzhou]\nbogus: 1\n";
        assert!(serde_yaml::from_str::<GeneralConfig>(yaml).is_err());
    }

    #[test]
    fn test_project_section_parses() {
        let yaml = r#"
name: demo
regions: [cn-hangzhou]
parameters:
  VpcId: $[iact3-auto]
  InstanceType: ecs.g6.large
template_config:
  template_location: templates/
"#;
        let project: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(project.name.as_deref(), Some("demo"));
        let keys: Vec<&String> = project.parameters.keys().collect();
        assert_eq!(keys, vec!["VpcId", "InstanceType"]);
        assert_eq!(
            project.template_config.template_location,
            Some(PathBuf::from("templates/"))
        );
    }

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::new("InvalidTemplate", "template body is empty");
        assert_eq!(err.to_string(), "InvalidTemplate: template body is empty");
    }
}
