use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// ALM targets with their own exemplar table. Unknown identifiers fall back to Jira.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlmTool {
    Jira,
    Azure,
    Polarion,
    Etl,
}

impl AlmTool {
    pub const ALL: [AlmTool; 4] = [AlmTool::Jira, AlmTool::Azure, AlmTool::Polarion, AlmTool::Etl];

    /// Case-insensitive lookup; anything unrecognised maps to [`AlmTool::Jira`].
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "jira" => AlmTool::Jira,
            "azure" | "azure devops" | "azure_devops" | "ado" => AlmTool::Azure,
            "polarion" => AlmTool::Polarion,
            "etl" => AlmTool::Etl,
            _ => AlmTool::Jira,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlmTool::Jira => "jira",
            AlmTool::Azure => "azure",
            AlmTool::Polarion => "polarion",
            AlmTool::Etl => "etl",
        }
    }

    pub fn example_file_name(&self) -> String {
        format!("{}_testcase_eg.csv", self.as_str())
    }
}

impl fmt::Display for AlmTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: String,
}

/// References captured for one ALM system. Jira sends `tickets`, the others `items`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlmInput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl AlmInput {
    pub fn references(&self) -> impl Iterator<Item = &String> {
        self.tickets.iter().chain(self.items.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementInput {
    Typed { text: String },
    File { file_name: String, content: String },
    Alm { alm_tool: String, reference: String },
}

/// Everything one pipeline run consumes.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub typed_requirements: Vec<String>,
    pub uploaded_files: Vec<UploadedFile>,
    pub alm_inputs: BTreeMap<String, AlmInput>,
    pub alm_tool: String,
    /// Replaces the composed user request when set.
    pub external_prompt: Option<String>,
}

impl PipelineRequest {
    pub fn typed(requirements: Vec<String>, alm_tool: &str) -> Self {
        Self {
            typed_requirements: requirements,
            alm_tool: alm_tool.to_string(),
            ..Self::default()
        }
    }

    pub fn inputs(&self) -> Vec<RequirementInput> {
        let mut inputs: Vec<RequirementInput> = self
            .typed_requirements
            .iter()
            .map(|text| RequirementInput::Typed { text: text.clone() })
            .collect();
        inputs.extend(self.uploaded_files.iter().map(|file| RequirementInput::File {
            file_name: file.file_name.clone(),
            content: file.content.clone(),
        }));
        for (tool, input) in &self.alm_inputs {
            inputs.extend(input.references().map(|reference| RequirementInput::Alm {
                alm_tool: tool.clone(),
                reference: reference.clone(),
            }));
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alm_tool_normalize() {
        assert_eq!(AlmTool::normalize("JIRA"), AlmTool::Jira);
        assert_eq!(AlmTool::normalize(" Azure DevOps "), AlmTool::Azure);
        assert_eq!(AlmTool::normalize("polarion"), AlmTool::Polarion);
        assert_eq!(AlmTool::normalize("Etl"), AlmTool::Etl);
        assert_eq!(AlmTool::normalize("rally"), AlmTool::Jira);
        assert_eq!(AlmTool::normalize(""), AlmTool::Jira);
    }

    #[test]
    fn test_inputs_flatten_every_source() {
        let mut request = PipelineRequest::typed(vec!["Login works".to_string()], "jira");
        request.uploaded_files.push(UploadedFile {
            file_name: "req.txt".to_string(),
            content: "Patients can book".to_string(),
        });
        request.alm_inputs.insert(
            "Jira".to_string(),
            AlmInput {
                tickets: vec!["HC-12".to_string()],
                items: vec![],
            },
        );

        let inputs = request.inputs();
        assert_eq!(inputs.len(), 3);
        assert_eq!(
            inputs[2],
            RequirementInput::Alm {
                alm_tool: "Jira".to_string(),
                reference: "HC-12".to_string(),
            }
        );
    }

    #[test]
    fn test_alm_input_skips_empty_lists_when_serialized() {
        let input = AlmInput {
            tickets: vec![],
            items: vec!["WI-7".to_string()],
        };
        assert_eq!(serde_json::to_string(&input).unwrap(), r#"{"items":["WI-7"]}"#);
    }
}
