//! Prompt definition types.

use serde::{Deserialize, Serialize};

/// A system-prompt definition loaded from YAML.
///
/// The template carries two substitution markers, `{context_data}` and
/// `{response_type}`; literal braces are written doubled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Response type this prompt was written for, overriding the configured
    /// default when set
    #[serde(rename = "responseType", default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,

    /// Template text
    pub template: String,
}

/// Where a resolved system-prompt template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// `.tariff/prompts/<id>.yml`
    Definition(String),
    /// `.tariff/system_prompt.txt`
    WorkspaceFile,
    /// Compiled-in tariff extraction prompt
    BuiltIn,
}

/// A template ready for formatting, plus its provenance.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub template: String,
    pub response_type: Option<String>,
    pub source: PromptSource,
}
