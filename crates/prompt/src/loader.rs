//! Prompt loading from the workspace.
//!
//! Resolution order for the system prompt:
//! 1. a named definition in `.tariff/prompts/<id>.yml`
//! 2. a free-form `.tariff/system_prompt.txt`
//! 3. the built-in tariff prompt

use crate::default::{DEFAULT_PROMPT_ID, DEFAULT_SYSTEM_PROMPT};
use crate::types::{PromptDefinition, PromptSource, SystemPrompt};
use std::path::{Path, PathBuf};
use tariff_core::config::STATE_DIR;
use tariff_core::{AppError, AppResult};

/// File holding a workspace-wide system prompt override.
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

fn prompt_file_path(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    prompts_dir(workspace_path).join(format!("{}.yml", prompt_id))
}

fn system_prompt_path(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join(SYSTEM_PROMPT_FILE)
}

/// Load a prompt definition by ID from the workspace.
///
/// # Example
/// ```no_run
/// use tariff_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "tariff.brief")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_file_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all prompt IDs defined in the workspace, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Resolve the system prompt template for a search.
///
/// An explicit `prompt_id` that cannot be loaded is an error; the fallbacks
/// only apply when no id is requested.
pub fn resolve_system_prompt(
    workspace_path: &Path,
    prompt_id: Option<&str>,
) -> AppResult<SystemPrompt> {
    if let Some(id) = prompt_id {
        if id == DEFAULT_PROMPT_ID && !prompt_file_path(workspace_path, id).exists() {
            return Ok(built_in_prompt());
        }
        let definition = load_prompt(workspace_path, id)?;
        return Ok(SystemPrompt {
            template: definition.template,
            response_type: definition.response_type,
            source: PromptSource::Definition(definition.id),
        });
    }

    let override_path = system_prompt_path(workspace_path);
    if override_path.exists() {
        let template = std::fs::read_to_string(&override_path)?;
        if !template.trim().is_empty() {
            tracing::debug!("Using workspace system prompt {:?}", override_path);
            return Ok(SystemPrompt {
                template,
                response_type: None,
                source: PromptSource::WorkspaceFile,
            });
        }
    }

    Ok(built_in_prompt())
}

fn built_in_prompt() -> SystemPrompt {
    SystemPrompt {
        template: DEFAULT_SYSTEM_PROMPT.to_string(),
        response_type: None,
        source: PromptSource::BuiltIn,
    }
}

/// Persist a workspace-wide system prompt override.
pub fn save_system_prompt(workspace_path: &Path, template: &str) -> AppResult<PathBuf> {
    if template.trim().is_empty() {
        return Err(AppError::Prompt("System prompt cannot be empty".to_string()));
    }

    let path = system_prompt_path(workspace_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, template)?;

    tracing::info!("Saved system prompt to {:?}", path);
    Ok(path)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_prompt(dir: &Path, id: &str, valid: bool) -> PathBuf {
        let prompts = prompts_dir(dir);
        fs::create_dir_all(&prompts).unwrap();

        let content = if valid {
            format!(
                r#"
id: {}
title: "Test Prompt"
apiVersion: "1.0"
responseType: "table"
template: "Answer as {{response_type}} using {{context_data}}"
"#,
                id
            )
        } else {
            "invalid: yaml: content:".to_string()
        };

        let file_path = prompts.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "tariff.table", true);

        let prompt = load_prompt(temp_dir.path(), "tariff.table").unwrap();
        assert_eq!(prompt.id, "tariff.table");
        assert_eq!(prompt.template, "Answer as {response_type} using {context_data}");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "invalid", false);
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_list_prompts_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "zeta", true);
        create_test_prompt(temp_dir.path(), "alpha", true);

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = resolve_system_prompt(temp_dir.path(), None).unwrap();
        assert_eq!(prompt.source, PromptSource::BuiltIn);
        assert!(prompt.template.contains("{context_data}"));
    }

    #[test]
    fn test_resolve_prefers_workspace_file() {
        let temp_dir = TempDir::new().unwrap();
        save_system_prompt(temp_dir.path(), "Custom {context_data}").unwrap();

        let prompt = resolve_system_prompt(temp_dir.path(), None).unwrap();
        assert_eq!(prompt.source, PromptSource::WorkspaceFile);
        assert_eq!(prompt.template, "Custom {context_data}");
    }

    #[test]
    fn test_resolve_named_definition() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "tariff.table", true);

        let prompt = resolve_system_prompt(temp_dir.path(), Some("tariff.table")).unwrap();
        assert_eq!(prompt.source, PromptSource::Definition("tariff.table".to_string()));
        assert_eq!(prompt.response_type.as_deref(), Some("table"));

        assert!(resolve_system_prompt(temp_dir.path(), Some("missing")).is_err());
    }

    #[test]
    fn test_resolve_builtin_id_without_file() {
        let temp_dir = TempDir::new().unwrap();
        save_system_prompt(temp_dir.path(), "Custom {context_data}").unwrap();

        let prompt = resolve_system_prompt(temp_dir.path(), Some(DEFAULT_PROMPT_ID)).unwrap();
        assert_eq!(prompt.source, PromptSource::BuiltIn);
    }

    #[test]
    fn test_save_rejects_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(save_system_prompt(temp_dir.path(), "   ").is_err());
    }
}
