//! Prompts command handler.
//!
//! Lists, shows and overrides the system prompt templates in the workspace.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use tariff_core::{config::AppConfig, AppError, AppResult};
use tariff_prompt::{
    format_system_prompt, list_prompts, resolve_system_prompt, save_system_prompt,
    DEFAULT_PROMPT_ID,
};

/// Manage system prompts
#[derive(Args, Debug)]
pub struct PromptsCommand {
    #[command(subcommand)]
    pub action: Option<PromptsAction>,
}

#[derive(Subcommand, Debug)]
pub enum PromptsAction {
    /// List prompt ids (default)
    List,

    /// Print a prompt template (default: the one `ask` would use)
    Show {
        /// Prompt id
        id: Option<String>,
    },

    /// Replace the workspace system prompt with the contents of a file
    Set {
        /// Template file containing {context_data} and {response_type}
        file: PathBuf,
    },
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match self.action.as_ref().unwrap_or(&PromptsAction::List) {
            PromptsAction::List => {
                println!("{} (built-in)", DEFAULT_PROMPT_ID);
                for id in list_prompts(&config.workspace)? {
                    println!("{}", id);
                }
                Ok(())
            }
            PromptsAction::Show { id } => {
                let id = id.as_deref().or(config.search.prompt_id.as_deref());
                let prompt = resolve_system_prompt(&config.workspace, id)?;
                tracing::debug!("Showing prompt from {:?}", prompt.source);
                println!("{}", prompt.template);
                Ok(())
            }
            PromptsAction::Set { file } => {
                let template = std::fs::read_to_string(file).map_err(|e| {
                    AppError::Config(format!("Failed to read template {:?}: {}", file, e))
                })?;
                // Reject templates that would fail at search time.
                format_system_prompt(&template, "", "")?;
                let path = save_system_prompt(&config.workspace, &template)?;
                println!("System prompt saved to {}", path.display());
                Ok(())
            }
        }
    }
}
