//! System-prompt management.
//!
//! This crate provides:
//! - YAML prompt definitions and a workspace override file
//! - The built-in LTL rules-tariff prompt
//! - Strict `{context_data}` / `{response_type}` template formatting

pub mod builder;
pub mod default;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::format_system_prompt;
pub use default::{DEFAULT_PROMPT_ID, DEFAULT_SYSTEM_PROMPT};
pub use loader::{list_prompts, load_prompt, resolve_system_prompt, save_system_prompt};
pub use types::{PromptDefinition, PromptSource, SystemPrompt};
