//! Command handlers for the tariff CLI.

pub mod ask;
pub mod prompts;

pub use ask::AskCommand;
pub use prompts::PromptsCommand;
