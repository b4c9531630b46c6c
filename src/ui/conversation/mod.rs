//! Conversation UI components for the chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod streaming;

pub use commands::{get_help_text, parse_slash_command, ParsedCommand, SlashCommand};
pub use composer::ConversationComposer;
pub use history::ConversationHistory;
pub use manager::{AppEvent, ConversationAction, ConversationManager};
pub use streaming::TypingIndicator;
