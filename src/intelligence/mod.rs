pub mod gateway;
pub mod prompts;
pub mod provider;

pub use gateway::GatewayClient;
pub use prompts::*;
pub use provider::{ChatMessage, CompletionError, CompletionProvider};
