pub mod chat;
pub mod query;

// Domain services
// This module contains business logic implementations.

pub use chat::{is_exit, ChatServiceTrait, ChatSession, EXIT_COMMAND};
pub use query::{QueryService, QueryServiceConfig, QueryServiceError, QueryServiceTrait};
