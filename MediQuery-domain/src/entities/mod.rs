// Domain entities and value objects
pub mod query;

pub use query::{AskRequest, Attempt, ChatReply, QueryAnswer};
