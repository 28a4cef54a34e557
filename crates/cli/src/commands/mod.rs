//! Command handlers for the Concierge CLI.

pub mod ask;
pub mod chat;
pub mod schema;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use schema::SchemaCommand;
