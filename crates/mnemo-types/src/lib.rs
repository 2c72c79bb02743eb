//! Shared conversation types for the mnemo memory subsystem.

pub mod message;

pub use message::{FunctionCall, Message, ParseRoleError, Role, ToolCall};
