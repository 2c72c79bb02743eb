//! Authoritative conversation log for mnemo.
//!
//! The [`SessionStore`] keeps every conversation in memory, keyed by an
//! opaque session key such as `"telegram:123456"`, and snapshots sessions to
//! one JSON file each. Eligible messages are also forwarded, in the
//! background, to a [`mnemo_memory::SemanticMemory`] so they can be recalled
//! by meaning later. Semantic memory is strictly secondary: when it is
//! disabled or failing the log behaves exactly the same.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mnemo_memory::SemanticMemory;
//! use mnemo_session::SessionStore;
//! use mnemo_types::Message;
//!
//! let store = SessionStore::open(Some("sessions".into()), Arc::new(SemanticMemory::disabled()))?;
//! store.add_message("telegram:1", Message::user("hello"));
//! store.save("telegram:1")?;
//! ```

mod error;
mod indexer;
mod persistence;
mod policy;
mod session;
mod store;

pub use error::{Error, Result};
pub use persistence::{SnapshotDir, sanitize_filename, validate_filename};
pub use policy::{HEARTBEAT_SESSION_KEY, should_index};
pub use session::Session;
pub use store::SessionStore;
