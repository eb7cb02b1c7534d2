//! Shared, non-domain-specific support used by every other crate in
//! the fabric workspace: lock aliases, id types, the console debug-log
//! registry, and the §7 error taxonomy.

pub mod error;
pub mod ids;
pub mod locks;
pub mod logger;

pub use error::{ConfigFatal, RuntimeFatal};
pub use ids::{IdCounter, TaskId, TicketId};
