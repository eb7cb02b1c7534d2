//! Storage engine: Transposer Graph, physical inventory contents,
//! Item Index, Reservation Overlay, Drone Staging, Diff Broadcast, and
//! the BFS router that moves items between them.

pub mod config;
pub mod diff;
pub mod drone_staging;
pub mod engine;
pub mod error;
pub mod index;
pub mod inventory;
pub mod item;
pub mod reservation;
pub mod router;
pub mod topology;

pub use diff::{compute_diff, DiffEntry};
pub use engine::{ExtractResult, InsertResult, StorageEngine};
pub use error::RequestStatus;
pub use index::{IndexEntry, ItemIndex};
pub use item::{ItemAttributes, ItemKind};
pub use reservation::ReservationOverlay;
pub use topology::{InventoryId, InventoryRole, TransposerGraph};
