//! Crafting Server internals: the Dependency Solver, the Craft Ticket
//! state machine, the Dispatcher that drives it, the Staging
//! Allocator, and the Worker Pool (spec §4.7–§4.9, §2 WP).

pub mod dispatcher;
pub mod error;
pub mod solver;
pub mod staging;
pub mod ticket;
pub mod worker_pool;

pub use dispatcher::Bus;
pub use error::TicketError;
pub use solver::{Plan, SolverPriority, SolveStatus};
pub use staging::{StagingAllocator, StagingUsage};
pub use ticket::{CraftTicket, CraftingTask, PENDING_EXPIRY, STORAGE_EXTRACT_TIMEOUT, TicketStatus};
pub use worker_pool::{WorkerAddr, WorkerPool, WorkerState};
