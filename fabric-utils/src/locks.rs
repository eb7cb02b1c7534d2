#![allow(clippy::disallowed_types)]
//! Lock type aliases, kept in one place so swapping the lock
//! implementation never touches call sites.

/// A synchronous mutex, held only across non-blocking critical sections.
pub type SyncMutex<T> = parking_lot::Mutex<T>;
/// A synchronous read-write lock.
pub type SyncRwLock<T> = parking_lot::RwLock<T>;

/// An asynchronous mutex, used where the critical section itself awaits.
pub type AsyncMutex<T> = tokio::sync::Mutex<T>;
/// An asynchronous read-write lock.
pub type AsyncRwLock<T> = tokio::sync::RwLock<T>;
