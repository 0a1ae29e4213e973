//! Per-entity database operations
//!
//! Typed create/read/update over the coordination schema. Consistency relies
//! on SQLite's atomic single-row operations; there is no in-process locking.

pub mod audit;
pub mod decisions;
pub mod jobs;
