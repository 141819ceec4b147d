//! Record types for every stage file.

pub mod claim;
pub mod config;
pub mod evidence;
pub mod pair;
pub mod stats;
pub mod task;
pub mod verdict;
