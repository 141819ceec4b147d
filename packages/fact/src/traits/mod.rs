//! Core trait abstractions.

pub mod ai;
pub mod retriever;
