//! Oracle implementations.
//!
//! This module provides a reference implementation of the `AI` trait.
//! Users can use it directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAI, DEFAULT_BASE_URL, DEFAULT_MODEL};
