//! Retriever implementations for source content.
//!
//! - `JinaRetriever` - Jina Reader API (requires `jina` feature)
//! - `RateLimitedRetriever` - requests-per-second quota around any retriever
//! - `MockRetriever` - For testing

mod mock;
mod rate_limited;

#[cfg(feature = "jina")]
mod jina;

pub use mock::{MockResponse, MockRetriever};
pub use rate_limited::RateLimitedRetriever;

#[cfg(feature = "jina")]
pub use jina::{JinaRetriever, JINA_READER_URL};

pub use crate::traits::retriever::{RawPage, Retriever, ValidatedRetriever};
