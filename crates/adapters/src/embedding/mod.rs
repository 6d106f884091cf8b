//! Embedding adapter implementations.

#[cfg(feature = "openai")]
pub mod openai;

pub mod hashed;
