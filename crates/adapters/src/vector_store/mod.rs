//! Vector store adapter implementations.

pub mod local;

#[cfg(feature = "qdrant")]
pub mod qdrant;
