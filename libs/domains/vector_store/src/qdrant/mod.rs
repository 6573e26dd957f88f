//! Qdrant backend over gRPC.

mod client;
mod config;

pub use client::{QdrantAdapter, QdrantConnector};
pub use config::QdrantConfig;
