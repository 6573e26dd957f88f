//! Milvus backend over the REST v2 API.

mod client;
mod config;

pub use client::{MilvusAdapter, MilvusConnector};
pub use config::MilvusConfig;
