//! Chroma backend over the REST v2 API (server mode).

mod client;
mod config;

pub use client::{ChromaAdapter, ChromaConnector};
pub use config::ChromaConfig;
