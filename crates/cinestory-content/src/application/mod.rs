//! Ingestion and loading of story graphs.

pub mod ingest;
pub mod source;
