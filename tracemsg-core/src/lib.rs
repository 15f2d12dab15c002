pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod mongo;
pub mod store;

pub use crate::config::TraceConfig;
pub use error::TraceError;
pub use models::{DateRange, NewTrace, TraceMessage};
pub use mongo::MongoTraceStore;
pub use store::{create_store, MemoryTraceStore, TraceStore, TraceStream};
