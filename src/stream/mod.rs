//! Streaming: NDJSON decoding and incremental log persistence.

mod ndjson;
mod persister;

pub use ndjson::NdjsonDecoder;
pub use persister::{LogStatus, StreamPersister, DEFAULT_FLUSH_INTERVAL};
