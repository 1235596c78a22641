//! Upstream index access.
//!
//! # Data Flow
//! ```text
//! IndexQuery {query, variables}
//!     → query.rs (normalize + hash into DedupKey)
//!     → client.rs (POST to index, map failures to IndexError)
//!     → types.rs (unwrap envelope, decode + validate IndexRecord)
//! ```
//!
//! # Design Decisions
//! - Executors return owned `'static` futures so the scheduler can drop them
//!   on timeout, which cancels the HTTP call
//! - Payloads become typed records at this boundary, never deeper

pub mod client;
pub mod query;
pub mod types;

pub use client::{IndexClient, QueryExecutor};
pub use query::DedupKey;
pub use types::{decode_record, IndexError, IndexQuery, IndexRecord, IndexResult};
