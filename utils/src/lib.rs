//! Shared infrastructure utilities for becwatch.
//!
//! - **`redact`**: PII scrubbing before text leaves the machine
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)

pub mod atomic_write;
pub mod redact;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options,
};
pub use redact::{redact_api_keys, redact_pii};
