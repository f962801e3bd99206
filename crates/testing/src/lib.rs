//! Testing utilities for the RPC latency stats crates
//!
//! - Mock sinks that record, fail, or stall writes
//! - Fixtures for measurement templates and test method names
//!
//! ```
//! use rpcstats_testing::{fixtures::*, mocks::*};
//!
//! let sink = RecordingSink::new();
//! let options = test_options();
//! assert_eq!(sink.write_count(), 0);
//! assert_eq!(options.measurement, TEST_MEASUREMENT);
//! ```

pub mod fixtures;
pub mod mocks;

// Re-export commonly used types
pub use fixtures::*;
pub use mocks::*;
