//! Structured logging setup.
//!
//! Console output in pretty, compact or JSON form, filtered by `RUST_LOG` or
//! the `[observability.logging]` config section.

mod tracing_init;

pub use tracing_init::*;
