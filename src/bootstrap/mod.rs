//! Bootstrap layer: modules that run before the relay starts.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
