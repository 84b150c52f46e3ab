// Library root: exposes the relay pipeline for the binary and integration tests.
// The binary entry point is src/main.rs.

pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod relay;
pub mod subsystems;

pub use self::core::{config, error};
pub use bootstrap::logger;
