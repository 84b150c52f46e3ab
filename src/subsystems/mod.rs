//! Subsystems of the relay bot.

pub mod comms;
pub mod runtime;
