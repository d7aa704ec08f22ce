//! netjitter - Adaptive jitter buffer for real-time network audio
//!
//! A network receiver thread inserts fixed-size PCM slots as they arrive off
//! a lossy, out-of-order datagram stream; an audio callback drains them at
//! the sound card's fixed rate. The engine smooths arrival jitter, conceals
//! packet loss with silence, corrects sustained clock skew by inserting or
//! dropping audio, and exposes a delayed monitor tap for local playback.

pub mod config;
pub mod engine;
pub mod error;
mod monitor;
mod policy;
mod ring;
pub mod stats;

pub use config::{EngineConfig, SlotFormat};
pub use engine::JitterEngine;
pub use error::{JitterError, Result};
pub use stats::StatsSnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
