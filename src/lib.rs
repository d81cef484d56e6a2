//! LOOM - Frame range expressions and render output helpers
//!
//! Re-exports all modules for use by the `loom` binary.

// Core parsing
pub mod frames;
pub mod utils;

// Render output
pub mod sequence;
pub mod version;

// App modules
pub mod cli;
pub mod config;
pub mod paths;

pub use frames::{filter_frames, FrameError, FrameFilter, Frames};
pub use sequence::{OutputPattern, Report, SequenceError};
