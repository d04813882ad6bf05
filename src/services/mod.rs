//! Services - classification and the sensing loop
//!
//! - `classifier` - Distance to parking status
//! - `poll_loop` - Idle/Active state machine driving sensor and remote

pub mod classifier;
pub mod poll_loop;

// Re-export commonly used types
pub use classifier::classify;
pub use poll_loop::{LoopState, LoopTiming, PollLoop, Transition};
