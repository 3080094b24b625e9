//! navmodeld: フレームを評価して JSON-lines で送り出すデーモン

pub mod config;
pub mod daemon;
pub mod mock;
pub mod sched;
pub mod source;

pub use config::DaemonConfig;
pub use daemon::{FrameLoop, FrameStats};
