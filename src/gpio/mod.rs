//! GPIO Module
//!
//! Pin sources feeding the broadcaster:
//! - Sysfs protocol driver (`/sys/class/gpio`)
//! - Hardware watcher driven by filesystem notifications
//! - In-memory simulator for development without hardware
//! - Single-producer event stream connecting the active source to its consumer

pub mod error;
pub mod simulator;
pub mod stream;
pub mod sysfs;
pub mod types;
pub mod watcher;

pub use error::{ReadError, SetupError, SetupStep, StreamClosed};
pub use simulator::PinSimulator;
pub use stream::{event_stream, PinReceiver, PinSender, STREAM_CAPACITY};
pub use sysfs::Sysfs;
pub use types::{Pin, PinNumber, PinWatchSet};
pub use watcher::{PinWatcher, WatchHandle};
