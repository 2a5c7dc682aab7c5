//! GPIO Error Types
//!
//! Setup errors are fatal for the hardware backend; read errors are
//! transient and only skip one watch tick.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::types::PinNumber;

/// Step of the per-pin setup sequence, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Export,
    Direction,
    Edge,
    ActiveLow,
    VerifyValue,
    Watch,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Export => write!(f, "export"),
            Self::Direction => write!(f, "set direction"),
            Self::Edge => write!(f, "set edge"),
            Self::ActiveLow => write!(f, "set active_low"),
            Self::VerifyValue => write!(f, "verify value file"),
            Self::Watch => write!(f, "watch directory"),
        }
    }
}

/// Failure bringing a pin under observation
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("pin {pin}: {step} failed ({}): {source}", path.display())]
    Io {
        pin: PinNumber,
        step: SetupStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pin {pin}: unable to watch {}: {source}", dir.display())]
    Watch {
        pin: PinNumber,
        dir: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("unable to resolve GPIO root {}: {source}", root.display())]
    Root {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to create filesystem watcher: {0}")]
    Watcher(#[from] notify::Error),
}

impl SetupError {
    /// Pin the failure belongs to, if it is pin specific
    pub fn pin(&self) -> Option<PinNumber> {
        match self {
            Self::Io { pin, .. } | Self::Watch { pin, .. } => Some(*pin),
            Self::Root { .. } | Self::Watcher(_) => None,
        }
    }

    /// Setup step that failed, if it is pin specific
    pub fn step(&self) -> Option<SetupStep> {
        match self {
            Self::Io { step, .. } => Some(*step),
            Self::Watch { .. } => Some(SetupStep::Watch),
            Self::Root { .. } | Self::Watcher(_) => None,
        }
    }
}

/// Transient failure reading a pin's value file
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("unable to read value file, pin={pin}: {source}")]
    Io {
        pin: PinNumber,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse pin value, pin={pin} value={raw:?}")]
    Parse { pin: PinNumber, raw: String },
}

/// The consumer side of the event stream is gone
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pin event stream closed")]
pub struct StreamClosed;

/// Result type alias for pin setup
pub type SetupResult<T> = Result<T, SetupError>;
