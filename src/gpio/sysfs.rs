//! Sysfs GPIO Protocol
//!
//! File layout under `/sys/class/gpio`:
//!
//! | Action        | Path                    | Payload         |
//! |---------------|-------------------------|-----------------|
//! | Export        | `export`                | decimal pin     |
//! | Set direction | `gpio{N}/direction`     | `in`            |
//! | Set edge      | `gpio{N}/edge`          | `both`          |
//! | Set polarity  | `gpio{N}/active_low`    | `1`             |
//! | Read value    | `gpio{N}/value`         | one ASCII digit |
//!
//! Pins are never unexported.

use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use super::error::{ReadError, SetupError, SetupResult, SetupStep};
use super::types::{Pin, PinNumber};

/// Default sysfs GPIO class directory
pub const DEFAULT_ROOT: &str = "/sys/class/gpio";

/// Name of the per-pin value file
pub const VALUE_FILE: &str = "value";

/// Sysfs GPIO driver rooted at a class directory
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Sysfs {
    /// Create a driver rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Same driver with the root resolved against the working directory.
    ///
    /// Filesystem notifications always carry absolute paths.
    pub fn absolute(&self) -> SetupResult<Self> {
        std::path::absolute(&self.root)
            .map(Self::new)
            .map_err(|source| SetupError::Root {
                root: self.root.clone(),
                source,
            })
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join("export")
    }

    pub fn pin_dir(&self, pin: PinNumber) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    pub fn value_path(&self, pin: PinNumber) -> PathBuf {
        self.pin_dir(pin).join(VALUE_FILE)
    }

    pub fn direction_path(&self, pin: PinNumber) -> PathBuf {
        self.pin_dir(pin).join("direction")
    }

    pub fn edge_path(&self, pin: PinNumber) -> PathBuf {
        self.pin_dir(pin).join("edge")
    }

    pub fn active_low_path(&self, pin: PinNumber) -> PathBuf {
        self.pin_dir(pin).join("active_low")
    }

    /// Check whether the pin's control directory is present
    pub fn is_exported(&self, pin: PinNumber) -> bool {
        self.pin_dir(pin).is_dir()
    }

    /// Export the pin unless a previous run already did
    pub fn export(&self, pin: PinNumber) -> SetupResult<()> {
        if self.is_exported(pin) {
            debug!("Pin {} already exported", pin);
            return Ok(());
        }
        write_attribute(pin, SetupStep::Export, &self.export_path(), &pin.to_string())
    }

    pub fn set_direction_in(&self, pin: PinNumber) -> SetupResult<()> {
        write_attribute(pin, SetupStep::Direction, &self.direction_path(pin), "in")
    }

    pub fn set_edge_both(&self, pin: PinNumber) -> SetupResult<()> {
        write_attribute(pin, SetupStep::Edge, &self.edge_path(pin), "both")
    }

    pub fn set_active_low(&self, pin: PinNumber) -> SetupResult<()> {
        write_attribute(pin, SetupStep::ActiveLow, &self.active_low_path(pin), "1")
    }

    /// Make sure the value file can be opened for reading
    pub fn verify_value_readable(&self, pin: PinNumber) -> SetupResult<()> {
        let path = self.value_path(pin);
        OpenOptions::new()
            .read(true)
            .open(&path)
            .map(|_| ())
            .map_err(|source| SetupError::Io {
                pin,
                step: SetupStep::VerifyValue,
                path,
                source,
            })
    }

    /// Run the full input configuration sequence for one pin.
    ///
    /// Stops at the first failing step.
    pub fn configure_input(&self, pin: PinNumber) -> SetupResult<()> {
        self.export(pin)?;
        self.set_direction_in(pin)?;
        self.set_edge_both(pin)?;
        self.set_active_low(pin)?;
        self.verify_value_readable(pin)
    }

    /// Read the current level of a pin
    pub async fn read_value(&self, pin: PinNumber) -> Result<Pin, ReadError> {
        read_value_file(pin, &self.value_path(pin)).await
    }
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

/// Read one byte from a value file and parse it as a line level
pub async fn read_value_file(pin: PinNumber, path: &Path) -> Result<Pin, ReadError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ReadError::Io { pin, source })?;

    let mut buf = [0u8; 1];
    let n = file
        .read(&mut buf)
        .await
        .map_err(|source| ReadError::Io { pin, source })?;

    match Pin::parse_value(&buf[..n]) {
        Some(value) => Ok(Pin::new(pin, value)),
        None => Err(ReadError::Parse {
            pin,
            raw: String::from_utf8_lossy(&buf[..n]).into_owned(),
        }),
    }
}

/// Write a payload to an existing attribute file (never created)
fn write_attribute(pin: PinNumber, step: SetupStep, path: &Path, payload: &str) -> SetupResult<()> {
    let io_err = |source: std::io::Error| SetupError::Io {
        pin,
        step,
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(payload.as_bytes()).map_err(io_err)?;
    file.sync_all().or_else(ignore_unsupported_sync).map_err(io_err)?;

    debug!("Wrote {:?} to {}", payload, path.display());
    Ok(())
}

/// sysfs attributes reject fsync on some kernels
fn ignore_unsupported_sync(err: std::io::Error) -> std::io::Result<()> {
    if err.kind() == std::io::ErrorKind::InvalidInput {
        Ok(())
    } else {
        Err(err)
    }
}
