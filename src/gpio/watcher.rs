//! Hardware Pin Watcher
//!
//! Brings a fixed set of sysfs GPIO lines under observation and publishes
//! every observed transition to the event stream. Setup is all-or-nothing:
//! the watch loop only starts once every pin in the set is configured.

use log::{debug, error, info, warn};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::{SetupError, SetupResult};
use super::stream::PinSender;
use super::sysfs::{read_value_file, Sysfs, VALUE_FILE};
use super::types::{PinNumber, PinWatchSet};

/// Hardware pin source backed by sysfs and filesystem notifications
pub struct PinWatcher {
    sysfs: Sysfs,
}

impl PinWatcher {
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }

    /// Configure every pin as an edge-triggered input and start the watch loop.
    ///
    /// Any failing step aborts the whole call; no events are published for a
    /// partially configured set.
    pub fn start_watch(&self, pins: &PinWatchSet, stream: PinSender) -> SetupResult<WatchHandle> {
        let sysfs = self.sysfs.absolute()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;

        let mut value_files = HashMap::new();
        for pin in pins.iter() {
            sysfs.configure_input(pin)?;

            let dir = sysfs.pin_dir(pin);
            watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|source| SetupError::Watch {
                    pin,
                    dir: dir.clone(),
                    source,
                })?;

            value_files.insert(sysfs.value_path(pin), pin);
            info!("Watching pin directory, number={} dir={}", pin, dir.display());
        }

        let task = tokio::spawn(watch_loop(watcher, event_rx, value_files, stream));

        Ok(WatchHandle {
            pins: pins.clone(),
            task,
        })
    }
}

/// Handle to a running watch loop
pub struct WatchHandle {
    pins: PinWatchSet,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Pins under observation
    pub fn pins(&self) -> &PinWatchSet {
        &self.pins
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and drop the filesystem watcher. Pins stay exported.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Writes to a value file surface as data modifications
fn is_value_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

async fn watch_loop(
    _watcher: RecommendedWatcher,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    value_files: HashMap<PathBuf, PinNumber>,
    stream: PinSender,
) {
    while let Some(res) = events.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                error!("Filesystem watcher error: {}", e);
                continue;
            }
        };

        if !is_value_write(&event.kind) {
            continue;
        }

        for path in &event.paths {
            if path.file_name().map_or(true, |name| name != VALUE_FILE) {
                continue;
            }
            let Some(&number) = value_files.get(path) else {
                debug!("Ignoring write to unwatched value file {}", path.display());
                continue;
            };

            match read_value_file(number, path).await {
                Ok(pin) => {
                    debug!("Pin changed, number={} value={}", pin.number, pin.value);
                    if stream.publish(pin).await.is_err() {
                        info!("Pin event stream closed, watch loop stopping");
                        return;
                    }
                }
                Err(e) => warn!("Skipping pin update: {}", e),
            }
        }
    }

    info!("Filesystem watcher channel closed, watch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::error::SetupStep;
    use crate::gpio::stream::event_stream;
    use crate::gpio::types::Pin;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fake_sysfs(pins: &[PinNumber]) -> (TempDir, Sysfs) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export"), "").unwrap();
        for pin in pins {
            let pin_dir = dir.path().join(format!("gpio{}", pin));
            fs::create_dir(&pin_dir).unwrap();
            for attr in ["direction", "edge", "active_low"] {
                fs::write(pin_dir.join(attr), "").unwrap();
            }
            fs::write(pin_dir.join("value"), "0").unwrap();
        }
        let sysfs = Sysfs::new(dir.path());
        (dir, sysfs)
    }

    /// Overwrite the value in place with a single write, like the kernel does
    fn write_level(sysfs: &Sysfs, pin: PinNumber, level: &[u8]) {
        let mut file = OpenOptions::new()
            .write(true)
            .open(sysfs.value_path(pin))
            .unwrap();
        file.write_all(level).unwrap();
    }

    #[tokio::test]
    async fn test_value_write_publishes_one_pin() {
        let (_dir, sysfs) = fake_sysfs(&[4]);
        let (tx, mut rx) = event_stream();
        let pins: PinWatchSet = [4].into_iter().collect();

        let handle = PinWatcher::new(sysfs.clone()).start_watch(&pins, tx).unwrap();
        assert_eq!(handle.pins().len(), 1);

        write_level(&sysfs, 4, b"1");

        let pin = tokio::time::timeout(Duration::from_secs(5), rx.next())
            .await
            .expect("no pin event observed")
            .unwrap();
        assert_eq!(pin, Pin::new(4, 1));

        let extra = tokio::time::timeout(Duration::from_millis(300), rx.next()).await;
        assert!(extra.is_err(), "a single write must yield a single event");

        handle.stop();
    }

    #[tokio::test]
    async fn test_relative_root_publishes_pins() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let relative = dir.path().strip_prefix(".").unwrap().to_path_buf();
        assert!(relative.is_relative());

        fs::write(relative.join("export"), "").unwrap();
        let pin_dir = relative.join("gpio4");
        fs::create_dir(&pin_dir).unwrap();
        for attr in ["direction", "edge", "active_low"] {
            fs::write(pin_dir.join(attr), "").unwrap();
        }
        fs::write(pin_dir.join("value"), "0").unwrap();

        let sysfs = Sysfs::new(&relative);
        let (tx, mut rx) = event_stream();
        let pins: PinWatchSet = [4].into_iter().collect();
        let handle = PinWatcher::new(sysfs.clone()).start_watch(&pins, tx).unwrap();

        write_level(&sysfs, 4, b"1");

        let pin = tokio::time::timeout(Duration::from_secs(5), rx.next())
            .await
            .expect("value write under a relative root was not published")
            .unwrap();
        assert_eq!(pin, Pin::new(4, 1));

        handle.stop();
    }

    #[tokio::test]
    async fn test_unparseable_value_is_skipped() {
        let (_dir, sysfs) = fake_sysfs(&[4]);
        let (tx, mut rx) = event_stream();
        let pins: PinWatchSet = [4].into_iter().collect();

        let handle = PinWatcher::new(sysfs.clone()).start_watch(&pins, tx).unwrap();

        write_level(&sysfs, 4, b"x");
        let skipped = tokio::time::timeout(Duration::from_millis(300), rx.next()).await;
        assert!(skipped.is_err());
        assert!(!handle.is_finished());

        write_level(&sysfs, 4, b"0");
        let pin = tokio::time::timeout(Duration::from_secs(5), rx.next())
            .await
            .expect("loop should survive a bad read")
            .unwrap();
        assert_eq!(pin, Pin::new(4, 0));

        handle.stop();
    }

    #[tokio::test]
    async fn test_setup_is_all_or_nothing() {
        let (dir, sysfs) = fake_sysfs(&[4]);
        let (tx, _rx) = event_stream();
        let pins: PinWatchSet = [4, 9].into_iter().collect();

        let err = match PinWatcher::new(sysfs).start_watch(&pins, tx) {
            Ok(_) => panic!("pin 9 has no sysfs directory"),
            Err(e) => e,
        };
        assert_eq!(err.pin(), Some(9));
        assert_eq!(err.step(), Some(SetupStep::Direction));
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "9");
    }
}
