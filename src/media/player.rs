//! Media Player
//!
//! Drives an external `omxplayer` process through its stdin key bindings
//! and reports program changes as events for the broadcaster.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, Mutex};

/// Player executable looked up in `$PATH`
pub const PLAYER_WRAPPER: &str = "omxplayer";

/// Arguments passed before the file name
pub const PLAYER_ARGS: &[&str] = &["-o", "alsa", "--aspect-mode", "fill", "-b", "-w"];

/// How long a quit request may take before the process is killed
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Program status changes reported by the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    ProgramUpdated(String),
    ProgramPaused(bool),
}

/// Media player errors
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player not found at configured location: {0}")]
    NotFound(PathBuf),

    #[error("omxplayer not found in $PATH: {0}")]
    NotInPath(#[from] which::Error),

    #[error("unable to start player: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("nothing is playing")]
    NotPlaying,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Running player process
struct Program {
    file: PathBuf,
    child: Child,
    stdin: ChildStdin,
    paused: bool,
}

impl Program {
    async fn send_key(&mut self, key: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(key).await?;
        self.stdin.flush().await
    }

    /// Ask the player to quit, then force kill if it does not exit in time
    async fn shutdown(mut self, timeout: Duration) -> std::io::Result<()> {
        let pid = self.child.id().unwrap_or(0);

        if self.send_key(b"q").await.is_ok() {
            drop(self.stdin);
            match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(Ok(_)) => {
                    debug!("Player {} exited gracefully", pid);
                    return Ok(());
                }
                Ok(Err(e)) => warn!("Error waiting for player {}: {}", pid, e),
                Err(_) => warn!("Player {} ignored quit request", pid),
            }
        }

        warn!("Force killing player {}", pid);
        self.child.kill().await
    }
}

/// External media player wrapper. At most one program plays at a time.
///
/// The server only stops it on shutdown; `play` and `toggle_pause` are driven
/// by an external controller holding the same `Arc`.
pub struct MediaPlayer {
    binary: PathBuf,
    args: Vec<String>,
    current: Mutex<Option<Program>>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl MediaPlayer {
    /// Create a player around `binary` with the standard omxplayer arguments
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self::with_args(binary, PLAYER_ARGS.iter().map(|a| a.to_string()).collect())
    }

    /// Create with custom arguments placed before the file name
    pub fn with_args(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            binary: binary.into(),
            args,
            current: Mutex::new(None),
            event_tx,
        }
    }

    /// Resolve the player binary from config, falling back to `$PATH`
    pub fn locate(configured: Option<&Path>) -> Result<PathBuf, PlayerError> {
        if let Some(path) = configured {
            if path.exists() {
                info!("Using omxplayer located at: {}", path.display());
                return Ok(path.to_path_buf());
            }
            return Err(PlayerError::NotFound(path.to_path_buf()));
        }

        debug!("Looking up {} in $PATH", PLAYER_WRAPPER);
        let path = which::which(PLAYER_WRAPPER)?;
        info!("Found omxplayer at: {}", path.display());
        Ok(path)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Subscribe to program status events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Start playing a file, stopping whatever was playing before
    pub async fn play(&self, file: impl Into<PathBuf>) -> Result<(), PlayerError> {
        let file = file.into();
        let mut current = self.current.lock().await;

        if let Some(previous) = current.take() {
            debug!("Stopping {} before switching program", previous.file.display());
            previous.shutdown(STOP_TIMEOUT).await?;
        }

        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .arg(&file)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(PlayerError::Spawn)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            PlayerError::Spawn(std::io::Error::other("player stdin not captured"))
        })?;

        info!("Playing {} (pid {})", file.display(), child.id().unwrap_or(0));
        let program = file.display().to_string();
        *current = Some(Program {
            file,
            child,
            stdin,
            paused: false,
        });

        let _ = self.event_tx.send(PlayerEvent::ProgramUpdated(program));
        Ok(())
    }

    /// Toggle pause, returns the new paused state
    pub async fn toggle_pause(&self) -> Result<bool, PlayerError> {
        let mut current = self.current.lock().await;
        let program = current.as_mut().ok_or(PlayerError::NotPlaying)?;

        program.send_key(b"p").await?;
        program.paused = !program.paused;

        let paused = program.paused;
        let _ = self.event_tx.send(PlayerEvent::ProgramPaused(paused));
        Ok(paused)
    }

    /// Stop the running program, returns false if nothing was playing
    pub async fn stop(&self) -> Result<bool, PlayerError> {
        let Some(program) = self.current.lock().await.take() else {
            return Ok(false);
        };

        info!("Stopping {}", program.file.display());
        program.shutdown(STOP_TIMEOUT).await?;
        Ok(true)
    }

    pub async fn is_playing(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stand-in player that swallows key presses until stdin closes
    fn fake_player() -> MediaPlayer {
        MediaPlayer::with_args(
            "/bin/sh",
            vec!["-c".to_string(), "cat > /dev/null".to_string(), "player".to_string()],
        )
    }

    #[test]
    fn test_locate_missing_configured_path() {
        let err = MediaPlayer::locate(Some(Path::new("/nonexistent/omxplayer"))).unwrap_err();
        assert!(matches!(err, PlayerError::NotFound(_)));
    }

    #[test]
    fn test_default_args() {
        let player = MediaPlayer::new("/usr/bin/omxplayer");
        assert_eq!(player.args, vec!["-o", "alsa", "--aspect-mode", "fill", "-b", "-w"]);
        assert_eq!(player.binary(), Path::new("/usr/bin/omxplayer"));
    }

    #[tokio::test]
    async fn test_play_pause_stop() {
        let player = fake_player();
        let mut events = player.subscribe();

        player.play("movie.mp4").await.unwrap();
        assert!(player.is_playing().await);
        assert_eq!(
            events.recv().await.unwrap(),
            PlayerEvent::ProgramUpdated("movie.mp4".to_string())
        );

        assert!(player.toggle_pause().await.unwrap());
        assert_eq!(events.recv().await.unwrap(), PlayerEvent::ProgramPaused(true));
        assert!(!player.toggle_pause().await.unwrap());
        assert_eq!(events.recv().await.unwrap(), PlayerEvent::ProgramPaused(false));

        assert!(player.stop().await.unwrap());
        assert!(!player.is_playing().await);
        assert!(!player.stop().await.unwrap());
    }

    #[tokio::test]
    async fn test_pause_without_program() {
        let player = fake_player();
        assert!(matches!(player.toggle_pause().await, Err(PlayerError::NotPlaying)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let player = MediaPlayer::new("/nonexistent/omxplayer");
        assert!(matches!(player.play("movie.mp4").await, Err(PlayerError::Spawn(_))));
        assert!(!player.is_playing().await);
    }
}
