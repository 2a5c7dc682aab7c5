//! Shutdown Coordinator
//!
//! On SIGINT or SIGTERM: stop periodic timers, terminate every session,
//! stop the media player, then let `run` return so the process exits 0.

use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::media::MediaPlayer;
use crate::session::SessionRegistry;

/// Termination signals the coordinator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Tears down process-wide resources exactly once
pub struct ShutdownCoordinator {
    registry: Arc<SessionRegistry>,
    player: Option<Arc<MediaPlayer>>,
    /// Periodic tasks aborted before sessions are terminated
    timers: Mutex<Vec<JoinHandle<()>>>,
    initiated: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            player: None,
            timers: Mutex::new(Vec::new()),
            initiated: AtomicBool::new(false),
        }
    }

    /// Stop this player during shutdown
    pub fn with_player(mut self, player: Arc<MediaPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    /// Abort a periodic task during shutdown
    pub fn track_timer(&self, timer: JoinHandle<()>) {
        self.timers.lock().push(timer);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Wait for SIGINT or SIGTERM
    pub async fn wait_for_signal() -> std::io::Result<ShutdownSignal> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate = signal(SignalKind::terminate())?;
            tokio::select! {
                res = tokio::signal::ctrl_c() => res.map(|_| ShutdownSignal::Interrupt),
                _ = terminate.recv() => Ok(ShutdownSignal::Terminate),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.map(|_| ShutdownSignal::Interrupt)
        }
    }

    /// Release everything. Returns the number of sessions terminated;
    /// calls after the first do nothing and return 0.
    pub async fn shutdown(&self) -> usize {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Shutdown already in progress");
            return 0;
        }

        info!("Shutting down...");

        let timers = std::mem::take(&mut *self.timers.lock());
        for timer in timers {
            timer.abort();
        }

        let terminated = self.registry.terminate_all();

        if let Some(player) = &self.player {
            match player.stop().await {
                Ok(true) => info!("Media player stopped"),
                Ok(false) => {}
                Err(e) => error!("Error stopping media player: {}", e),
            }
        }

        info!("Shutdown complete, sessions={}", terminated);
        terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Connection, DeliveryError, LifecycleError};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingConnection {
        closes: AtomicUsize,
    }

    impl Connection for CountingConnection {
        fn send(&self, _payload: Arc<str>) -> Result<(), DeliveryError> {
            Ok(())
        }

        fn close(&self) -> Result<(), LifecycleError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_terminates_sessions_and_timers() {
        let registry = Arc::new(SessionRegistry::new());
        let connections: Vec<_> = (0..3).map(|_| Arc::new(CountingConnection::default())).collect();
        for (i, c) in connections.iter().enumerate() {
            registry.create(format!("key-{}", i), c.clone());
        }

        let coordinator = ShutdownCoordinator::new(registry.clone());
        let ticker = registry.spawn_status_ticker(Duration::from_secs(60));
        let abort = ticker.abort_handle();
        coordinator.track_timer(ticker);

        assert_eq!(coordinator.shutdown().await, 3);
        assert!(coordinator.is_shutting_down());
        assert!(registry.is_empty());
        for c in &connections {
            assert_eq!(c.closes.load(Ordering::SeqCst), 1);
        }

        for _ in 0..100 {
            if abort.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_shutdown_runs_once() {
        let registry = Arc::new(SessionRegistry::new());
        let connection = Arc::new(CountingConnection::default());
        registry.create("key", connection.clone());

        let coordinator = ShutdownCoordinator::new(registry);
        assert_eq!(coordinator.shutdown().await, 1);
        assert_eq!(coordinator.shutdown().await, 0);
        assert_eq!(connection.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_player() {
        let player = Arc::new(MediaPlayer::with_args(
            "/bin/sh",
            vec!["-c".to_string(), "cat > /dev/null".to_string(), "player".to_string()],
        ));
        player.play("movie.mp4").await.unwrap();

        let coordinator =
            ShutdownCoordinator::new(Arc::new(SessionRegistry::new())).with_player(player.clone());
        assert_eq!(coordinator.shutdown().await, 0);
        assert!(!player.is_playing().await);
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
    }
}
