// ezbox - GPIO pin watcher and live WebSocket broadcaster

pub mod broadcaster;
pub mod cli;
pub mod config;
pub mod gpio;
pub mod media;
pub mod messaging;
pub mod session;
pub mod shutdown;
pub mod web_server;

use anyhow::Context;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use broadcaster::Broadcaster;
use cli::Cli;
use config::Config;
use gpio::{event_stream, PinSender, PinSimulator, PinWatcher, Sysfs, WatchHandle};
use media::{MediaCollection, MediaPlayer};
use session::SessionRegistry;
use shutdown::ShutdownCoordinator;
use web_server::AppState;

/// How often the live session count is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Active pin source
enum PinSource {
    Simulated(Arc<PinSimulator>),
    Hardware(WatchHandle),
}

/// Start the selected pin source. Hardware setup failures are fatal.
fn start_pin_source(config: &Config, stream: PinSender) -> anyhow::Result<PinSource> {
    if config.simulated_gpio_enabled {
        info!("Simulated GPIO enabled");
        return Ok(PinSource::Simulated(Arc::new(PinSimulator::new(stream))));
    }

    let watcher = PinWatcher::new(Sysfs::new(&config.gpio_root));
    let handle = watcher
        .start_watch(&config.watch_set(), stream)
        .context("unable to set up GPIO pins")?;
    info!("Watching {} pins", handle.pins().len());
    Ok(PinSource::Hardware(handle))
}

fn init_player(config: &Config) -> Option<Arc<MediaPlayer>> {
    match MediaPlayer::locate(config.player_path.as_deref()) {
        Ok(binary) => Some(Arc::new(MediaPlayer::new(binary))),
        Err(e) => {
            warn!("Media player unavailable: {}", e);
            None
        }
    }
}

/// Run the server until SIGINT or SIGTERM
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let mut config = Config::read(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;

    let player = init_player(&config);
    let collection = MediaCollection::index(&config.media_directories);
    collection.log_contents();

    let registry = Arc::new(SessionRegistry::new());
    let (pin_tx, pin_rx) = event_stream();
    let source = start_pin_source(&config, pin_tx)?;

    let mut broadcaster = Broadcaster::new(registry.clone(), pin_rx);
    if let Some(player) = &player {
        broadcaster = broadcaster.with_player_events(player.subscribe());
    }
    broadcaster.spawn();

    let mut coordinator = ShutdownCoordinator::new(registry.clone());
    if let Some(player) = &player {
        coordinator = coordinator.with_player(player.clone());
    }
    coordinator.track_timer(registry.spawn_status_ticker(STATUS_INTERVAL));

    let mut state = AppState::new(registry);
    if let PinSource::Simulated(simulator) = &source {
        state = state.with_simulator(simulator.clone());
    }
    let app = web_server::router(state, &config.frontend_root, &config.bootstrap_page());

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("unable to bind port {}", config.port))?;

    tokio::select! {
        res = web_server::serve(listener, app) => {
            if let Err(e) = &res {
                error!("HTTP server stopped: {}", e);
            }
            res.context("HTTP server failed")?;
        }
        signal = ShutdownCoordinator::wait_for_signal() => {
            let signal = signal.context("unable to listen for shutdown signals")?;
            info!("Caught {} signal, shutting down gracefully", signal);
        }
    }

    coordinator.shutdown().await;
    if let PinSource::Hardware(handle) = source {
        handle.stop();
    }
    Ok(())
}
