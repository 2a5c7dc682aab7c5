//! Broadcaster
//!
//! Drains the pin event stream and fans every event out to the live
//! sessions. Player status changes are forwarded the same way.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::gpio::{Pin, PinReceiver};
use crate::media::PlayerEvent;
use crate::messaging::DomainMessage;
use crate::session::SessionRegistry;

/// Single consumer of the pin event stream
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    pins: PinReceiver,
    player_events: Option<broadcast::Receiver<PlayerEvent>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>, pins: PinReceiver) -> Self {
        Self {
            registry,
            pins,
            player_events: None,
        }
    }

    /// Also forward media player status changes
    pub fn with_player_events(mut self, events: broadcast::Receiver<PlayerEvent>) -> Self {
        self.player_events = Some(events);
        self
    }

    /// Run the broadcast loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events in arrival order until the pin source goes away
    pub async fn run(self) {
        let Self {
            registry,
            mut pins,
            mut player_events,
        } = self;
        info!("Broadcaster started");

        loop {
            let Some(events) = player_events.as_mut() else {
                match pins.next().await {
                    Some(pin) => publish_pin(&registry, pin),
                    None => break,
                }
                continue;
            };

            let mut player_gone = false;
            tokio::select! {
                pin = pins.next() => match pin {
                    Some(pin) => publish_pin(&registry, pin),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        registry.broadcast(&DomainMessage::from(event));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Broadcaster lagged behind player, skipped={}", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Player event channel closed");
                        player_gone = true;
                    }
                },
            }
            if player_gone {
                player_events = None;
            }
        }

        info!("Pin event stream closed, broadcaster stopped");
    }
}

fn publish_pin(registry: &SessionRegistry, pin: Pin) {
    info!("pin update, number={} value={}", pin.number, pin.value);
    registry.broadcast(&DomainMessage::pin_updated(pin));
}
