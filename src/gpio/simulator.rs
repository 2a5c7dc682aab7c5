//! Simulated Pin Source
//!
//! Stands in for the hardware watcher during development. Pins are injected
//! (from WebSocket `SimulatePin` messages or tests) and follow the same path
//! to the broadcaster as hardware transitions.

use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::error::StreamClosed;
use super::stream::PinSender;
use super::types::{Pin, PinNumber};

struct SimulatedGpio {
    pins: HashMap<PinNumber, Pin>,
    stream: PinSender,
}

/// In-memory pin source
pub struct PinSimulator {
    state: Mutex<SimulatedGpio>,
}

impl PinSimulator {
    /// Create a simulator publishing into `stream`
    pub fn new(stream: PinSender) -> Self {
        Self {
            state: Mutex::new(SimulatedGpio {
                pins: HashMap::new(),
                stream,
            }),
        }
    }

    /// Record a pin level and publish it.
    ///
    /// The lock is held across the publish, so concurrent injections reach
    /// the stream in the order they were recorded.
    pub async fn inject(&self, pin: Pin) -> Result<(), StreamClosed> {
        let mut state = self.state.lock().await;
        state.pins.insert(pin.number, pin);
        debug!("Simulated pin update, number={} value={}", pin.number, pin.value);
        state.stream.publish(pin).await
    }

    /// Last injected level of a pin
    pub async fn get(&self, number: PinNumber) -> Option<Pin> {
        self.state.lock().await.pins.get(&number).copied()
    }

    /// All recorded pins, ordered by number
    pub async fn snapshot(&self) -> Vec<Pin> {
        let state = self.state.lock().await;
        let mut pins: Vec<Pin> = state.pins.values().copied().collect();
        pins.sort_by_key(|p| p.number);
        pins
    }
}
