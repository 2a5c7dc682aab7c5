//! Wire Messages
//!
//! Every message is one JSON object whose `type` field names the variant,
//! e.g. `{"type":"PinUpdated","pin":{"number":4,"value":1}}`.

use serde::{Deserialize, Serialize};

use crate::gpio::Pin;
use crate::media::PlayerEvent;

/// Messages pushed to every live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainMessage {
    /// A watched line changed level
    PinUpdated { pin: Pin },

    /// The selected channel changed
    ChannelChanged {
        channel: String,
        title: String,
        audio_title: String,
    },

    /// The media player started a new program
    ProgramUpdated { program: String },

    /// The media player was paused or resumed
    ProgramPaused { pause: bool },
}

impl DomainMessage {
    pub fn pin_updated(pin: Pin) -> Self {
        Self::PinUpdated { pin }
    }

    pub fn channel_changed(
        channel: impl Into<String>,
        title: impl Into<String>,
        audio_title: impl Into<String>,
    ) -> Self {
        Self::ChannelChanged {
            channel: channel.into(),
            title: title.into(),
            audio_title: audio_title.into(),
        }
    }

    pub fn program_updated(program: impl Into<String>) -> Self {
        Self::ProgramUpdated {
            program: program.into(),
        }
    }

    pub fn program_paused(pause: bool) -> Self {
        Self::ProgramPaused { pause }
    }

    /// Variant name, as written to the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PinUpdated { .. } => "PinUpdated",
            Self::ChannelChanged { .. } => "ChannelChanged",
            Self::ProgramUpdated { .. } => "ProgramUpdated",
            Self::ProgramPaused { .. } => "ProgramPaused",
        }
    }

    /// Encode as a single JSON text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<PlayerEvent> for DomainMessage {
    fn from(event: PlayerEvent) -> Self {
        match event {
            PlayerEvent::ProgramUpdated(program) => Self::ProgramUpdated { program },
            PlayerEvent::ProgramPaused(pause) => Self::ProgramPaused { pause },
        }
    }
}

/// Messages accepted from clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Set a simulated pin level (simulated GPIO mode only)
    SimulatePin { pin: Pin },
}

impl InboundMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
