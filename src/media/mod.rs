//! Media Module
//!
//! Collaborators around the core:
//! - omxplayer process wrapper emitting program status events
//! - Recursive media collection index

pub mod collection;
pub mod player;

pub use collection::MediaCollection;
pub use player::{MediaPlayer, PlayerError, PlayerEvent};
