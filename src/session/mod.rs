//! Session Management Module
//!
//! Live listener sessions and fan-out:
//! - Monotonic session ids, one per upgraded WebSocket
//! - Fixed ten minute expiry with cancellable timers
//! - Broadcast under the registry lock with per-session failure isolation
//! - Ordered termination on shutdown

pub mod connection;
pub mod registry;
pub mod state;

pub use connection::{Connection, DeliveryError, LifecycleError, WsConnection};
pub use registry::{BroadcastReport, SessionRegistry, SESSION_TTL};
pub use state::{Session, SessionId, SessionInfo, SessionStatus};
