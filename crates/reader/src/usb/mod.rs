//! USB subsystem
//!
//! Owns the connection to a single device for the duration of one exchange:
//! - Transport capability traits and the `rusb` backend
//! - Session setup (enumerate, open, detach, claim) with unwind on failure
//! - Control and interrupt transfers
//! - Teardown (release, reattach, close) on every exit path

pub mod session;
pub mod transport;

pub use session::{
    DEFAULT_TIMEOUT, DetachPolicy, DeviceSession, INTERFACES, SessionOptions, SessionState,
    with_session,
};
pub use transport::{RusbTransport, Transport, TransportContext, TransportHandle};
