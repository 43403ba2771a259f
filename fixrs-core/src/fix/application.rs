//! The hook an embedding application implements to be consulted on session lifecycle events.
//!
//! An acceptor can't always take every logon at face value -- a counterparty might be using
//! stale credentials, or the application might be in a state where it isn't ready to trade.
//! [`Application::on_logon`] lets the caller say so with a typed [`LogonRejected`] instead of
//! the engine either always accepting or requiring the caller to tear down the TCP connection
//! out of band.

use std::sync::Arc;

/// Identifies the FIX session (not the TCP connection) a lifecycle hook is being called about.
#[derive(Debug, Clone)]
pub struct SessionId {
    pub begin_string: Arc<String>,
    pub sender_comp_id: String,
    pub target_comp_id: String,
}

/// Returned from [`Application::on_logon`] to reject an incoming logon with a reason that is
/// sent back to the peer in the `Logout<5>` text.
#[derive(Debug, Clone)]
pub struct LogonRejected {
    pub reason: String,
}

impl LogonRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        LogonRejected {
            reason: reason.into(),
        }
    }
}

/// Hooks invoked by the session engine at points where the embedding application may want a
/// say: whether to accept a logon, and notification that a session has logged out.
///
/// Both methods have a default that accepts everything and does nothing, so implementors only
/// need to override what they care about.
pub trait Application: Send + Sync {
    /// Called when a `Logon<A>` is received, before the engine replies. Returning `Err` causes
    /// the engine to send a `Logout<5>` carrying the rejection reason and close the session
    /// instead of completing the handshake.
    fn on_logon(&self, _session: &SessionId) -> Result<(), LogonRejected> {
        Ok(())
    }

    /// Called once a session has logged out, whether initiated locally or by the peer.
    fn on_logout(&self, _session: &SessionId) {}
}

/// The default [`Application`]: accepts every logon, ignores logout.
pub struct NullApplication;

impl Application for NullApplication {}
