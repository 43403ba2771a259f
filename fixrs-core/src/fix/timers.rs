//! Timer bookkeeping for the session loop's single `tokio::select!` suspension point.
//!
//! Every timer the session cares about -- the heartbeat cadence, the test-request grace
//! period, the dead-peer cutoff once a test request has gone unanswered, the grace period for
//! an expected logon, and the wait for a peer's logout acknowledgement -- is represented as one
//! [`TimerKind`] so the spin loop only ever awaits a single `Event::TimerFired(TimerKind)`,
//! rather than a family of differently-named events.

use crate::fix::session::Event;
use tokio::time::{sleep_until, Duration, Instant, Sleep};

/// Identifies which timer expired, carried on [`Event::TimerFired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TimerKind {
    /// No `Logon` received within the configured grace period after connecting.
    Logon,
    /// Time to send our own `Heartbeat`, since nothing else has gone out recently.
    Heartbeat,
    /// No traffic from the peer recently enough; send a `TestRequest`.
    TestRequest,
    /// A `TestRequest` went unanswered for too long; the peer is presumed dead.
    DeadPeer,
    /// We sent a `Logout` and the peer hasn't reciprocated in time.
    Logout,
    /// Orderly shutdown grace period has elapsed.
    Shutdown,
}

struct Timeout {
    next_instant: Instant,
    duration: Duration,
    kind: TimerKind,
}

impl Timeout {
    fn new(instant: Instant, duration: Duration, kind: TimerKind) -> Timeout {
        Timeout {
            next_instant: instant,
            duration,
            kind,
        }
    }

    fn reset(&mut self) {
        self.next_instant = Instant::now() + self.duration;
    }

    fn set_duration(&mut self, dur: Duration) {
        self.duration = dur;
        self.reset();
    }
}

/// Tracks every timer a session can be waiting on and picks the next one to fire.
///
/// Exactly one of [`Heartbeat`](TimerKind::Heartbeat)/[`TestRequest`](TimerKind::TestRequest)/
/// [`DeadPeer`](TimerKind::DeadPeer) is "live" at a time, selected by which phase of the
/// heartbeat cycle the session is in; [`Logon`](TimerKind::Logon) and
/// [`Logout`](TimerKind::Logout) are opt-in via [`start_logon_timeout`](Self::start_logon_timeout)
/// / [`start_logout_timeout`](Self::start_logout_timeout) and, once started, take priority.
pub(super) struct SessionTimers {
    logon_timeout: Timeout,
    heartbeat_timeout: Timeout,
    test_request_timeout: Timeout,
    dead_peer_timeout: Timeout,
    logout_timeout: Timeout,
    shutdown_timeout: Timeout,
    awaiting_logon: bool,
    awaiting_logout: bool,
    awaiting_shutdown: bool,
    test_request_outstanding: bool,
}

impl SessionTimers {
    pub(super) fn new(
        heartbeat_dur: Duration,
        logon_grace: Duration,
        shutdown_grace: Duration,
    ) -> SessionTimers {
        let now = Instant::now();
        let test_request_dur = (heartbeat_dur * 6) / 5;
        let dead_peer_dur = heartbeat_dur / 2;
        let logout_dur = heartbeat_dur * 2;

        SessionTimers {
            logon_timeout: Timeout::new(now + logon_grace, logon_grace, TimerKind::Logon),
            heartbeat_timeout: Timeout::new(now + heartbeat_dur, heartbeat_dur, TimerKind::Heartbeat),
            test_request_timeout: Timeout::new(
                now + test_request_dur,
                test_request_dur,
                TimerKind::TestRequest,
            ),
            dead_peer_timeout: Timeout::new(now + dead_peer_dur, dead_peer_dur, TimerKind::DeadPeer),
            logout_timeout: Timeout::new(now + logout_dur, logout_dur, TimerKind::Logout),
            shutdown_timeout: Timeout::new(
                now + shutdown_grace,
                shutdown_grace,
                TimerKind::Shutdown,
            ),
            awaiting_logon: false,
            awaiting_logout: false,
            awaiting_shutdown: false,
            test_request_outstanding: false,
        }
    }

    fn active(&mut self) -> &mut Timeout {
        if self.awaiting_shutdown {
            &mut self.shutdown_timeout
        } else if self.awaiting_logon {
            &mut self.logon_timeout
        } else if self.awaiting_logout {
            &mut self.logout_timeout
        } else if self.test_request_outstanding {
            &mut self.dead_peer_timeout
        } else if self.heartbeat_timeout.next_instant < self.test_request_timeout.next_instant {
            &mut self.heartbeat_timeout
        } else {
            &mut self.test_request_timeout
        }
    }

    /// Returns a future that resolves when the currently-active timer expires, along with
    /// which [`Event`] to hand the state machine at that point. Call [`reset_active`] after the
    /// `select!` branch fires so the next call picks the right timer again.
    pub(super) fn next(&mut self) -> (Sleep, Event) {
        let timeout = self.active();
        (sleep_until(timeout.next_instant), Event::TimerFired(timeout.kind))
    }

    /// Re-arms whichever timer was last returned from [`next`](Self::next).
    pub(super) fn reset_active(&mut self) {
        self.active().reset();
    }

    pub(super) fn start_logon_timeout(&mut self) {
        self.awaiting_logon = true;
        self.logon_timeout.reset();
    }

    pub(super) fn cancel_logon_timeout(&mut self) {
        self.awaiting_logon = false;
    }

    pub(super) fn reset_heartbeat(&mut self) {
        self.heartbeat_timeout.reset();
    }

    /// Called whenever any message is received from the peer: defers the test-request timer,
    /// and if a test request was outstanding, clears it since the peer has proven it's alive.
    pub(super) fn reset_test_request(&mut self) {
        self.test_request_timeout.reset();
        self.test_request_outstanding = false;
    }

    pub(super) fn mark_test_request_sent(&mut self) {
        self.test_request_outstanding = true;
        self.dead_peer_timeout.reset();
    }

    pub(super) fn test_request_outstanding(&self) -> bool {
        self.test_request_outstanding
    }

    pub(super) fn start_logout_timeout(&mut self) {
        self.awaiting_logout = true;
        self.logout_timeout.reset();
    }

    /// Called when the application requests a local shutdown: bounds the graceful `Logout`
    /// round trip and any in-flight callback awaiting, per the configured `shutdown_timeout`.
    pub(super) fn start_shutdown_timeout(&mut self) {
        self.awaiting_shutdown = true;
        self.shutdown_timeout.reset();
    }

    pub(super) fn set_heartbeat_duration(&mut self, heartbeat_dur: Duration) {
        let test_request_dur = (heartbeat_dur * 6) / 5;
        let dead_peer_dur = heartbeat_dur / 2;
        let logout_dur = heartbeat_dur * 2;
        self.heartbeat_timeout.set_duration(heartbeat_dur);
        self.test_request_timeout.set_duration(test_request_dur);
        self.dead_peer_timeout.set_duration(dead_peer_dur);
        self.logout_timeout.set_duration(logout_dur);
    }
}
