//! Observable events (§4.1) and the two-phase dispatch rule.
//!
//! A subscriber's own handler always runs *before* the session mutates itself in response to the
//! same event: [`SessionObserver`] is invoked first, and only afterwards does the `Session` run
//! its internal finalizer (retire a roster entry, transition to `Closed`, ...) — see
//! `Session::fail_inbound`, `Session::fail_outbound`, `Session::complete_outbound` and
//! `Session::close` in `session.rs`.

use crate::error::SyncErrorKind;

/// Observer interface for a `Session`'s four public events (§4.1).
///
/// All methods default to doing nothing, so an observer only needs to override what it cares
/// about.
pub trait SessionObserver<C>: Send + Sync {
    /// The session has closed. No further events will be emitted.
    fn on_close(&self) {}

    /// Progress toward completing a synchronization with `peer`, monotonically non-decreasing
    /// and bounded to `[0, 1]` (§8, invariant 5).
    fn on_synchronization_progress(&self, _peer: &C, _fraction: f64) {}

    /// A synchronization with `peer` completed successfully.
    fn on_synchronization_complete(&self, _peer: &C) {}

    /// A synchronization with `peer` failed for the given reason.
    fn on_synchronization_failed(&self, _peer: &C, _error: &SyncErrorKind) {}
}

/// An observer that discards every event; the default when a caller does not need to watch
/// session activity.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl<C> SessionObserver<C> for NullObserver {}
