//! The synchronization error taxonomy (wire `(domain, code)` pairs).

use thiserror::Error;

/// The fixed `domain` string every [`SyncErrorKind`] is sent under on the wire.
pub const SYNC_ERROR_DOMAIN: &str = "INF_SESSION_SYNC_ERROR";

/// All reasons a synchronization can fail, carried on the wire as `(domain, code)` and
/// surfaced locally through [`crate::events::SessionEvent::SynchronizationFailed`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyncErrorKind {
    /// A content frame arrived that the receiver does not recognise.
    #[error("received node not part of the synchronization process")]
    UnexpectedNode,

    /// A second `sync-begin` arrived after one was already accepted.
    #[error("received unexpected begin-of-sync message")]
    UnexpectedBeginOfSync,

    /// `sync-end` arrived before all announced content items were received.
    #[error("received unexpected end-of-sync message")]
    UnexpectedEndOfSync,

    /// A content frame arrived before `sync-begin`.
    #[error("expected begin-of-sync message")]
    ExpectedBeginOfSync,

    /// A content frame arrived after the last expected item; only `sync-end` is valid now.
    #[error("expected end-of-sync message")]
    ExpectedEndOfSync,

    /// `sync-begin` carried no `num-messages` attribute.
    #[error("num-messages attribute missing in begin-of-sync message")]
    NumMessagesMissing,

    /// A `sync-user` item had no `id` attribute.
    #[error("id attribute missing in user message")]
    IdNotPresent,

    /// A `sync-user` item's `id` collides with an existing user.
    #[error("id already in use")]
    IdInUse,

    /// A `sync-user` item had no `name` attribute.
    #[error("name attribute missing in user message")]
    NameNotPresent,

    /// A `sync-user` item's `name` collides with an existing user.
    #[error("name already in use")]
    NameInUse,

    /// The synchronizer (sender) sent `sync-cancel`.
    #[error("synchronization was cancelled by the sender")]
    SenderCancelled,

    /// The local session abandoned this synchronization itself, whichever role it was playing
    /// in it: closing an in-progress inbound sync, or cancelling an `InProgress` outbound one.
    #[error("synchronization was cancelled by the receiver")]
    ReceiverCancelled,

    /// The watched connection reported `closed` or `closing` mid-synchronization.
    #[error("connection was closed during synchronization")]
    ConnectionClosed,

    /// A remote `sync-error` carried a `(domain, code)` pair we don't recognise.
    #[error("synchronization failed")]
    Failed,
}

impl SyncErrorKind {
    /// The numeric wire code for this error kind.
    ///
    /// Stable across releases: peers decode remote errors purely from this number (plus the
    /// fixed [`SYNC_ERROR_DOMAIN`]), never from the `Display` text.
    pub fn code(&self) -> u32 {
        match self {
            SyncErrorKind::UnexpectedNode => 0,
            SyncErrorKind::IdNotPresent => 1,
            SyncErrorKind::IdInUse => 2,
            SyncErrorKind::NameNotPresent => 3,
            SyncErrorKind::NameInUse => 4,
            SyncErrorKind::ConnectionClosed => 5,
            SyncErrorKind::SenderCancelled => 6,
            SyncErrorKind::ReceiverCancelled => 7,
            SyncErrorKind::UnexpectedBeginOfSync => 8,
            SyncErrorKind::NumMessagesMissing => 9,
            SyncErrorKind::UnexpectedEndOfSync => 10,
            SyncErrorKind::ExpectedBeginOfSync => 11,
            SyncErrorKind::ExpectedEndOfSync => 12,
            SyncErrorKind::Failed => 13,
        }
    }

    /// Decode a remote `(domain, code)` pair as received in a `sync-error` frame.
    ///
    /// Unknown domains or codes decode to [`SyncErrorKind::Failed`] rather than failing outright
    /// — a misbehaving or newer peer should not stop us from surfacing *some* failure event.
    pub fn from_wire(domain: &str, code: u32) -> SyncErrorKind {
        if domain != SYNC_ERROR_DOMAIN {
            return SyncErrorKind::Failed;
        }
        match code {
            0 => SyncErrorKind::UnexpectedNode,
            1 => SyncErrorKind::IdNotPresent,
            2 => SyncErrorKind::IdInUse,
            3 => SyncErrorKind::NameNotPresent,
            4 => SyncErrorKind::NameInUse,
            5 => SyncErrorKind::ConnectionClosed,
            6 => SyncErrorKind::SenderCancelled,
            7 => SyncErrorKind::ReceiverCancelled,
            8 => SyncErrorKind::UnexpectedBeginOfSync,
            9 => SyncErrorKind::NumMessagesMissing,
            10 => SyncErrorKind::UnexpectedEndOfSync,
            11 => SyncErrorKind::ExpectedBeginOfSync,
            12 => SyncErrorKind::ExpectedEndOfSync,
            _ => SyncErrorKind::Failed,
        }
    }

    /// Whether this error kind is ever sent as a `sync-error` frame.
    ///
    /// `SenderCancelled` is the one documented exception (§7): the peer already knows it
    /// cancelled, so the receiver never echoes an error frame back for it.
    pub fn is_reported_to_peer(&self) -> bool {
        !matches!(self, SyncErrorKind::SenderCancelled)
    }
}

/// Internal plumbing failure: channel closed, codec desync, or another bug-class error that is
/// not part of the wire taxonomy and should never reach a peer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A protocol-level synchronization failure, see [`SyncErrorKind`].
    #[error(transparent)]
    Sync(#[from] SyncErrorKind),

    /// Something went wrong that indicates a bug rather than a protocol violation: a channel
    /// closed unexpectedly, the transport returned malformed framing, etc.
    #[error("critical session failure: {0}")]
    Critical(String),
}
