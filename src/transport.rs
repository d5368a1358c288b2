//! The consumed transport interface (§6): an ordered XML message channel bound to a group.
//!
//! The transport layer itself — how frames actually reach a peer — is explicitly out of scope
//! (§1); this module only declares the trait boundary the `Session` is generic over, so the
//! embedding application can supply a concrete sync/connection implementation without this
//! crate ever depending on a specific transport stack.

use crate::xml::XmlNode;

/// A peer connection handle, as used to address `send_to_connection` and to key the outbound
/// sync roster. Reference-counted handles (§5 "Shared resources") are modeled by `Clone` rather
/// than an explicit ref/unref pair — the transport is free to back this with an `Arc` internally.
pub trait Connection: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {}

impl<T> Connection for T where T: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static
{}

/// A named multicast bag of peer connections (§2, §3 "Subscription group").
pub trait Group: Clone + std::fmt::Debug + Send + Sync + 'static {}

impl<T> Group for T where T: Clone + std::fmt::Debug + Send + Sync + 'static {}

/// Connection lifecycle states relevant to an in-progress synchronization (§4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    Open,
    Closing,
    Closed,
}

/// Failure returned by a transport operation; the session treats every variant the same way —
/// as an immediate, local failure of the attempted send, never retried (Non-goals, §1).
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum TransportError {
    #[error("connection is not a member of the group")]
    NotAMember,
    #[error("transport is gone")]
    Gone,
}

/// The transport operations a `Session` requires from its environment (§6).
///
/// All methods are synchronous submission points: enqueueing a frame does not block on it being
/// delivered. Delivery progress and inbound traffic instead arrive back into the session through
/// its own `on_frame_enqueued` / `on_frame_sent` / `on_frame_received` /
/// `on_connection_status_changed` methods (§5 "Suspension points": none in-process).
pub trait GroupChannel<C, G>: Send + Sync
where
    C: Connection,
    G: Group,
{
    /// Enqueue one frame addressed to a single connection within a group.
    fn send_to_connection(&self, group: &G, connection: &C, node: XmlNode) -> Result<(), TransportError>;

    /// Broadcast one frame to every member of a group except the given connection (if any).
    fn send_to_group(&self, group: &G, except: Option<&C>, node: XmlNode) -> Result<(), TransportError>;

    /// Drop all unsent frames previously queued for this connection.
    ///
    /// A `clear_queue` immediately followed by a new `send_to_connection` is well-defined and
    /// ordered (§9, open question): the new frame is queued after the old ones are discarded,
    /// never racing with them.
    fn clear_queue(&self, group: &G, connection: &C);

    /// Whether `connection` is currently a member of `group`.
    fn group_has_connection(&self, group: &G, connection: &C) -> bool;
}
