//! Session construction configuration (§6 "Configuration options recognised at construction").

use crate::transport::{Connection, Group};
use crate::user::UserTable;

/// Marker trait for the opaque document buffer the session populates during inbound sync and
/// mutates during live traffic.
///
/// The buffer's content model, and how content frames get applied to it, are external
/// collaborators (§1) — the session only owns and hands out a handle to one.
pub trait Buffer: Send + Sync + 'static {}

impl<T> Buffer for T where T: Send + Sync + 'static {}

/// Construction-time configuration for a [`crate::session::Session`].
///
/// A `new` with the mandatory fields plus chained `with_*` setters for the optional ones, so
/// adding a new construction option later does not break existing call sites.
pub struct SessionConfig<B, C, G>
where
    B: Buffer,
    C: Connection,
    G: Group,
{
    pub(crate) buffer: B,
    pub(crate) user_table: UserTable,
    pub(crate) sync_source: Option<SyncSource<C, G>>,
    pub(crate) subscription_group: Option<G>,
}

/// The peer and group an inbound synchronization will run against, present only when the
/// session is to be constructed already in `Synchronizing` state (§4.1, §6).
#[derive(Clone, Debug)]
pub struct SyncSource<C, G>
where
    C: Connection,
    G: Group,
{
    pub connection: C,
    pub group: G,
}

impl<B, C, G> SessionConfig<B, C, G>
where
    B: Buffer,
    C: Connection,
    G: Group,
{
    /// Start a `Running` session (no sync source) around the given buffer.
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            user_table: UserTable::new(),
            sync_source: None,
            subscription_group: None,
        }
    }

    /// Seed the session with a preexisting roster (else it starts empty).
    pub fn with_user_table(mut self, user_table: UserTable) -> Self {
        self.user_table = user_table;
        self
    }

    /// Start the session in `Synchronizing` state, receiving its initial state from
    /// `connection` within `group`.
    pub fn with_sync_source(mut self, connection: C, group: G) -> Self {
        self.sync_source = Some(SyncSource { connection, group });
        self
    }

    /// Set the multicast handle used to broadcast live edits once `Running`.
    pub fn with_subscription_group(mut self, group: G) -> Self {
        self.subscription_group = Some(group);
        self
    }
}
