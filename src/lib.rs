//! Collaborative session synchronization core.
//!
//! A [`session::Session`] is, at once: a consumer of a bidirectional ordered XML message channel
//! bound to a group ([`transport::GroupChannel`]); a three-state protocol machine
//! (*Synchronizing* → *Running* → *Closed*); and, while `Running`, the holder of a roster of
//! outbound synchronizations keyed by peer connection.
//!
//! The transport itself, the document buffer's content model, and anything built on top of the
//! base `sync-user` content-item vocabulary are external collaborators — this crate only defines
//! the trait boundaries they plug into ([`transport::GroupChannel`], [`config::Buffer`]).

pub mod config;
pub mod error;
pub mod events;
pub mod inbound;
pub mod outbound;
pub mod session;
pub mod transport;
pub mod user;
pub mod xml;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Buffer, SessionConfig, SyncSource};
pub use error::{SessionError, SyncErrorKind, SYNC_ERROR_DOMAIN};
pub use events::{NullObserver, SessionObserver};
pub use session::{Session, SyncStatus};
pub use transport::{Connection, ConnectionStatus, Group, GroupChannel, TransportError};
pub use user::{User, UserStatus, UserTable};
pub use xml::XmlNode;
