//! The receiver role of a synchronization (§4.2): `InboundSync` accounting and frame validation.

use crate::error::SyncErrorKind;
use crate::transport::{Connection, Group};
use crate::user::{decode_user_props, validate_and_build_user, UserTable};
use crate::xml::XmlNode;

/// State specific to a session in `Synchronizing` status (§3 "InboundSync").
#[derive(Debug)]
pub(crate) struct InboundSync<C, G>
where
    C: Connection,
    G: Group,
{
    pub synchronizer: C,
    pub group: G,
    /// `M`: total expected message count, including `sync-begin` and `sync-end`. Unset (`0`)
    /// until `sync-begin` has been accepted.
    total: u32,
    /// `r`: messages received so far, counting `sync-begin` itself once accepted.
    received: u32,
    /// Guards against re-entrant `close()` while handling our own failure (§4.1).
    pub closing: bool,
}

/// Result of handling one inbound frame.
pub(crate) enum InboundStep {
    /// Progress advanced to `r / M`.
    Progress(f64),
    /// `sync-end` was accepted and acknowledged; the session may transition to `Running`.
    Complete,
    /// The sender cancelled. No `sync-error` is sent back (§7).
    SenderCancelled,
    /// A validation or framing error occurred; a `sync-error` frame must be sent to the peer
    /// before surfacing `synchronization-failed`.
    Failed(SyncErrorKind),
}

impl<C, G> InboundSync<C, G>
where
    C: Connection,
    G: Group,
{
    pub fn new(synchronizer: C, group: G) -> Self {
        Self {
            synchronizer,
            group,
            total: 0,
            received: 0,
            closing: false,
        }
    }

    /// Whether `sync-begin` has been accepted yet.
    fn has_begun(&self) -> bool {
        self.received != 0
    }

    fn progress(&self) -> f64 {
        self.received as f64 / self.total as f64
    }

    /// Handle one frame arriving from `self.synchronizer`.
    ///
    /// Frames arriving from any other connection while `Synchronizing` are a protocol violation
    /// and must be rejected by the caller before reaching this method (§4.2).
    pub fn handle(&mut self, node: XmlNode, table: &mut UserTable) -> InboundStep {
        match node {
            XmlNode::SyncBegin { num_messages } => {
                if self.has_begun() {
                    return InboundStep::Failed(SyncErrorKind::UnexpectedBeginOfSync);
                }
                let Some(n) = num_messages else {
                    return InboundStep::Failed(SyncErrorKind::NumMessagesMissing);
                };
                self.total = n + 2;
                self.received = 1;
                InboundStep::Progress(self.progress())
            }
            XmlNode::SyncCancel => InboundStep::SenderCancelled,
            XmlNode::SyncEnd => {
                if self.has_begun() && self.received == self.total - 1 {
                    self.received = self.total;
                    InboundStep::Complete
                } else {
                    InboundStep::Failed(SyncErrorKind::UnexpectedEndOfSync)
                }
            }
            XmlNode::SyncUser { attributes } => {
                if !self.has_begun() {
                    return InboundStep::Failed(SyncErrorKind::ExpectedBeginOfSync);
                }
                if self.received == self.total - 1 {
                    return InboundStep::Failed(SyncErrorKind::ExpectedEndOfSync);
                }

                let props = decode_user_props(&attributes);
                match validate_and_build_user(props, table, None) {
                    Ok(user) => {
                        table
                            .add_user(user)
                            .expect("validate_and_build_user already checked uniqueness");
                        self.received += 1;
                        InboundStep::Progress(self.progress())
                    }
                    Err(kind) => InboundStep::Failed(kind),
                }
            }
            XmlNode::SyncAck | XmlNode::SyncError { .. } => {
                InboundStep::Failed(SyncErrorKind::UnexpectedNode)
            }
        }
    }

    /// `r` and `M`, for tests and diagnostics.
    #[cfg(test)]
    pub fn counts(&self) -> (u32, u32) {
        (self.received, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserStatus;

    fn table() -> UserTable {
        UserTable::new()
    }

    #[test]
    fn happy_path_two_users() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();

        let InboundStep::Progress(p) = inbound.handle(XmlNode::SyncBegin { num_messages: Some(2) }, &mut table) else {
            panic!("expected progress")
        };
        assert_eq!(p, 1.0 / 4.0);

        let InboundStep::Progress(p) = inbound.handle(XmlNode::sync_user(1, "Ann", UserStatus::Available, &[]), &mut table) else {
            panic!("expected progress")
        };
        assert_eq!(p, 2.0 / 4.0);

        let InboundStep::Progress(p) = inbound.handle(XmlNode::sync_user(2, "Bob", UserStatus::Available, &[]), &mut table) else {
            panic!("expected progress")
        };
        assert_eq!(p, 3.0 / 4.0);

        assert!(matches!(
            inbound.handle(XmlNode::SyncEnd, &mut table),
            InboundStep::Complete
        ));
        assert_eq!(inbound.counts(), (4, 4));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_user_table_completes_immediately() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(0) }, &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::SyncEnd, &mut table),
            InboundStep::Complete
        ));
    }

    #[test]
    fn duplicate_begin_is_rejected() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(2) }, &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::SyncBegin { num_messages: Some(2) }, &mut table),
            InboundStep::Failed(SyncErrorKind::UnexpectedBeginOfSync)
        ));
    }

    #[test]
    fn missing_num_messages_is_rejected() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        assert!(matches!(
            inbound.handle(XmlNode::SyncBegin { num_messages: None }, &mut table),
            InboundStep::Failed(SyncErrorKind::NumMessagesMissing)
        ));
    }

    #[test]
    fn end_before_all_items_received_is_rejected() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(2) }, &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::SyncEnd, &mut table),
            InboundStep::Failed(SyncErrorKind::UnexpectedEndOfSync)
        ));
    }

    #[test]
    fn content_after_last_item_is_rejected() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(1) }, &mut table);
        inbound.handle(XmlNode::sync_user(1, "Ann", UserStatus::Available, &[]), &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::sync_user(2, "Bob", UserStatus::Available, &[]), &mut table),
            InboundStep::Failed(SyncErrorKind::ExpectedEndOfSync)
        ));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(2) }, &mut table);
        inbound.handle(XmlNode::sync_user(1, "Ann", UserStatus::Available, &[]), &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::sync_user(1, "Bob", UserStatus::Available, &[]), &mut table),
            InboundStep::Failed(SyncErrorKind::IdInUse)
        ));
    }

    #[test]
    fn sender_cancel_mid_stream_is_silent() {
        let mut inbound = InboundSync::new("peer", "group");
        let mut table = table();
        inbound.handle(XmlNode::SyncBegin { num_messages: Some(5) }, &mut table);
        inbound.handle(XmlNode::sync_user(1, "Ann", UserStatus::Available, &[]), &mut table);
        assert!(matches!(
            inbound.handle(XmlNode::SyncCancel, &mut table),
            InboundStep::SenderCancelled
        ));
    }
}
