//! The sender role of a synchronization (§4.3): `OutboundSync` framing, progress and the
//! `InProgress → AwaitingAck` sub-state machine.

use crate::transport::Group;
use crate::xml::XmlNode;

/// Sub-state of an outbound synchronization (§3, glossary).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OutboundStatus {
    /// Cancellable: no frame past `sync-end` has been enqueued yet.
    InProgress,
    /// Committed: `sync-end` has been enqueued. Only an ack or a transport failure can now
    /// retire this record (§4.3 "Cancellation semantics").
    AwaitingAck,
}

/// State specific to one outstanding outbound synchronization (§3 "OutboundSync").
#[derive(Debug)]
pub(crate) struct OutboundSync<G>
where
    G: Group,
{
    pub group: G,
    /// `T = K + 2`.
    total: u32,
    /// Number of frames the transport has told us it enqueued.
    enqueued: u32,
    /// `s`: number of frames the transport has told us it actually sent.
    sent: u32,
    pub status: OutboundStatus,
}

impl<G> OutboundSync<G>
where
    G: Group,
{
    /// Build the full framed sequence for `item_count` content items (`sync-begin`, each
    /// item, `sync-end`) and the bookkeeping record to go with it (§4.3, steps 1-3).
    pub fn begin(group: G, items: Vec<XmlNode>) -> (Self, Vec<XmlNode>) {
        let item_count = items.len() as u32;
        let mut frames = Vec::with_capacity(items.len() + 2);
        frames.push(XmlNode::SyncBegin {
            num_messages: Some(item_count),
        });
        frames.extend(items);
        frames.push(XmlNode::SyncEnd);

        let record = Self {
            group,
            total: item_count + 2,
            enqueued: 0,
            sent: 0,
            status: OutboundStatus::InProgress,
        };

        (record, frames)
    }

    /// `T`, for tests and diagnostics.
    #[cfg(test)]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// The transport has enqueued one more frame toward this peer. Once every frame up to and
    /// including `sync-end` has been enqueued, the record commits to `AwaitingAck` — this is
    /// "past the point of no return" (§4.3).
    pub fn note_frame_enqueued(&mut self) {
        self.enqueued = (self.enqueued + 1).min(self.total);
        if self.enqueued >= self.total {
            self.status = OutboundStatus::AwaitingAck;
        }
    }

    /// The transport has actually sent one more frame toward this peer; returns the new
    /// progress fraction `s / T`.
    pub fn note_frame_sent(&mut self) -> f64 {
        self.sent = (self.sent + 1).min(self.total);
        self.progress()
    }

    pub fn progress(&self) -> f64 {
        self.sent as f64 / self.total as f64
    }

    /// Whether this record can still be cancelled locally (§4.3).
    pub fn can_cancel(&self) -> bool {
        self.status == OutboundStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_frames_the_content_items() {
        let (record, frames) = OutboundSync::begin(
            "group",
            vec![XmlNode::sync_user(1, "Ann", crate::user::UserStatus::Available, &[])],
        );
        assert_eq!(record.total(), 3);
        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0], XmlNode::SyncBegin { num_messages: Some(1) }));
        assert!(matches!(frames[2], XmlNode::SyncEnd));
    }

    #[test]
    fn empty_user_table_yields_minimal_frame() {
        let (record, frames) = OutboundSync::begin("group", vec![]);
        assert_eq!(record.total(), 2);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn commits_to_awaiting_ack_once_end_is_enqueued() {
        let (mut record, _frames) = OutboundSync::begin(
            "group",
            vec![XmlNode::sync_user(1, "Ann", crate::user::UserStatus::Available, &[])],
        );
        assert!(record.can_cancel());
        record.note_frame_enqueued(); // sync-begin
        assert!(record.can_cancel());
        record.note_frame_enqueued(); // sync-user
        assert!(record.can_cancel());
        record.note_frame_enqueued(); // sync-end
        assert!(!record.can_cancel());
        assert_eq!(record.status, OutboundStatus::AwaitingAck);
    }

    #[test]
    fn progress_tracks_frames_sent_not_enqueued() {
        let (mut record, _frames) = OutboundSync::begin("group", vec![]);
        assert_eq!(record.progress(), 0.0);
        assert_eq!(record.note_frame_sent(), 0.5);
        assert_eq!(record.note_frame_sent(), 1.0);
    }
}
