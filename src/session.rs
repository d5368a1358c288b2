//! The top-level `Session` state machine (§4.1): ties the inbound/outbound sync roles, the user
//! table and the transport together behind the public operations of §6.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::{Buffer, SessionConfig};
use crate::error::{SessionError, SyncErrorKind, SYNC_ERROR_DOMAIN};
use crate::events::{NullObserver, SessionObserver};
use crate::inbound::{InboundStep, InboundSync};
use crate::outbound::{OutboundStatus, OutboundSync};
use crate::transport::{Connection, ConnectionStatus, Group, GroupChannel};
use crate::user::{User, UserTable};
use crate::xml::XmlNode;

/// The status-specific payload (§3 "Invariant 1"): exactly one `InboundSync` while
/// `Synchronizing`, zero or more `OutboundSync` records while `Running`, neither while `Closed`.
enum Status<C, G>
where
    C: Connection,
    G: Group,
{
    Synchronizing(InboundSync<C, G>),
    Running(HashMap<C, OutboundSync<G>>),
    Closed,
}

/// The synchronization status of one peer, as returned by [`Session::get_sync_status`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncStatus {
    None,
    InProgress,
    AwaitingAck,
}

/// A collaborative session: consumer of a bound group/connection channel, three-state protocol
/// machine, and (while `Running`) holder of the outbound synchronization roster.
pub struct Session<B, C, G, O = NullObserver>
where
    B: Buffer,
    C: Connection,
    G: Group,
    O: SessionObserver<C>,
{
    status: Status<C, G>,
    buffer: B,
    user_table: UserTable,
    subscription_group: Option<G>,
    transport: Arc<dyn GroupChannel<C, G>>,
    observer: O,
}

impl<B, C, G, O> Session<B, C, G, O>
where
    B: Buffer,
    C: Connection,
    G: Group,
    O: SessionObserver<C>,
{
    /// Construct a session. Starts `Synchronizing` toward `config.sync_source` if one was
    /// given, else `Running` with an empty roster (§6 "Configuration options").
    pub fn new(transport: Arc<dyn GroupChannel<C, G>>, config: SessionConfig<B, C, G>, observer: O) -> Self {
        let status = match &config.sync_source {
            Some(source) => {
                debug!(connection = ?source.connection, "session starting in Synchronizing state");
                Status::Synchronizing(InboundSync::new(source.connection.clone(), source.group.clone()))
            }
            None => Status::Running(HashMap::new()),
        };

        Self {
            status,
            buffer: config.buffer,
            user_table: config.user_table,
            subscription_group: config.subscription_group,
            transport,
            observer,
        }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn user_table(&self) -> &UserTable {
        &self.user_table
    }

    pub fn is_synchronizing(&self) -> bool {
        matches!(self.status, Status::Synchronizing(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, Status::Running(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, Status::Closed)
    }

    pub fn subscription_group(&self) -> Option<&G> {
        self.subscription_group.as_ref()
    }

    pub fn set_subscription_group(&mut self, group: Option<G>) {
        self.subscription_group = group;
    }

    /// Add a user directly, bypassing the wire codec (§6 "add-user").
    pub fn add_user(&mut self, user: User) -> Result<(), SyncErrorKind> {
        self.user_table.add_user(user)
    }

    pub fn get_sync_status(&self, peer: &C) -> SyncStatus {
        match &self.status {
            Status::Running(roster) => match roster.get(peer).map(|record| record.status) {
                Some(OutboundStatus::InProgress) => SyncStatus::InProgress,
                Some(OutboundStatus::AwaitingAck) => SyncStatus::AwaitingAck,
                None => SyncStatus::None,
            },
            _ => SyncStatus::None,
        }
    }

    pub fn get_sync_progress(&self, peer: &C) -> Option<f64> {
        match &self.status {
            Status::Running(roster) => roster.get(peer).map(|record| record.progress()),
            _ => None,
        }
    }

    /// Broadcast one frame to every member of the subscription group (§6 "send-to-subscriptions").
    pub fn send_to_subscriptions(&self, except: Option<&C>, node: XmlNode) -> Result<(), SessionError> {
        let group = self
            .subscription_group
            .as_ref()
            .ok_or_else(|| SessionError::Critical("no subscription group set".to_string()))?;
        self.transport
            .send_to_group(group, except, node)
            .map_err(|err| SessionError::Critical(err.to_string()))
    }

    /// Begin synchronizing the current user table to `peer` within `group` (§4.3).
    ///
    /// Preconditions enforced here: the session is `Running`, no synchronization is already
    /// outstanding for `peer`, and `peer` is a member of `group`.
    pub fn synchronize_to(&mut self, group: G, peer: C) -> Result<(), SessionError> {
        if !matches!(self.status, Status::Running(_)) {
            return Err(SessionError::Critical(
                "synchronize_to called outside Running state".to_string(),
            ));
        }

        if let Status::Running(roster) = &self.status {
            if roster.contains_key(&peer) {
                return Err(SessionError::Critical(
                    "a synchronization to this peer is already outstanding".to_string(),
                ));
            }
        }

        if !self.transport.group_has_connection(&group, &peer) {
            return Err(SessionError::Critical(
                "peer is not a member of the group".to_string(),
            ));
        }

        let items: Vec<XmlNode> = self
            .user_table
            .iter()
            .map(|user| XmlNode::sync_user(user.id, &user.name, user.status, &user.attributes))
            .collect();

        let (record, frames) = OutboundSync::begin(group.clone(), items);
        debug!(?peer, total = frames.len(), "synchronization to peer started");

        if let Status::Running(roster) = &mut self.status {
            roster.insert(peer.clone(), record);
        }

        for frame in frames {
            if let Err(err) = self.transport.send_to_connection(&group, &peer, frame) {
                warn!(?peer, %err, "transport rejected an outbound synchronization frame");
                if let Status::Running(roster) = &mut self.status {
                    roster.remove(&peer);
                }
                return Err(SessionError::Critical(format!(
                    "transport rejected synchronization frame: {err}"
                )));
            }
        }

        Ok(())
    }

    /// Explicitly close the session (§4.1, §7 "close handler").
    ///
    /// If still `Synchronizing`, the inbound record is cancelled: a `sync-error(ReceiverCancelled)`
    /// frame is sent to the synchronizer and `synchronization-failed` is surfaced before the
    /// connection is released. Every still-live outbound record is resolved per §4.3: `InProgress`
    /// records are cancelled (`sync-cancel` emitted) and fail with `ReceiverCancelled`;
    /// `AwaitingAck` records cannot be cancelled and fail with `ConnectionClosed` instead, matching
    /// what a real transport loss would report for that sub-state.
    ///
    /// Every notification above is emitted while `self.status` still reflects the pre-close state,
    /// so an observer inspecting `get_sync_status`/`get_sync_progress` from inside a callback sees
    /// the record it was just told about; `self.status` is only replaced with `Closed` afterwards.
    pub fn close(&mut self) {
        match &self.status {
            Status::Closed => return,
            Status::Synchronizing(inbound) if inbound.closing => return,
            _ => {}
        }

        if let Status::Synchronizing(inbound) = &mut self.status {
            inbound.closing = true;
            let synchronizer = inbound.synchronizer.clone();
            let group = inbound.group.clone();

            let _ = self.transport.send_to_connection(
                &group,
                &synchronizer,
                XmlNode::SyncError {
                    domain: SYNC_ERROR_DOMAIN.to_string(),
                    code: SyncErrorKind::ReceiverCancelled.code(),
                },
            );
            self.observer
                .on_synchronization_failed(&synchronizer, &SyncErrorKind::ReceiverCancelled);
        } else if let Status::Running(roster) = &self.status {
            for (peer, record) in roster {
                match record.status {
                    OutboundStatus::InProgress => {
                        self.transport.clear_queue(&record.group, peer);
                        let _ = self
                            .transport
                            .send_to_connection(&record.group, peer, XmlNode::SyncCancel);
                        self.observer
                            .on_synchronization_failed(peer, &SyncErrorKind::ReceiverCancelled);
                    }
                    OutboundStatus::AwaitingAck => {
                        self.observer
                            .on_synchronization_failed(peer, &SyncErrorKind::ConnectionClosed);
                    }
                }
            }
        }

        self.status = Status::Closed;
        self.observer.on_close();
    }

    /// The transport enqueued one more frame toward `peer` (§5, outbound `frame-enqueued`).
    pub fn on_frame_enqueued(&mut self, peer: &C) {
        if let Status::Running(roster) = &mut self.status {
            if let Some(record) = roster.get_mut(peer) {
                record.note_frame_enqueued();
            }
        }
    }

    /// The transport actually sent one more frame toward `peer` (§4.3 "Progress ... frame-sent").
    pub fn on_frame_sent(&mut self, peer: &C) {
        if let Status::Running(roster) = &mut self.status {
            if let Some(record) = roster.get_mut(peer) {
                let fraction = record.note_frame_sent();
                trace!(?peer, fraction, "synchronization progress");
                self.observer.on_synchronization_progress(peer, fraction);
            }
        }
    }

    /// A frame arrived from `peer`. Dispatches to the inbound or outbound handling per whichever
    /// role is active (§4.2, §4.3).
    pub fn on_frame_received(&mut self, peer: &C, raw: &str) {
        if matches!(self.status, Status::Closed) {
            return;
        }

        let node = match XmlNode::decode(raw) {
            Ok(node) => node,
            Err(kind) => {
                if matches!(&self.status, Status::Synchronizing(inbound) if inbound.synchronizer == *peer) {
                    self.fail_inbound(kind);
                } else {
                    warn!(?peer, "dropped an unparseable frame outside inbound sync");
                }
                return;
            }
        };

        match &self.status {
            Status::Synchronizing(inbound) if *peer == inbound.synchronizer => {
                self.handle_inbound_frame(node);
            }
            Status::Synchronizing(_) => {
                warn!(?peer, "dropped a frame from a non-synchronizer connection while Synchronizing");
            }
            Status::Running(_) => self.handle_running_frame(peer, node),
            Status::Closed => {}
        }
    }

    /// A watched connection changed lifecycle state (§4.5).
    pub fn on_connection_status_changed(&mut self, peer: &C, status: ConnectionStatus) {
        if !matches!(status, ConnectionStatus::Closing | ConnectionStatus::Closed) {
            return;
        }

        let is_synchronizer = matches!(&self.status, Status::Synchronizing(inbound) if inbound.synchronizer == *peer);
        if is_synchronizer {
            self.fail_inbound(SyncErrorKind::ConnectionClosed);
            return;
        }

        let outbound_status = match &self.status {
            Status::Running(roster) => roster.get(peer).map(|record| (record.status, record.group.clone())),
            _ => None,
        };

        if let Some((OutboundStatus::InProgress, group)) = outbound_status {
            self.transport.clear_queue(&group, peer);
            let _ = self.transport.send_to_connection(&group, peer, XmlNode::SyncCancel);
            self.fail_outbound(peer, SyncErrorKind::ReceiverCancelled);
        } else if let Some((OutboundStatus::AwaitingAck, _)) = outbound_status {
            self.fail_outbound(peer, SyncErrorKind::ConnectionClosed);
        }
    }

    fn handle_inbound_frame(&mut self, node: XmlNode) {
        let Status::Synchronizing(inbound) = &mut self.status else {
            return;
        };

        match inbound.handle(node, &mut self.user_table) {
            InboundStep::Progress(fraction) => {
                let synchronizer = inbound.synchronizer.clone();
                trace!(?synchronizer, fraction, "inbound synchronization progress");
                self.observer.on_synchronization_progress(&synchronizer, fraction);
            }
            InboundStep::Complete => {
                let synchronizer = inbound.synchronizer.clone();
                let group = inbound.group.clone();
                debug!(?synchronizer, "inbound synchronization complete");
                self.observer.on_synchronization_progress(&synchronizer, 1.0);
                let _ = self
                    .transport
                    .send_to_connection(&group, &synchronizer, XmlNode::SyncAck);
                self.observer.on_synchronization_complete(&synchronizer);
                self.status = Status::Running(HashMap::new());
            }
            InboundStep::SenderCancelled => {
                self.fail_inbound(SyncErrorKind::SenderCancelled);
            }
            InboundStep::Failed(kind) => {
                self.fail_inbound(kind);
            }
        }
    }

    fn handle_running_frame(&mut self, peer: &C, node: XmlNode) {
        let outbound = match &self.status {
            Status::Running(roster) => roster.get(peer).map(|record| (record.status, record.group.clone())),
            _ => None,
        };

        let Some((status, group)) = outbound else {
            // Frame from a peer with no outstanding synchronization: ordinary session traffic,
            // delegated to a content processor outside this crate's scope (§4.3).
            return;
        };

        match node {
            XmlNode::SyncAck if status == OutboundStatus::AwaitingAck => {
                self.complete_outbound(peer);
            }
            XmlNode::SyncError { domain, code } => {
                self.transport.clear_queue(&group, peer);
                let kind = SyncErrorKind::from_wire(&domain, code);
                self.fail_outbound(peer, kind);
            }
            _ => {
                // Not a sync control frame: ordinary session traffic (§4.3), out of scope here.
            }
        }
    }

    /// Fail the inbound synchronization, reporting `sync-error` to the peer unless `kind` is the
    /// one documented exception (§7 "Propagation policy").
    fn fail_inbound(&mut self, kind: SyncErrorKind) {
        let Status::Synchronizing(inbound) = &mut self.status else {
            return;
        };
        if inbound.closing {
            return;
        }
        inbound.closing = true;
        let synchronizer = inbound.synchronizer.clone();
        let group = inbound.group.clone();

        if kind.is_reported_to_peer() {
            let _ = self.transport.send_to_connection(
                &group,
                &synchronizer,
                XmlNode::SyncError {
                    domain: SYNC_ERROR_DOMAIN.to_string(),
                    code: kind.code(),
                },
            );
        }

        warn!(?synchronizer, %kind, "inbound synchronization failed");
        self.observer.on_synchronization_failed(&synchronizer, &kind);
        self.status = Status::Closed;
        self.observer.on_close();
    }

    fn fail_outbound(&mut self, peer: &C, kind: SyncErrorKind) {
        let is_live = matches!(&self.status, Status::Running(roster) if roster.contains_key(peer));
        if is_live {
            warn!(?peer, %kind, "outbound synchronization failed");
            self.observer.on_synchronization_failed(peer, &kind);
            if let Status::Running(roster) = &mut self.status {
                roster.remove(peer);
            }
        }
    }

    fn complete_outbound(&mut self, peer: &C) {
        let is_live = matches!(&self.status, Status::Running(roster) if roster.contains_key(peer));
        if is_live {
            debug!(?peer, "outbound synchronization complete");
            self.observer.on_synchronization_complete(peer);
            if let Status::Running(roster) = &mut self.status {
                roster.remove(peer);
            }
        }
    }
}
