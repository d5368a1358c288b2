//! An in-memory transport double for tests, modeled on wiring two peers together through
//! in-process queues instead of a real network connection.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::transport::{GroupChannel, TransportError};
use crate::xml::XmlNode;

/// Deterministic in-memory group channel keyed by `&'static str` group/connection ids.
///
/// Frames are queued per `(group, connection)` rather than delivered immediately, so a test can
/// drive `on_frame_enqueued` / `on_frame_sent` / `on_frame_received` explicitly and exercise the
/// exact submission-order guarantee the real transport is expected to preserve (§5).
#[derive(Default)]
pub struct ChannelTransport {
    members: Mutex<HashMap<&'static str, HashSet<&'static str>>>,
    queues: Mutex<HashMap<(&'static str, &'static str), Vec<XmlNode>>>,
}

/// Install a `tracing` subscriber for the duration of the test process, gated on `RUST_LOG`
/// being set, so a test can opt into seeing log output without every test run paying for it.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, group: &'static str, connection: &'static str) {
        self.members
            .lock()
            .unwrap()
            .entry(group)
            .or_default()
            .insert(connection);
    }

    pub fn remove_member(&self, group: &'static str, connection: &'static str) {
        if let Some(members) = self.members.lock().unwrap().get_mut(group) {
            members.remove(connection);
        }
    }

    /// Pop the oldest queued frame for `(group, connection)`, simulating the transport having
    /// sent it; `None` once the queue is drained.
    pub fn pop_frame(&self, group: &'static str, connection: &'static str) -> Option<XmlNode> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.get_mut(&(group, connection))?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    pub fn queue_len(&self, group: &'static str, connection: &'static str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(&(group, connection))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl GroupChannel<&'static str, &'static str> for ChannelTransport {
    fn send_to_connection(
        &self,
        group: &&'static str,
        connection: &&'static str,
        node: XmlNode,
    ) -> Result<(), TransportError> {
        if !self.group_has_connection(group, connection) {
            return Err(TransportError::NotAMember);
        }
        self.queues
            .lock()
            .unwrap()
            .entry((*group, *connection))
            .or_default()
            .push(node);
        Ok(())
    }

    fn send_to_group(
        &self,
        group: &&'static str,
        except: Option<&&'static str>,
        node: XmlNode,
    ) -> Result<(), TransportError> {
        let members: Vec<&'static str> = self
            .members
            .lock()
            .unwrap()
            .get(group)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut queues = self.queues.lock().unwrap();
        for member in members {
            if let Some(skip) = except {
                if *skip == member {
                    continue;
                }
            }
            queues.entry((*group, member)).or_default().push(node.clone());
        }
        Ok(())
    }

    fn clear_queue(&self, group: &&'static str, connection: &&'static str) {
        self.queues.lock().unwrap().remove(&(*group, *connection));
    }

    fn group_has_connection(&self, group: &&'static str, connection: &&'static str) -> bool {
        self.members
            .lock()
            .unwrap()
            .get(group)
            .map(|set| set.contains(connection))
            .unwrap_or(false)
    }
}
