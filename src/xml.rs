//! The wire vocabulary (§6): a closed set of flat XML elements exchanged on the bound
//! group/connection, plus their `quick-xml`-backed encode/decode.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::SyncErrorKind;
use crate::user::UserStatus;

/// One frame of the synchronization wire vocabulary.
///
/// Unlike a general-purpose XML document model this carries no children or text nodes: every
/// element in this protocol is self-contained, so one frame is always one flat, complete node —
/// there is never a reason to hand around a parsed document.
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    /// `sync-begin num-messages="N"` — opens the inbound sync content stream.
    SyncBegin { num_messages: Option<u32> },
    /// `sync-user id=".." name=".." status=".."` plus any subclass-defined attributes.
    SyncUser { attributes: Vec<(String, String)> },
    /// `sync-end` — closes the content stream.
    SyncEnd,
    /// `sync-ack` — acknowledges a completed sync.
    SyncAck,
    /// `sync-cancel` — the sender aborts.
    SyncCancel,
    /// `sync-error domain=".." code=".."` — the receiver rejects.
    SyncError { domain: String, code: u32 },
}

impl XmlNode {
    /// The element's tag name, used both for encoding and for routing on decode.
    pub fn tag_name(&self) -> &'static str {
        match self {
            XmlNode::SyncBegin { .. } => "sync-begin",
            XmlNode::SyncUser { .. } => "sync-user",
            XmlNode::SyncEnd => "sync-end",
            XmlNode::SyncAck => "sync-ack",
            XmlNode::SyncCancel => "sync-cancel",
            XmlNode::SyncError { .. } => "sync-error",
        }
    }

    /// Build a `sync-user` frame from the base protocol's required attributes plus any
    /// subclass-defined ones, in the order a subclass appended them.
    pub fn sync_user(id: u64, name: &str, status: UserStatus, extra: &[(String, String)]) -> Self {
        let mut attributes = vec![
            ("id".to_string(), id.to_string()),
            ("name".to_string(), name.to_string()),
            ("status".to_string(), status.as_wire_str().to_string()),
        ];
        attributes.extend_from_slice(extra);
        XmlNode::SyncUser { attributes }
    }

    /// Serialize this frame to a single self-closed XML element.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        let mut start = BytesStart::new(self.tag_name());

        match self {
            XmlNode::SyncBegin { num_messages } => {
                if let Some(n) = num_messages {
                    start.push_attribute(("num-messages", n.to_string().as_str()));
                }
            }
            XmlNode::SyncUser { attributes } => {
                for (key, value) in attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
            }
            XmlNode::SyncEnd | XmlNode::SyncAck | XmlNode::SyncCancel => {}
            XmlNode::SyncError { domain, code } => {
                start.push_attribute(("domain", domain.as_str()));
                start.push_attribute(("code", code.to_string().as_str()));
            }
        }

        writer
            .write_event(Event::Empty(start))
            .expect("writing to an in-memory buffer cannot fail");

        String::from_utf8(buf).expect("quick-xml only emits valid UTF-8")
    }

    /// Parse a single self-closed (or empty-bodied) XML element back into an [`XmlNode`].
    ///
    /// Returns `Err` only for frames this protocol never emits on valid wire traffic; a
    /// `sync-begin` missing `num-messages` decodes successfully with `num_messages: None` — that
    /// is a *validation* failure (`NumMessagesMissing`), raised by the caller, not a parse error
    /// (see §4.4 of the specification).
    pub fn decode(raw: &str) -> Result<XmlNode, SyncErrorKind> {
        let mut reader = Reader::from_str(raw);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event().map_err(|_| SyncErrorKind::UnexpectedNode)? {
                Event::Empty(start) | Event::Start(start) => {
                    return Self::from_start(&start);
                }
                Event::Eof => return Err(SyncErrorKind::UnexpectedNode),
                _ => continue,
            }
        }
    }

    fn from_start(start: &BytesStart) -> Result<XmlNode, SyncErrorKind> {
        let name = qname_to_string(start.name());
        let attributes: Vec<(String, String)> = start
            .attributes()
            .filter_map(|a| a.ok())
            .map(|a| {
                let key = qname_to_string(a.key);
                let value = a.unescape_value().unwrap_or_default().into_owned();
                (key, value)
            })
            .collect();

        match name.as_str() {
            "sync-begin" => {
                let num_messages = attributes
                    .iter()
                    .find(|(k, _)| k == "num-messages")
                    .and_then(|(_, v)| v.parse::<u32>().ok());
                Ok(XmlNode::SyncBegin { num_messages })
            }
            "sync-user" => Ok(XmlNode::SyncUser { attributes }),
            "sync-end" => Ok(XmlNode::SyncEnd),
            "sync-ack" => Ok(XmlNode::SyncAck),
            "sync-cancel" => Ok(XmlNode::SyncCancel),
            "sync-error" => {
                let domain = attributes
                    .iter()
                    .find(|(k, _)| k == "domain")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                let code = attributes
                    .iter()
                    .find(|(k, _)| k == "code")
                    .and_then(|(_, v)| v.parse::<u32>().ok())
                    .unwrap_or(SyncErrorKind::Failed.code());
                Ok(XmlNode::SyncError { domain, code })
            }
            _ => Err(SyncErrorKind::UnexpectedNode),
        }
    }
}

fn qname_to_string(name: QName) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sync_begin() {
        let node = XmlNode::SyncBegin {
            num_messages: Some(2),
        };
        let encoded = node.encode();
        assert_eq!(XmlNode::decode(&encoded).unwrap(), node);
    }

    #[test]
    fn sync_begin_missing_num_messages_decodes_as_none() {
        let decoded = XmlNode::decode("<sync-begin/>").unwrap();
        assert_eq!(decoded, XmlNode::SyncBegin { num_messages: None });
    }

    #[test]
    fn round_trips_sync_user() {
        let node = XmlNode::sync_user(1, "Ann", UserStatus::Available, &[]);
        let encoded = node.encode();
        assert_eq!(XmlNode::decode(&encoded).unwrap(), node);
    }

    #[test]
    fn round_trips_sync_error() {
        let node = XmlNode::SyncError {
            domain: crate::error::SYNC_ERROR_DOMAIN.to_string(),
            code: SyncErrorKind::IdInUse.code(),
        };
        let encoded = node.encode();
        assert_eq!(XmlNode::decode(&encoded).unwrap(), node);
    }

    #[test]
    fn unrecognised_element_is_unexpected_node() {
        assert_eq!(
            XmlNode::decode("<frobnicate/>").unwrap_err(),
            SyncErrorKind::UnexpectedNode
        );
    }
}
