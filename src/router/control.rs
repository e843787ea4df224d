//! Control channel between the application and the router
//!
//! Messages travel over a tokio mpsc mailbox. On the wire they keep the
//! compact `{ "v": 1, "op": n, "d": payload }` shape the dashboard posts.

use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::OfflineRouter;
use crate::cache::{Region, request_key_str};
use crate::error::{CacheError, Error, Result};
use crate::fetch::Fetcher;

/// Current wire schema version
pub const WIRE_VERSION: u8 = 1;

/// Mailbox depth before senders wait
const MAILBOX_CAPACITY: usize = 64;

/// Out-of-band instructions for the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Forget a consumed shared file (`op: 0`)
    DeleteShare { key: i64 },
    /// Drop an offline entry found stale or missing upstream (`op: 1`)
    DeleteOffline { url: String },
    /// Empty the thumbnail region (`op: 2`)
    PurgeThumbnails,
    /// Empty the offline region (`op: 3`)
    PurgeOffline,
}

/// Notifications from the router to every connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEvent {
    /// A fresh version has been installed (`{op: 0, d: true}`)
    VersionReady,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(default = "wire_version")]
    v: u8,
    op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<Value>,
}

fn wire_version() -> u8 {
    WIRE_VERSION
}

impl ControlMessage {
    fn to_wire(&self) -> Wire {
        let (op, d) = match self {
            ControlMessage::DeleteShare { key } => (0, Some(Value::from(*key))),
            ControlMessage::DeleteOffline { url } => (1, Some(Value::from(url.as_str()))),
            ControlMessage::PurgeThumbnails => (2, None),
            ControlMessage::PurgeOffline => (3, None),
        };
        Wire {
            v: WIRE_VERSION,
            op,
            d,
        }
    }

    fn from_wire(wire: Wire) -> std::result::Result<Self, String> {
        if wire.v != WIRE_VERSION {
            return Err(format!("unsupported control schema version {}", wire.v));
        }

        match wire.op {
            0 => {
                let key = match wire.d {
                    Some(Value::Number(n)) => n.as_i64(),
                    // Keys arrive from a query string as text
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                };
                key.map(|key| ControlMessage::DeleteShare { key })
                    .ok_or_else(|| "op 0 requires a numeric transfer key".to_string())
            }
            1 => match wire.d {
                Some(Value::String(url)) => Ok(ControlMessage::DeleteOffline { url }),
                _ => Err("op 1 requires a request URL".to_string()),
            },
            2 => Ok(ControlMessage::PurgeThumbnails),
            3 => Ok(ControlMessage::PurgeOffline),
            other => Err(format!("unknown control op {}", other)),
        }
    }
}

impl Serialize for ControlMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        ControlMessage::from_wire(wire).map_err(D::Error::custom)
    }
}

impl Serialize for RouterEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RouterEvent::VersionReady => Wire {
                v: WIRE_VERSION,
                op: 0,
                d: Some(Value::Bool(true)),
            }
            .serialize(serializer),
        }
    }
}

/// Result of applying one control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub entries_removed: usize,
}

/// Sending side of the router mailbox
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlHandle {
    /// Post a message to the router
    pub async fn send(&self, message: ControlMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| Error::Other("router mailbox closed".to_string()))
    }
}

impl<F: Fetcher + 'static> OfflineRouter<F> {
    /// Apply a control message. Applying the same message twice is a no-op
    /// the second time.
    pub fn apply(&self, message: &ControlMessage) -> std::result::Result<Applied, CacheError> {
        let entries_removed = match message {
            ControlMessage::DeleteShare { key } => usize::from(self.delete_shared(*key)?),
            ControlMessage::DeleteOffline { url } => match request_key_str(url) {
                Some(key) => usize::from(self.with_storage(|s| s.delete(Region::OfflineCache, &key))?),
                None => {
                    log::warn!("Ignoring delete for unparsable URL {}", url);
                    0
                }
            },
            ControlMessage::PurgeThumbnails => {
                self.with_storage(|s| s.clear_region(Region::PreviewIcons))?
                    .entries_removed
            }
            ControlMessage::PurgeOffline => {
                self.with_storage(|s| s.clear_region(Region::OfflineCache))?
                    .entries_removed
            }
        };

        log::debug!("Applied {:?}, removed {}", message, entries_removed);
        Ok(Applied { entries_removed })
    }

    /// Start the mailbox task. It runs until every [`ControlHandle`] is dropped.
    pub fn spawn_control(self: &Arc<Self>) -> (ControlHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ControlMessage>(MAILBOX_CAPACITY);
        let router = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = router.apply(&message) {
                    log::warn!("Control message {:?} failed: {}", message, e);
                }
            }
            log::debug!("Router mailbox closed");
        });

        (ControlHandle { tx }, task)
    }
}
