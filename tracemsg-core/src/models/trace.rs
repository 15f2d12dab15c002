use bson::oid::ObjectId;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::codec;

/// A trace message as seen by API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMessage {
    /// Hex form of the store-assigned ObjectId; `None` until persisted.
    pub id: Option<String>,
    pub session_id: String,
    pub payload: String,
    pub ts: DateTime<FixedOffset>,
}

/// Insert request body. Client-supplied `id` and `ts` fields are not part of
/// it and get dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrace {
    pub session_id: String,
    pub payload: String,
}

impl NewTrace {
    pub fn stamped(self, ts: DateTime<FixedOffset>) -> TraceMessage {
        TraceMessage {
            id: None,
            session_id: self.session_id,
            payload: self.payload,
            ts,
        }
    }
}

/// Document layout in the `trace_msgs` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub payload: String,
    pub ts: bson::DateTime,
}

impl From<&TraceMessage> for TraceDocument {
    fn from(msg: &TraceMessage) -> Self {
        Self {
            // ids are always assigned by the store
            id: None,
            session_id: msg.session_id.clone(),
            payload: msg.payload.clone(),
            ts: codec::to_store(&msg.ts),
        }
    }
}

impl From<TraceDocument> for TraceMessage {
    fn from(doc: TraceDocument) -> Self {
        Self {
            id: doc.id.map(|oid| oid.to_hex()),
            session_id: doc.session_id,
            payload: doc.payload,
            ts: codec::from_store(doc.ts),
        }
    }
}
