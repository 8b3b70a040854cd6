//! Messages exchanged between a requesting client and its responder.

use std::time::{SystemTime, UNIX_EPOCH};

use portal_core::{DocumentId, MutationOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_NAME: &str = "/portal/mutate/0.1.0";

/// A document mutation the caller could not perform itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationRequest {
    Update {
        target: DocumentId,
        data: Value,
        options: MutationOptions,
    },
    Delete {
        target: DocumentId,
        options: MutationOptions,
    },
    UpdateEmbedded {
        parent: DocumentId,
        kind: String,
        updates: Vec<Value>,
        options: MutationOptions,
    },
    Create {
        kind: String,
        data: Value,
    },
    CreateEmbedded {
        parent: DocumentId,
        kind: String,
        data: Vec<Value>,
        options: MutationOptions,
    },
}

impl MutationRequest {
    /// Short operation name, for logs.
    pub fn op(&self) -> &'static str {
        match self {
            MutationRequest::Update { .. } => "update",
            MutationRequest::Delete { .. } => "delete",
            MutationRequest::UpdateEmbedded { .. } => "update-embedded",
            MutationRequest::Create { .. } => "create",
            MutationRequest::CreateEmbedded { .. } => "create-embedded",
        }
    }
}

/// A request stamped for a single round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEnvelope {
    pub request_id: u64,
    /// Unix time in milliseconds when the request was sent.
    pub sent_at_ms: u64,
    pub request: MutationRequest,
}

impl MutationEnvelope {
    pub fn new(request_id: u64, request: MutationRequest) -> Self {
        let sent_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            request_id,
            sent_at_ms,
            request,
        }
    }
}

/// The responder's single answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationResponse {
    /// Identifier of the updated or created document.
    Document(DocumentId),
    /// Identifiers of embedded documents, in request order.
    Documents(Vec<DocumentId>),
    /// Identifier of the removed document.
    Deleted(DocumentId),
    /// The responder refused (e.g. the target does not exist on its side).
    Rejected,
    /// The responder's store failed.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_survives_cbor() {
        let envelope = MutationEnvelope::new(
            7,
            MutationRequest::Update {
                target: DocumentId::from("Scene.s.Token.t"),
                data: json!({"x": 100, "y": 200}),
                options: MutationOptions::new().with("animate", false),
            },
        );

        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes).unwrap();
        let recovered: MutationEnvelope = ciborium::from_reader(&bytes[..]).unwrap();

        assert_eq!(recovered, envelope);
        assert_eq!(recovered.request.op(), "update");
    }

    #[test]
    fn sent_at_is_stamped() {
        let envelope = MutationEnvelope::new(
            1,
            MutationRequest::Create {
                kind: "Actor".into(),
                data: json!({}),
            },
        );
        assert!(envelope.sent_at_ms > 0);
    }
}
