//! Responder side: performs routed mutations against the local store.

use portal_core::{AsyncDocumentStore, DocumentId, Session};
use tracing::{debug, warn};

use crate::protocol::{MutationEnvelope, MutationRequest, MutationResponse};

/// Handle an incoming mutation with the responder's own session.
///
/// A target that does not exist is answered with `Rejected`; a store failure
/// with `Error`.
pub async fn handle_request<S: AsyncDocumentStore>(
    store: &S,
    session: &Session,
    envelope: MutationEnvelope,
) -> MutationResponse {
    let op = envelope.request.op();
    debug!(request_id = envelope.request_id, op, "handling routed mutation");

    match envelope.request {
        MutationRequest::Update {
            target,
            data,
            options,
        } => {
            if !exists(store, &target).await {
                return MutationResponse::Rejected;
            }
            match store.async_update(session, &target, &data, &options).await {
                Ok(document) => MutationResponse::Document(document.id),
                Err(e) => error(e),
            }
        }

        MutationRequest::Delete { target, options } => {
            if !exists(store, &target).await {
                return MutationResponse::Rejected;
            }
            match store.async_delete(session, &target, &options).await {
                Ok(document) => MutationResponse::Deleted(document.id),
                Err(e) => error(e),
            }
        }

        MutationRequest::UpdateEmbedded {
            parent,
            kind,
            updates,
            options,
        } => {
            if !exists(store, &parent).await {
                return MutationResponse::Rejected;
            }
            match store
                .async_update_embedded(session, &parent, &kind, &updates, &options)
                .await
            {
                Ok(documents) => MutationResponse::Documents(documents.into_iter().map(|d| d.id).collect()),
                Err(e) => error(e),
            }
        }

        MutationRequest::Create { kind, data } => {
            match store.async_create(session, &kind, &data).await {
                Ok(document) => MutationResponse::Document(document.id),
                Err(e) => error(e),
            }
        }

        MutationRequest::CreateEmbedded {
            parent,
            kind,
            data,
            options,
        } => {
            if !exists(store, &parent).await {
                return MutationResponse::Rejected;
            }
            match store
                .async_create_embedded(session, &parent, &kind, &data, &options)
                .await
            {
                Ok(documents) => MutationResponse::Documents(documents.into_iter().map(|d| d.id).collect()),
                Err(e) => error(e),
            }
        }
    }
}

async fn exists<S: AsyncDocumentStore>(store: &S, id: &DocumentId) -> bool {
    match store.async_get(id).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!(%id, error = %e, "lookup failed");
            false
        }
    }
}

fn error(e: impl std::error::Error) -> MutationResponse {
    warn!(error = %e, "routed mutation failed");
    MutationResponse::Error {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use portal_core::{DocumentStore, MemoryDocumentStore, MutationOptions, Role, ACTOR, SCENE, TOKEN};
    use serde_json::json;

    use super::*;

    fn gm() -> Session {
        Session::new("gm", Role::Gamemaster)
    }

    fn envelope(request: MutationRequest) -> MutationEnvelope {
        MutationEnvelope::new(1, request)
    }

    #[tokio::test]
    async fn update_existing() {
        let store = MemoryDocumentStore::new();
        let actor = store.create(&gm(), ACTOR, &json!({"name": "Ogre"})).unwrap();

        let response = handle_request(
            &store,
            &gm(),
            envelope(MutationRequest::Update {
                target: actor.id.clone(),
                data: json!({"name": "Ogre Chief"}),
                options: MutationOptions::new(),
            }),
        )
        .await;

        assert_eq!(response, MutationResponse::Document(actor.id.clone()));
        assert_eq!(store.get(&actor.id).unwrap().unwrap().name(), Some("Ogre Chief"));
    }

    #[tokio::test]
    async fn update_missing_is_rejected() {
        let store = MemoryDocumentStore::new();
        let response = handle_request(
            &store,
            &gm(),
            envelope(MutationRequest::Update {
                target: DocumentId::from("Actor.gone"),
                data: json!({}),
                options: MutationOptions::new(),
            }),
        )
        .await;
        assert_eq!(response, MutationResponse::Rejected);
    }

    #[tokio::test]
    async fn create_embedded_returns_ids_in_order() {
        let store = MemoryDocumentStore::new();
        let scene = store.create(&gm(), SCENE, &json!({})).unwrap();

        let response = handle_request(
            &store,
            &gm(),
            envelope(MutationRequest::CreateEmbedded {
                parent: scene.id.clone(),
                kind: TOKEN.into(),
                data: vec![json!({"x": 0}), json!({"x": 100})],
                options: MutationOptions::new(),
            }),
        )
        .await;

        let MutationResponse::Documents(ids) = response else {
            panic!("Expected Documents response");
        };
        assert_eq!(ids.len(), 2);
        assert_eq!(store.get(&ids[1]).unwrap().unwrap().data["x"], json!(100));
    }

    #[tokio::test]
    async fn store_failure_becomes_error() {
        let store = MemoryDocumentStore::new();
        let weak = Session::new("bob", Role::Player);

        let response = handle_request(
            &store,
            &weak,
            envelope(MutationRequest::Create {
                kind: ACTOR.into(),
                data: json!({"name": "x"}),
            }),
        )
        .await;

        assert!(matches!(response, MutationResponse::Error { .. }));
    }

    #[tokio::test]
    async fn delete_reports_removed_id() {
        let store = MemoryDocumentStore::new();
        let actor = store.create(&gm(), ACTOR, &json!({})).unwrap();

        let response = handle_request(
            &store,
            &gm(),
            envelope(MutationRequest::Delete {
                target: actor.id.clone(),
                options: MutationOptions::new(),
            }),
        )
        .await;

        assert_eq!(response, MutationResponse::Deleted(actor.id.clone()));
        assert!(store.get(&actor.id).unwrap().is_none());
    }
}
