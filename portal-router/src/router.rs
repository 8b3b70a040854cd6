//! Privileged-write routing.
//!
//! Every entry point first checks whether the caller may perform the mutation
//! itself. If so it runs against the local store; otherwise the request goes to
//! the configured responder and the caller waits for its single answer, bounded
//! by the timeout. Either way the result is resolved through the local store,
//! so callers cannot tell which path was taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use portal_core::{
    AsyncDocumentStore, Capability, Document, DocumentId, MutationOptions, Session,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::{ChannelError, PeerChannel};
use crate::protocol::{MutationEnvelope, MutationRequest, MutationResponse};

/// How long a routed call waits for its responder.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// When false every mutation runs locally, permitted or not.
    pub enabled: bool,
    pub timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Error from a routed mutation. `E` is the local store's error type.
#[derive(Debug, thiserror::Error)]
pub enum RouteError<E> {
    #[error("document not found: {0}")]
    NotFound(DocumentId),
    #[error("the responder rejected the request")]
    Rejected,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("responder failed: {0}")]
    Remote(String),
    #[error("unexpected response type")]
    UnexpectedResponse,
    #[error(transparent)]
    Store(E),
}

/// Routes document mutations for one client session.
///
/// Calls are independent round trips: nothing is queued, ordered, retried or
/// cancelled, and there is no fallback when the responder is away.
pub struct Router<S, C: PeerChannel> {
    store: S,
    channel: C,
    session: Session,
    responder: C::Peer,
    config: RouterConfig,
    next_request: AtomicU64,
}

impl<S, C> Router<S, C>
where
    S: AsyncDocumentStore,
    C: PeerChannel,
{
    /// Creates a router acting for `session` that forwards to `responder`.
    pub fn new(store: S, channel: C, session: Session, responder: C::Peer) -> Self {
        Self {
            store,
            channel,
            session,
            responder,
            config: RouterConfig::default(),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Merges `data` into the target document.
    pub async fn update(
        &self,
        target: impl Into<DocumentId>,
        data: Value,
        options: MutationOptions,
    ) -> Result<Document, RouteError<S::Error>> {
        let target = target.into();
        let document = self.resolve(&target).await?;

        if self.runs_locally(document.is_owner(&self.session)) {
            return self
                .store
                .async_update(&self.session, &target, &data, &options)
                .await
                .map_err(RouteError::Store);
        }

        match self
            .route(MutationRequest::Update {
                target,
                data,
                options,
            })
            .await?
        {
            MutationResponse::Document(id) => self.resolve(&id).await,
            other => Err(unexpected(other)),
        }
    }

    /// Deletes the target document, returning its identifier.
    pub async fn delete(
        &self,
        target: impl Into<DocumentId>,
        options: MutationOptions,
    ) -> Result<DocumentId, RouteError<S::Error>> {
        let target = target.into();
        let document = self.resolve(&target).await?;

        if self.runs_locally(document.is_owner(&self.session)) {
            return self
                .store
                .async_delete(&self.session, &target, &options)
                .await
                .map(|d| d.id)
                .map_err(RouteError::Store);
        }

        match self
            .route(MutationRequest::Delete { target, options })
            .await?
        {
            MutationResponse::Deleted(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    /// Updates documents embedded in `parent`; each update carries `_id`.
    pub async fn update_embedded(
        &self,
        parent: impl Into<DocumentId>,
        kind: &str,
        updates: Vec<Value>,
        options: MutationOptions,
    ) -> Result<Vec<Document>, RouteError<S::Error>> {
        let parent = parent.into();
        let document = self.resolve(&parent).await?;

        if self.runs_locally(document.is_owner(&self.session)) {
            return self
                .store
                .async_update_embedded(&self.session, &parent, kind, &updates, &options)
                .await
                .map_err(RouteError::Store);
        }

        match self
            .route(MutationRequest::UpdateEmbedded {
                parent,
                kind: kind.to_string(),
                updates,
                options,
            })
            .await?
        {
            MutationResponse::Documents(ids) => self.resolve_all(&ids).await,
            other => Err(unexpected(other)),
        }
    }

    /// Creates a top-level document of `kind`.
    pub async fn create(&self, kind: &str, data: Value) -> Result<Document, RouteError<S::Error>> {
        if self.runs_locally(self.session.has_permission(Capability::create(kind))) {
            return self
                .store
                .async_create(&self.session, kind, &data)
                .await
                .map_err(RouteError::Store);
        }

        match self
            .route(MutationRequest::Create {
                kind: kind.to_string(),
                data,
            })
            .await?
        {
            MutationResponse::Document(id) => self.resolve(&id).await,
            other => Err(unexpected(other)),
        }
    }

    /// Creates documents of `kind` inside `parent`.
    pub async fn create_embedded(
        &self,
        parent: impl Into<DocumentId>,
        kind: &str,
        data: Vec<Value>,
        options: MutationOptions,
    ) -> Result<Vec<Document>, RouteError<S::Error>> {
        let parent = parent.into();
        self.resolve(&parent).await?;

        if self.runs_locally(self.session.has_permission(Capability::create(kind))) {
            return self
                .store
                .async_create_embedded(&self.session, &parent, kind, &data, &options)
                .await
                .map_err(RouteError::Store);
        }

        match self
            .route(MutationRequest::CreateEmbedded {
                parent,
                kind: kind.to_string(),
                data,
                options,
            })
            .await?
        {
            MutationResponse::Documents(ids) => self.resolve_all(&ids).await,
            other => Err(unexpected(other)),
        }
    }

    fn runs_locally(&self, privileged: bool) -> bool {
        privileged || !self.config.enabled
    }

    async fn resolve(&self, id: &DocumentId) -> Result<Document, RouteError<S::Error>> {
        self.store
            .async_get(id)
            .await
            .map_err(RouteError::Store)?
            .ok_or_else(|| RouteError::NotFound(id.clone()))
    }

    async fn resolve_all(&self, ids: &[DocumentId]) -> Result<Vec<Document>, RouteError<S::Error>> {
        let found = self.store.async_get_many(ids).await.map_err(RouteError::Store)?;
        ids.iter()
            .zip(found)
            .map(|(id, doc)| doc.ok_or_else(|| RouteError::NotFound(id.clone())))
            .collect()
    }

    async fn route(&self, request: MutationRequest) -> Result<MutationResponse, RouteError<S::Error>> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let op = request.op();
        debug!(request_id, op, responder = %self.responder, "routing mutation");

        let envelope = MutationEnvelope::new(request_id, request);
        let reply = tokio::time::timeout(
            self.config.timeout,
            self.channel.send_request(&self.responder, envelope),
        )
        .await;

        match reply {
            Ok(response) => Ok(response?),
            Err(_) => {
                warn!(request_id, op, responder = %self.responder, "routed mutation timed out");
                Err(RouteError::Timeout(self.config.timeout))
            }
        }
    }
}

fn unexpected<E>(response: MutationResponse) -> RouteError<E> {
    match response {
        MutationResponse::Rejected => RouteError::Rejected,
        MutationResponse::Error { message } => RouteError::Remote(message),
        _ => RouteError::UnexpectedResponse,
    }
}
