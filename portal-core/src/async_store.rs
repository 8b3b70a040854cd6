use std::future::Future;

use serde_json::Value;

use crate::{Document, DocumentId, DocumentStore, MutationOptions, Session};

/// Async document store.
///
/// Mirrors the `DocumentStore` trait but with async methods, so callers that
/// suspend on the network (the mutation router) can treat local and remote
/// stores alike. Methods are prefixed with `async_` to avoid name collisions
/// when a type implements both `DocumentStore` and `AsyncDocumentStore`.
pub trait AsyncDocumentStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn async_get(
        &self,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send;

    fn async_find_by_name(
        &self,
        kind: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send;

    fn async_embedded(
        &self,
        parent: &DocumentId,
        kind: &str,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send;

    fn async_update(
        &self,
        session: &Session,
        id: &DocumentId,
        data: &Value,
        options: &MutationOptions,
    ) -> impl Future<Output = Result<Document, Self::Error>> + Send;

    fn async_delete(
        &self,
        session: &Session,
        id: &DocumentId,
        options: &MutationOptions,
    ) -> impl Future<Output = Result<Document, Self::Error>> + Send;

    fn async_create(
        &self,
        session: &Session,
        kind: &str,
        data: &Value,
    ) -> impl Future<Output = Result<Document, Self::Error>> + Send;

    fn async_create_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        data: &[Value],
        options: &MutationOptions,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send;

    fn async_update_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        updates: &[Value],
        options: &MutationOptions,
    ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send;

    /// Resolves identifiers in order; default impl calls async_get() in sequence.
    fn async_get_many(
        &self,
        ids: &[DocumentId],
    ) -> impl Future<Output = Result<Vec<Option<Document>>, Self::Error>> + Send {
        let ids = ids.to_vec();
        async move {
            let mut results = Vec::with_capacity(ids.len());
            for id in &ids {
                results.push(self.async_get(id).await?);
            }
            Ok(results)
        }
    }
}

/// Blanket impl: any sync `DocumentStore` is also an `AsyncDocumentStore`.
impl<S: DocumentStore + Send + Sync> AsyncDocumentStore for S {
    type Error = S::Error;

    async fn async_get(&self, id: &DocumentId) -> Result<Option<Document>, Self::Error> {
        self.get(id)
    }

    async fn async_find_by_name(&self, kind: &str, name: &str) -> Result<Option<Document>, Self::Error> {
        self.find_by_name(kind, name)
    }

    async fn async_embedded(&self, parent: &DocumentId, kind: &str) -> Result<Vec<Document>, Self::Error> {
        self.embedded(parent, kind)
    }

    async fn async_update(
        &self,
        session: &Session,
        id: &DocumentId,
        data: &Value,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        self.update(session, id, data, options)
    }

    async fn async_delete(
        &self,
        session: &Session,
        id: &DocumentId,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        self.delete(session, id, options)
    }

    async fn async_create(&self, session: &Session, kind: &str, data: &Value) -> Result<Document, Self::Error> {
        self.create(session, kind, data)
    }

    async fn async_create_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        data: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        self.create_embedded(session, parent, kind, data, options)
    }

    async fn async_update_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        updates: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        self.update_embedded(session, parent, kind, updates, options)
    }
}
