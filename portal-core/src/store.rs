use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;

use crate::document::merge_json;
use crate::{Capability, Document, DocumentId, MutationOptions, Session};

/// Document database as seen by one client.
///
/// Reads are unrestricted; every mutation runs on behalf of a [`Session`] and
/// is refused when that session lacks ownership or the needed capability.
///
/// All methods take `&self` to support stores with internal locking.
pub trait DocumentStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieves a document, or None if it does not exist.
    fn get(&self, id: &DocumentId) -> Result<Option<Document>, Self::Error>;

    /// First document of `kind` whose `name` matches.
    fn find_by_name(&self, kind: &str, name: &str) -> Result<Option<Document>, Self::Error>;

    /// Documents of `kind` embedded directly in `parent`.
    fn embedded(&self, parent: &DocumentId, kind: &str) -> Result<Vec<Document>, Self::Error>;

    /// Merges `data` into the document and returns the updated document.
    fn update(
        &self,
        session: &Session,
        id: &DocumentId,
        data: &Value,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error>;

    /// Removes the document and everything embedded in it.
    fn delete(
        &self,
        session: &Session,
        id: &DocumentId,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error>;

    /// Creates a top-level document of `kind`.
    fn create(&self, session: &Session, kind: &str, data: &Value) -> Result<Document, Self::Error>;

    /// Creates documents of `kind` inside `parent`, in order.
    fn create_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        data: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error>;

    /// Applies updates to embedded documents; each update names its target
    /// by local id in `_id`.
    fn update_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        updates: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    type Error = S::Error;

    fn get(&self, id: &DocumentId) -> Result<Option<Document>, Self::Error> {
        (**self).get(id)
    }

    fn find_by_name(&self, kind: &str, name: &str) -> Result<Option<Document>, Self::Error> {
        (**self).find_by_name(kind, name)
    }

    fn embedded(&self, parent: &DocumentId, kind: &str) -> Result<Vec<Document>, Self::Error> {
        (**self).embedded(parent, kind)
    }

    fn update(
        &self,
        session: &Session,
        id: &DocumentId,
        data: &Value,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        (**self).update(session, id, data, options)
    }

    fn delete(
        &self,
        session: &Session,
        id: &DocumentId,
        options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        (**self).delete(session, id, options)
    }

    fn create(&self, session: &Session, kind: &str, data: &Value) -> Result<Document, Self::Error> {
        (**self).create(session, kind, data)
    }

    fn create_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        data: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        (**self).create_embedded(session, parent, kind, data, options)
    }

    fn update_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        updates: &[Value],
        options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        (**self).update_embedded(session, parent, kind, updates, options)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(DocumentId),
    #[error("{user} may not modify {target}")]
    PermissionDenied { user: String, target: String },
    #[error("invalid document data: {0}")]
    InvalidData(String),
}

/// An in-memory document store.
///
/// Useful for testing and as a reference implementation. Local ids are
/// allocated from a counter, so creation order is reproducible.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<DocumentId, Document>>,
    next_id: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document as-is, bypassing permission checks.
    pub fn insert(&self, document: Document) {
        self.documents
            .write()
            .unwrap()
            .insert(document.id.clone(), document);
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_local(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{n:016x}")
    }

    fn require_owner(session: &Session, document: &Document) -> Result<(), DocumentError> {
        if document.is_owner(session) {
            Ok(())
        } else {
            Err(DocumentError::PermissionDenied {
                user: session.user.clone(),
                target: document.id.to_string(),
            })
        }
    }

    fn require_capability(session: &Session, kind: &str) -> Result<(), DocumentError> {
        if session.has_permission(Capability::create(kind)) {
            Ok(())
        } else {
            Err(DocumentError::PermissionDenied {
                user: session.user.clone(),
                target: format!("new {kind}"),
            })
        }
    }
}

/// Strips `_id` from creation/update payloads; identifiers are store-owned.
fn without_id(data: &Value) -> Result<Value, DocumentError> {
    match data {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("_id");
            Ok(Value::Object(map))
        }
        other => Err(DocumentError::InvalidData(format!(
            "expected an object, got {other}"
        ))),
    }
}

impl DocumentStore for MemoryDocumentStore {
    type Error = DocumentError;

    fn get(&self, id: &DocumentId) -> Result<Option<Document>, Self::Error> {
        Ok(self.documents.read().unwrap().get(id).cloned())
    }

    fn find_by_name(&self, kind: &str, name: &str) -> Result<Option<Document>, Self::Error> {
        Ok(self
            .documents
            .read()
            .unwrap()
            .values()
            .find(|d| d.kind == kind && d.id.parent().is_none() && d.name() == Some(name))
            .cloned())
    }

    fn embedded(&self, parent: &DocumentId, kind: &str) -> Result<Vec<Document>, Self::Error> {
        Ok(self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|d| d.kind == kind && d.id.parent().as_ref() == Some(parent))
            .cloned()
            .collect())
    }

    fn update(
        &self,
        session: &Session,
        id: &DocumentId,
        data: &Value,
        _options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        let patch = without_id(data)?;
        let mut documents = self.documents.write().unwrap();
        let document = documents
            .get_mut(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        Self::require_owner(session, document)?;
        merge_json(&mut document.data, &patch);
        Ok(document.clone())
    }

    fn delete(
        &self,
        session: &Session,
        id: &DocumentId,
        _options: &MutationOptions,
    ) -> Result<Document, Self::Error> {
        let mut documents = self.documents.write().unwrap();
        let document = documents
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        Self::require_owner(session, document)?;

        let prefix = format!("{id}.");
        documents.retain(|key, _| !key.as_str().starts_with(&prefix));
        documents
            .remove(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))
    }

    fn create(&self, session: &Session, kind: &str, data: &Value) -> Result<Document, Self::Error> {
        Self::require_capability(session, kind)?;
        let data = without_id(data)?;
        let id = DocumentId::new(kind, &self.allocate_local());
        let document = Document::new(id.clone(), kind, data).with_owner(session.user.clone());
        self.documents.write().unwrap().insert(id, document.clone());
        Ok(document)
    }

    fn create_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        data: &[Value],
        _options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        Self::require_capability(session, kind)?;
        let payloads = data.iter().map(without_id).collect::<Result<Vec<_>, _>>()?;

        let mut documents = self.documents.write().unwrap();
        let owners = documents
            .get(parent)
            .ok_or_else(|| DocumentError::NotFound(parent.clone()))?
            .owners
            .clone();

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let id = parent.embedded(kind, &self.allocate_local());
            let mut document = Document::new(id.clone(), kind, payload);
            document.owners = owners.clone();
            documents.insert(id, document.clone());
            created.push(document);
        }
        Ok(created)
    }

    fn update_embedded(
        &self,
        session: &Session,
        parent: &DocumentId,
        kind: &str,
        updates: &[Value],
        _options: &MutationOptions,
    ) -> Result<Vec<Document>, Self::Error> {
        let mut documents = self.documents.write().unwrap();
        let parent_doc = documents
            .get(parent)
            .ok_or_else(|| DocumentError::NotFound(parent.clone()))?;
        Self::require_owner(session, parent_doc)?;

        // Validate everything before touching anything.
        let mut targets = Vec::with_capacity(updates.len());
        for update in updates {
            let local = update
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| DocumentError::InvalidData("embedded update without _id".into()))?;
            let id = parent.embedded(kind, local);
            if !documents.contains_key(&id) {
                return Err(DocumentError::NotFound(id));
            }
            targets.push((id, without_id(update)?));
        }

        let mut updated = Vec::with_capacity(targets.len());
        for (id, patch) in targets {
            if let Some(document) = documents.get_mut(&id) {
                merge_json(&mut document.data, &patch);
                updated.push(document.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Role, ACTOR, SCENE, TOKEN};

    fn gm() -> Session {
        Session::new("gm", Role::Gamemaster)
    }

    fn player() -> Session {
        Session::new("alice", Role::Player)
    }

    #[test]
    fn create_then_get() {
        let store = MemoryDocumentStore::new();
        let actor = store.create(&gm(), ACTOR, &json!({"name": "Aboleth"})).unwrap();

        assert_eq!(actor.id.kind(), ACTOR);
        assert_eq!(store.get(&actor.id).unwrap(), Some(actor.clone()));
        assert!(actor.owners.contains("gm"));
    }

    #[test]
    fn player_cannot_create_actor() {
        let store = MemoryDocumentStore::new();
        let err = store.create(&player(), ACTOR, &json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, DocumentError::PermissionDenied { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn update_requires_ownership() {
        let store = MemoryDocumentStore::new();
        let actor = store.create(&gm(), ACTOR, &json!({"name": "Goblin"})).unwrap();

        let err = store
            .update(&player(), &actor.id, &json!({"name": "Hobgoblin"}), &MutationOptions::new())
            .unwrap_err();
        assert!(matches!(err, DocumentError::PermissionDenied { .. }));

        store.insert(actor.clone().with_owner("alice"));
        let updated = store
            .update(&player(), &actor.id, &json!({"name": "Hobgoblin"}), &MutationOptions::new())
            .unwrap();
        assert_eq!(updated.name(), Some("Hobgoblin"));
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = MemoryDocumentStore::new();
        let id = DocumentId::from("Actor.nope");
        let err = store
            .update(&gm(), &id, &json!({}), &MutationOptions::new())
            .unwrap_err();
        assert_eq!(err, DocumentError::NotFound(id));
    }

    #[test]
    fn embedded_lifecycle() {
        let store = MemoryDocumentStore::new();
        let scene = store.create(&gm(), SCENE, &json!({"name": "Cave"})).unwrap();
        let tokens = store
            .create_embedded(
                &gm(),
                &scene.id,
                TOKEN,
                &[json!({"x": 0, "y": 0}), json!({"x": 100, "y": 0})],
                &MutationOptions::new(),
            )
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(store.embedded(&scene.id, TOKEN).unwrap().len(), 2);

        let updated = store
            .update_embedded(
                &gm(),
                &scene.id,
                TOKEN,
                &[json!({"_id": tokens[1].id.local(), "x": 300})],
                &MutationOptions::new(),
            )
            .unwrap();
        assert_eq!(updated[0].data["x"], json!(300));

        store.delete(&gm(), &scene.id, &MutationOptions::new()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn embedded_update_is_all_or_nothing() {
        let store = MemoryDocumentStore::new();
        let scene = store.create(&gm(), SCENE, &json!({})).unwrap();
        let token = store
            .create_embedded(&gm(), &scene.id, TOKEN, &[json!({"x": 0})], &MutationOptions::new())
            .unwrap()
            .remove(0);

        let err = store
            .update_embedded(
                &gm(),
                &scene.id,
                TOKEN,
                &[json!({"_id": token.id.local(), "x": 5}), json!({"_id": "missing", "x": 9})],
                &MutationOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
        assert_eq!(store.get(&token.id).unwrap().unwrap().data["x"], json!(0));
    }

    #[test]
    fn find_by_name_ignores_embedded() {
        let store = MemoryDocumentStore::new();
        let actor = store.create(&gm(), ACTOR, &json!({"name": "Wolf"})).unwrap();
        store
            .create_embedded(&gm(), &actor.id, crate::ITEM, &[json!({"name": "Wolf"})], &MutationOptions::new())
            .unwrap();
        let found = store.find_by_name(ACTOR, "Wolf").unwrap().unwrap();
        assert_eq!(found.id, actor.id);
        assert!(store.find_by_name(ACTOR, "Bear").unwrap().is_none());
    }
}
