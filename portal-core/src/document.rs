use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ACTOR: &str = "Actor";
pub const SCENE: &str = "Scene";
pub const TOKEN: &str = "Token";
pub const ITEM: &str = "Item";

/// Canonical document identifier.
///
/// Identifiers are dotted `Kind.local` pairs; embedded documents append their
/// own pair to the parent's, e.g. `Scene.s1.Token.t4`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(kind: &str, local: &str) -> Self {
        DocumentId(format!("{kind}.{local}"))
    }

    /// Identifier of a document embedded in this one.
    pub fn embedded(&self, kind: &str, local: &str) -> Self {
        DocumentId(format!("{}.{kind}.{local}", self.0))
    }

    /// Document kind (the second to last segment).
    pub fn kind(&self) -> &str {
        let mut parts = self.0.rsplitn(3, '.');
        parts.next();
        parts.next().unwrap_or("")
    }

    /// Last segment.
    pub fn local(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or("")
    }

    /// Identifier of the containing document, for embedded documents.
    pub fn parent(&self) -> Option<DocumentId> {
        let mut parts = self.0.rsplitn(3, '.');
        parts.next();
        parts.next();
        parts.next().map(|p| DocumentId(p.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        DocumentId(value)
    }
}

impl From<&DocumentId> for DocumentId {
    fn from(value: &DocumentId) -> Self {
        value.clone()
    }
}

impl From<&Document> for DocumentId {
    fn from(value: &Document) -> Self {
        value.id.clone()
    }
}

pub type UserId = String;

/// Permission tier of a user in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Player,
    Trusted,
    Assistant,
    Gamemaster,
}

impl Role {
    /// Assistants and gamemasters own every document.
    pub fn is_privileged(self) -> bool {
        self >= Role::Assistant
    }
}

/// Actions gated by role rather than by document ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ActorCreate,
    TokenCreate,
    DocumentCreate,
}

impl Capability {
    /// The capability needed to create a document of `kind`.
    pub fn create(kind: &str) -> Self {
        match kind {
            ACTOR => Capability::ActorCreate,
            TOKEN => Capability::TokenCreate,
            _ => Capability::DocumentCreate,
        }
    }

    pub fn min_role(self) -> Role {
        match self {
            Capability::ActorCreate | Capability::TokenCreate | Capability::DocumentCreate => {
                Role::Assistant
            }
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserId,
    pub role: Role,
}

impl Session {
    pub fn new(user: impl Into<UserId>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }

    pub fn has_permission(&self, capability: Capability) -> bool {
        self.role >= capability.min_role()
    }
}

/// A document as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: String,
    #[serde(default)]
    pub owners: BTreeSet<UserId>,
    pub data: Value,
}

impl Document {
    pub fn new(id: DocumentId, kind: impl Into<String>, data: Value) -> Self {
        Self {
            id,
            kind: kind.into(),
            owners: BTreeSet::new(),
            data,
        }
    }

    pub fn with_owner(mut self, user: impl Into<UserId>) -> Self {
        self.owners.insert(user.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    pub fn is_owner(&self, session: &Session) -> bool {
        session.role.is_privileged() || self.owners.contains(&session.user)
    }
}

/// Free-form options forwarded to the store with a mutation (e.g. `animate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationOptions(pub Map<String, Value>);

impl MutationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Recursively merges `patch` into `target`.
///
/// Objects merge key by key; anything else in `patch` replaces the target
/// value. A `null` in the patch removes the key.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                    continue;
                }
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn id_segments() {
        let id = DocumentId::from("Scene.s1.Token.t4");
        assert_eq!(id.kind(), "Token");
        assert_eq!(id.local(), "t4");
        assert_eq!(id.parent(), Some(DocumentId::from("Scene.s1")));
        assert_eq!(DocumentId::from("Actor.a1").parent(), None);
        assert_eq!(DocumentId::from("Actor.a1").kind(), "Actor");
    }

    #[test]
    fn embedded_id() {
        let scene = DocumentId::new(SCENE, "s1");
        assert_eq!(scene.embedded(TOKEN, "t1").as_str(), "Scene.s1.Token.t1");
    }

    #[test]
    fn gamemaster_owns_everything() {
        let doc = Document::new(DocumentId::from("Actor.a"), ACTOR, json!({}));
        assert!(doc.is_owner(&Session::new("gm", Role::Gamemaster)));
        assert!(!doc.is_owner(&Session::new("p", Role::Player)));
        let doc = doc.with_owner("p");
        assert!(doc.is_owner(&Session::new("p", Role::Player)));
    }

    #[test]
    fn creation_needs_assistant() {
        assert!(!Session::new("t", Role::Trusted).has_permission(Capability::create(TOKEN)));
        assert!(Session::new("a", Role::Assistant).has_permission(Capability::create(ACTOR)));
    }

    #[test]
    fn merge_is_deep() {
        let mut target = json!({"name": "Goblin", "system": {"hp": 7, "ac": 15}});
        merge_json(&mut target, &json!({"system": {"hp": 3}, "img": "g.png"}));
        assert_eq!(
            target,
            json!({"name": "Goblin", "system": {"hp": 3, "ac": 15}, "img": "g.png"})
        );
    }

    #[test]
    fn merge_null_removes_key() {
        let mut target = json!({"flags": {"portal": {"original": 1}, "other": 2}});
        merge_json(&mut target, &json!({"flags": {"portal": null}}));
        assert_eq!(target, json!({"flags": {"other": 2}}));
    }
}
