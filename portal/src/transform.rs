//! Temporary statblock transformation of an actor into another actor.
//!
//! The transformed actor keeps its identity; only `name`, `img` and `system`
//! change. The replaced values are stashed on the actor itself under
//! `flags.portal.original`, so a revert works from any client.

use portal_core::{AsyncDocumentStore, Document, DocumentId, MutationOptions};
use portal_router::{PeerChannel, RouteError, Router};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::PortalError;

const STASHED: [&str; 3] = ["name", "img", "system"];

/// The stash left by [`transform`], if `actor` is transformed.
pub fn original_of(actor: &Document) -> Option<&Value> {
    actor
        .data
        .pointer("/flags/portal/original")
        .filter(|v| v.is_object())
}

pub fn is_transformed(actor: &Document) -> bool {
    original_of(actor).is_some()
}

/// Gives `actor` the statblock of `source`.
///
/// Transforming an already transformed actor keeps the first stash, so a
/// single revert always returns to the pre-transformation state.
pub async fn transform<S, C>(
    router: &Router<S, C>,
    actor: impl Into<DocumentId>,
    source: impl Into<DocumentId>,
) -> Result<Document, PortalError<S::Error>>
where
    S: AsyncDocumentStore,
    C: PeerChannel,
{
    let actor = load(router, actor.into()).await?;
    let source = load(router, source.into()).await?;

    let mut patch = statblock_patch(&actor.data, &source.data);
    if !is_transformed(&actor) {
        let original: Map<String, Value> = STASHED
            .iter()
            .filter_map(|key| Some((key.to_string(), actor.data.get(*key)?.clone())))
            .collect();
        patch["flags"] = json!({ "portal": { "original": original } });
    }

    debug!(actor = %actor.id, source = %source.id, "transforming");
    Ok(router.update(&actor.id, patch, MutationOptions::new()).await?)
}

/// Restores the statblock stashed by [`transform`] and clears the stash.
pub async fn revert<S, C>(
    router: &Router<S, C>,
    actor: impl Into<DocumentId>,
) -> Result<Document, PortalError<S::Error>>
where
    S: AsyncDocumentStore,
    C: PeerChannel,
{
    let actor = load(router, actor.into()).await?;
    let original = original_of(&actor)
        .cloned()
        .ok_or_else(|| PortalError::NotTransformed(actor.id.clone()))?;

    let mut patch = statblock_patch(&actor.data, &original);
    patch["flags"] = json!({ "portal": { "original": null } });

    debug!(actor = %actor.id, "reverting");
    Ok(router.update(&actor.id, patch, MutationOptions::new()).await?)
}

async fn load<S, C>(router: &Router<S, C>, id: DocumentId) -> Result<Document, PortalError<S::Error>>
where
    S: AsyncDocumentStore,
    C: PeerChannel,
{
    router
        .store()
        .async_get(&id)
        .await
        .map_err(RouteError::Store)?
        .ok_or_else(|| RouteError::<S::Error>::NotFound(id).into())
}

/// Patch that makes the statblock keys of `current` equal to those of `target`.
fn statblock_patch(current: &Value, target: &Value) -> Value {
    let mut patch = Map::new();
    for key in STASHED {
        let value = match (current.get(key), target.get(key)) {
            (Some(old), Some(new)) => replacement(old, new),
            (Some(_), None) => Value::Null,
            (None, Some(new)) => new.clone(),
            (None, None) => continue,
        };
        patch.insert(key.to_string(), value);
    }
    Value::Object(patch)
}

/// Merge patch turning `old` into `new`: keys only in `old` are nulled out.
fn replacement(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            let mut patch = Map::new();
            for key in old.keys().filter(|k| !new.contains_key(*k)) {
                patch.insert(key.clone(), Value::Null);
            }
            for (key, value) in new {
                let value = match old.get(key) {
                    Some(previous) => replacement(previous, value),
                    None => value.clone(),
                };
                patch.insert(key.clone(), value);
            }
            Value::Object(patch)
        }
        (_, new) => new.clone(),
    }
}
