//! The `Portal` builder: choose a point, then spawn creatures around it or
//! teleport a token onto it.

use std::collections::BTreeMap;

use portal_core::{
    merge_json, token_rect, AsyncDocumentStore, Document, DocumentId, Footprint, Grid,
    MutationOptions, Point, SceneSnapshot, Wall, ACTOR, TOKEN,
};
use portal_router::{PeerChannel, RouteError, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::animation::{Fade, TokenAnimator};
use crate::error::PortalError;
use crate::preview::{PositionPicker, TemplatePreview};
use crate::settings::Settings;

/// Where a creature's token data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatureSource {
    /// Copy of an existing token.
    Token(Document),
    /// An actor's prototype token.
    Actor(DocumentId),
    /// An actor identifier or, failing that, an actor name.
    Name(String),
}

impl From<&Document> for CreatureSource {
    fn from(document: &Document) -> Self {
        if document.kind == TOKEN {
            CreatureSource::Token(document.clone())
        } else {
            CreatureSource::Actor(document.id.clone())
        }
    }
}

impl From<&str> for CreatureSource {
    fn from(name: &str) -> Self {
        CreatureSource::Name(name.to_string())
    }
}

/// Changes applied around each spawned token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostSpawnUpdate {
    /// Merged into the token data before creation.
    pub token: Option<Value>,
    /// Merged into the token's actor after creation.
    pub actor: Option<Value>,
    /// Per embedded kind, updates keyed by document id or name.
    pub embedded: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    pub count: u32,
    pub update: Option<PostSpawnUpdate>,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            count: 1,
            update: None,
        }
    }
}

impl SpawnOptions {
    pub fn count(count: u32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_update(mut self, update: PostSpawnUpdate) -> Self {
        self.update = Some(update);
        self
    }
}

/// The scene a portal opens on.
#[derive(Debug, Clone)]
pub struct SceneContext<G> {
    pub scene: DocumentId,
    pub grid: G,
    /// Walls for collision tests; `None` when the host has no collision backend.
    pub walls: Option<Vec<Wall>>,
}

impl<G: Grid> SceneContext<G> {
    pub fn new(scene: impl Into<DocumentId>, grid: G) -> Self {
        Self {
            scene: scene.into(),
            grid,
            walls: None,
        }
    }

    pub fn with_walls(mut self, walls: Vec<Wall>) -> Self {
        self.walls = Some(walls);
        self
    }

    async fn snapshot<S: AsyncDocumentStore>(&self, store: &S) -> Result<SceneSnapshot, S::Error> {
        let tokens = store.async_embedded(&self.scene, TOKEN).await?;
        let snapshot = SceneSnapshot::from_tokens(&self.grid, &tokens);
        Ok(match &self.walls {
            Some(walls) => snapshot.with_walls(walls.clone()),
            None => snapshot,
        })
    }
}

#[derive(Debug, Clone)]
struct Creature {
    source: CreatureSource,
    options: SpawnOptions,
}

/// Builder for placing creatures or moving a token via a picked point.
///
/// Setters that receive unusable values log a warning and leave the portal
/// unchanged, so a chain of calls never fails halfway.
#[derive(Debug, Clone)]
pub struct Portal {
    settings: Settings,
    creatures: Vec<Creature>,
    resolved: Option<Vec<Value>>,
    origin: Option<Point>,
    teleport_target: Option<Document>,
    distance: Option<f64>,
    color: Option<String>,
    range: Option<f64>,
    texture: String,
    picked: Option<Point>,
}

impl Default for Portal {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Portal {
    pub fn new(settings: Settings) -> Self {
        let texture = settings.preview.texture.clone();
        Self {
            settings,
            creatures: Vec::new(),
            resolved: None,
            origin: None,
            teleport_target: None,
            distance: None,
            color: None,
            range: None,
            texture,
            picked: None,
        }
    }

    pub fn add_creature(mut self, source: impl Into<CreatureSource>, options: SpawnOptions) -> Self {
        self.creatures.push(Creature {
            source: source.into(),
            options,
        });
        self.resolved = None;
        self
    }

    pub fn origin(mut self, origin: Point) -> Self {
        if origin.is_finite() {
            self.origin = Some(origin);
        } else {
            warn!(x = origin.x, y = origin.y, "invalid origin");
        }
        self
    }

    /// Opens the portal around a placed token, which also becomes the
    /// teleport target.
    pub fn origin_token<G: Grid + ?Sized>(mut self, grid: &G, token: &Document) -> Self {
        self.teleport_target = Some(token.clone());
        match token_rect(grid, token) {
            Some(rect) => {
                let elevation = token.data.get("elevation").and_then(Value::as_f64);
                self.origin = Some(rect.center().with_elevation(elevation));
            }
            None => warn!(token = %token.id, "invalid origin"),
        }
        self
    }

    /// Preview diameter in scene distance units.
    pub fn size(mut self, distance: f64) -> Self {
        if distance.is_finite() {
            self.distance = Some(distance);
        } else {
            warn!(distance, "invalid number");
        }
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Maximum distance from the origin, in scene units, a pick may land at.
    pub fn range(mut self, range: f64) -> Self {
        if range.is_finite() {
            self.range = Some(range);
        } else {
            warn!(range, "invalid number");
        }
        self
    }

    pub fn texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = texture.into();
        self
    }

    pub fn origin_point(&self) -> Option<&Point> {
        self.origin.as_ref()
    }

    /// The point chosen by the last successful pick.
    pub fn picked(&self) -> Option<&Point> {
        self.picked.as_ref()
    }

    pub fn teleport_target(&self) -> Option<&Document> {
        self.teleport_target.as_ref()
    }

    /// Asks the user for a point, re-asking while picks fall out of range.
    ///
    /// Returns `None` when the user cancels.
    pub async fn pick<S, C, G, P>(
        &mut self,
        router: &Router<S, C>,
        grid: &G,
        picker: &P,
    ) -> Result<Option<Point>, PortalError<S::Error>>
    where
        S: AsyncDocumentStore,
        C: PeerChannel,
        G: Grid + ?Sized,
        P: PositionPicker,
    {
        self.prepare(router.store(), grid).await?;
        let preview = self.preview(grid);

        loop {
            let Some(raw) = picker.pick(&preview).await else {
                debug!("pick cancelled");
                return Ok(None);
            };
            let point = grid.top_left_of(&raw);

            if !preview.in_range(grid, &point) {
                warn!(x = point.x, y = point.y, range = ?preview.range, "out of range");
                continue;
            }

            let elevation = self.origin.and_then(|o| o.elevation).or(raw.elevation);
            let point = point.with_elevation(elevation);
            self.picked = Some(point);
            return Ok(Some(point));
        }
    }

    /// Places every added creature `count` times around the picked point,
    /// picking first if needed.
    ///
    /// Returns the created tokens, or `None` when the pick was cancelled.
    #[instrument(skip_all, fields(scene = %scene.scene))]
    pub async fn spawn<S, C, G, P>(
        &mut self,
        router: &Router<S, C>,
        scene: &SceneContext<G>,
        picker: &P,
    ) -> Result<Option<Vec<Document>>, PortalError<S::Error>>
    where
        S: AsyncDocumentStore,
        C: PeerChannel,
        G: Grid,
        P: PositionPicker,
    {
        self.prepare(router.store(), &scene.grid).await?;
        let origin = match self.picked {
            Some(point) => point,
            None => match self.pick(router, &scene.grid, picker).await? {
                Some(point) => point,
                None => return Ok(None),
            },
        };

        let search = self.settings.placement_search();
        let collision = self.settings.placement.collision;
        let resolved = self.resolved.clone().unwrap_or_default();
        let mut spawned = Vec::new();

        for (creature, token_data) in self.creatures.iter().zip(resolved) {
            let footprint = footprint_of(&token_data);

            for _ in 0..creature.options.count {
                // Re-read the scene so earlier spawns count as occupants.
                let snapshot = scene
                    .snapshot(router.store())
                    .await
                    .map_err(RouteError::Store)?;

                let position = search
                    .find(&scene.grid, &snapshot, footprint, &origin, collision)
                    .ok_or_else(|| PortalError::NoFreePosition(describe(&token_data)))?;

                let mut data = token_data.clone();
                merge_json(&mut data, &position_patch(&position));

                let token = router
                    .create_embedded(&scene.scene, TOKEN, vec![data], MutationOptions::new())
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(RouteError::<S::Error>::UnexpectedResponse)?;
                debug!(token = %token.id, x = position.x, y = position.y, "spawned");

                if let Some(update) = &creature.options.update {
                    apply_post_spawn(router, &token, update).await?;
                }
                spawned.push(token);
            }
        }

        Ok(Some(spawned))
    }

    /// Moves the teleport target onto the picked point, fading it out and back
    /// in around the move.
    ///
    /// Returns the moved token, or `None` when the pick was cancelled.
    #[instrument(skip_all)]
    pub async fn teleport<S, C, G, P, A>(
        &mut self,
        router: &Router<S, C>,
        grid: &G,
        picker: &P,
        animator: &A,
    ) -> Result<Option<Document>, PortalError<S::Error>>
    where
        S: AsyncDocumentStore,
        C: PeerChannel,
        G: Grid + ?Sized,
        P: PositionPicker,
        A: TokenAnimator,
    {
        let target = self
            .teleport_target
            .clone()
            .ok_or(PortalError::NoTeleportTarget)?;

        let position = match self.picked {
            Some(point) => point,
            None => match self.pick(router, grid, picker).await? {
                Some(point) => point,
                None => return Ok(None),
            },
        };

        let fade = self.settings.fade_duration();
        let alpha = animator.alpha(&target.id);
        animator.animate(&target.id, Fade::out(fade)).await;

        let moved = router
            .update(
                &target.id,
                position_patch(&position),
                MutationOptions::new().with("animate", false),
            )
            .await;

        animator.animate(&target.id, Fade::back_in(alpha, fade)).await;

        let moved = moved?;
        debug!(token = %moved.id, x = position.x, y = position.y, "teleported");
        Ok(Some(moved))
    }

    fn preview<G: Grid + ?Sized>(&self, grid: &G) -> TemplatePreview {
        TemplatePreview {
            distance: self.distance.unwrap_or_else(|| grid.distance()),
            color: self
                .color
                .clone()
                .unwrap_or_else(|| self.settings.preview.color.clone()),
            texture: self.texture.clone(),
            origin: self.origin,
            range: self.range,
        }
    }

    /// Resolves creature sources to token data and fills in the preview size.
    async fn prepare<S, G>(&mut self, store: &S, grid: &G) -> Result<(), PortalError<S::Error>>
    where
        S: AsyncDocumentStore,
        G: Grid + ?Sized,
    {
        if self.resolved.is_some() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(self.creatures.len());
        for creature in &self.creatures {
            let mut data = resolve_source(store, &creature.source)
                .await
                .map_err(RouteError::Store)?
                .ok_or_else(|| PortalError::NoTokenData(format!("{:?}", creature.source)))?;

            if let Some(patch) = creature.options.update.as_ref().and_then(|u| u.token.as_ref()) {
                merge_json(&mut data, patch);
            }
            resolved.push(data);
        }

        if self.distance.is_none() {
            let footprint = resolved
                .first()
                .or(self.teleport_target.as_ref().map(|t| &t.data))
                .map(footprint_of)
                .unwrap_or_default();
            self.distance = Some(footprint.extent() as f64 * grid.distance());
        }

        self.resolved = Some(resolved);
        Ok(())
    }
}

async fn resolve_source<S: AsyncDocumentStore>(
    store: &S,
    source: &CreatureSource,
) -> Result<Option<Value>, S::Error> {
    let actor = match source {
        CreatureSource::Token(token) => return Ok(Some(token.data.clone())),
        CreatureSource::Actor(id) => store.async_get(id).await?,
        CreatureSource::Name(name) => {
            let by_id = DocumentId::from(name.as_str());
            match store.async_get(&by_id).await? {
                Some(doc) => Some(doc),
                None => store.async_find_by_name(ACTOR, name).await?,
            }
        }
    };

    Ok(actor.map(|actor| prototype_token(&actor)))
}

/// Token data for a fresh token of `actor`.
fn prototype_token(actor: &Document) -> Value {
    let mut data = actor
        .data
        .get("prototypeToken")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));

    if let Value::Object(map) = &mut data {
        map.insert("actorId".to_string(), Value::from(actor.id.local()));
        if let Some(name) = actor.name() {
            map.entry("name").or_insert_with(|| Value::from(name));
        }
    }
    data
}

fn footprint_of(token: &Value) -> Footprint {
    let cells = |key: &str| {
        let value = token.get(key).and_then(Value::as_f64).unwrap_or(1.0);
        value.ceil().max(1.0) as u32
    };
    Footprint::new(cells("width"), cells("height"))
}

fn describe(token: &Value) -> String {
    token
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("token")
        .to_string()
}

fn position_patch(position: &Point) -> Value {
    let mut patch = Map::new();
    patch.insert("x".to_string(), Value::from(position.x));
    patch.insert("y".to_string(), Value::from(position.y));
    if let Some(elevation) = position.elevation {
        patch.insert("elevation".to_string(), Value::from(elevation));
    }
    Value::Object(patch)
}

async fn apply_post_spawn<S, C>(
    router: &Router<S, C>,
    token: &Document,
    update: &PostSpawnUpdate,
) -> Result<(), PortalError<S::Error>>
where
    S: AsyncDocumentStore,
    C: PeerChannel,
{
    let Some(actor_id) = token.data.get("actorId").and_then(Value::as_str) else {
        return Ok(());
    };
    let actor = DocumentId::new(ACTOR, actor_id);
    if router
        .store()
        .async_get(&actor)
        .await
        .map_err(RouteError::Store)?
        .is_none()
    {
        return Ok(());
    }

    if let Some(data) = &update.actor {
        router
            .update(&actor, data.clone(), MutationOptions::new())
            .await?;
    }

    for (kind, entries) in &update.embedded {
        let documents = router
            .store()
            .async_embedded(&actor, kind)
            .await
            .map_err(RouteError::Store)?;

        let updates: Vec<Value> = documents
            .iter()
            .filter_map(|doc| {
                let patch = entries
                    .get(doc.id.local())
                    .or_else(|| doc.name().and_then(|name| entries.get(name)))?;
                let mut patch = patch.as_object()?.clone();
                patch.insert("_id".to_string(), Value::from(doc.id.local()));
                Some(Value::Object(patch))
            })
            .collect();

        if !updates.is_empty() {
            router
                .update_embedded(&actor, kind, updates, MutationOptions::new())
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_rounds_partial_cells_up() {
        assert_eq!(footprint_of(&json!({})), Footprint::UNIT);
        assert_eq!(footprint_of(&json!({"width": 2, "height": 3})), Footprint::new(2, 3));
        assert_eq!(footprint_of(&json!({"width": 0.5, "height": 1.5})), Footprint::new(1, 2));
    }

    #[test]
    fn prototype_token_links_actor() {
        let actor = Document::new(
            DocumentId::new(ACTOR, "a1"),
            ACTOR,
            json!({"name": "Wolf", "prototypeToken": {"width": 2, "texture": "wolf.png"}}),
        );
        let data = prototype_token(&actor);
        assert_eq!(data["actorId"], json!("a1"));
        assert_eq!(data["name"], json!("Wolf"));
        assert_eq!(data["width"], json!(2));
    }

    #[test]
    fn position_patch_omits_missing_elevation() {
        assert_eq!(position_patch(&Point::new(100.0, 200.0)), json!({"x": 100.0, "y": 200.0}));
        assert_eq!(
            position_patch(&Point::new(0.0, 0.0).with_elevation(Some(10.0))),
            json!({"x": 0.0, "y": 0.0, "elevation": 10.0})
        );
    }

    #[test]
    fn invalid_setters_are_ignored() {
        let portal = Portal::default()
            .origin(Point::new(f64::NAN, 0.0))
            .size(f64::INFINITY)
            .range(f64::NAN);
        assert!(portal.origin_point().is_none());
        assert!(portal.distance.is_none());
        assert!(portal.range.is_none());
    }

    #[test]
    fn source_from_document_picks_kind() {
        let token = Document::new(DocumentId::from("Scene.s.Token.t"), TOKEN, json!({}));
        let actor = Document::new(DocumentId::new(ACTOR, "a"), ACTOR, json!({}));
        assert!(matches!(CreatureSource::from(&token), CreatureSource::Token(_)));
        assert_eq!(CreatureSource::from(&actor), CreatureSource::Actor(actor.id.clone()));
    }
}
