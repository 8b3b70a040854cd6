//! Picking, spawning and teleporting against an in-memory world.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portal::settings::PlacementSettings;
use portal::{
    Fade, Portal, PortalError, PositionPicker, PostSpawnUpdate, SceneContext, Settings,
    SpawnOptions, TemplatePreview, TokenAnimator,
};
use portal_core::{
    Document, DocumentId, DocumentStore, MemoryDocumentStore, MutationOptions, Point, Role,
    Session, SquareGrid, Wall, ACTOR, ITEM, SCENE, TOKEN,
};
use portal_router::{LoopbackChannel, Router};
use serde_json::{json, Map};

type TestRouter = Router<Arc<MemoryDocumentStore>, LoopbackChannel<Arc<MemoryDocumentStore>>>;

/// Answers picks from a script and remembers what it was shown.
#[derive(Default)]
struct ScriptedPicker {
    picks: Mutex<VecDeque<Option<Point>>>,
    previews: Mutex<Vec<TemplatePreview>>,
}

impl ScriptedPicker {
    fn new(picks: impl IntoIterator<Item = Option<Point>>) -> Self {
        Self {
            picks: Mutex::new(picks.into_iter().collect()),
            previews: Mutex::default(),
        }
    }

    fn shown(&self) -> Vec<TemplatePreview> {
        self.previews.lock().unwrap().clone()
    }
}

impl PositionPicker for ScriptedPicker {
    async fn pick(&self, preview: &TemplatePreview) -> Option<Point> {
        self.previews.lock().unwrap().push(preview.clone());
        self.picks.lock().unwrap().pop_front().flatten()
    }
}

#[derive(Default)]
struct RecordingAnimator {
    fades: Mutex<Vec<(DocumentId, Fade)>>,
}

impl TokenAnimator for RecordingAnimator {
    fn alpha(&self, _token: &DocumentId) -> f64 {
        0.8
    }

    async fn animate(&self, token: &DocumentId, fade: Fade) {
        self.fades.lock().unwrap().push((token.clone(), fade));
    }
}

fn gm() -> Session {
    Session::new("gm", Role::Gamemaster)
}

fn player() -> Session {
    Session::new("alice", Role::Player)
}

struct World {
    store: Arc<MemoryDocumentStore>,
    scene: Document,
    wolf: Document,
}

fn world() -> World {
    let store = Arc::new(MemoryDocumentStore::new());
    let scene = store.create(&gm(), SCENE, &json!({"name": "Forest"})).unwrap();
    let wolf = store
        .create(
            &gm(),
            ACTOR,
            &json!({"name": "Wolf", "system": {"hp": 11}, "prototypeToken": {"name": "Wolf", "width": 1, "height": 1}}),
        )
        .unwrap();
    store
        .create_embedded(&gm(), &wolf.id, ITEM, &[json!({"name": "Bite", "damage": "2d4"})], &MutationOptions::new())
        .unwrap();
    World { store, scene, wolf }
}

fn router_for(world: &World, session: Session) -> TestRouter {
    let channel = LoopbackChannel::new("gm", gm(), world.store.clone());
    Router::new(world.store.clone(), channel, session, "gm".to_string())
}

fn positions(tokens: &[Document]) -> Vec<(f64, f64)> {
    tokens
        .iter()
        .map(|t| (t.data["x"].as_f64().unwrap(), t.data["y"].as_f64().unwrap()))
        .collect()
}

#[tokio::test]
async fn spawn_fills_nearest_cells_first() {
    let world = world();
    let router = router_for(&world, gm());
    let scene = SceneContext::new(&world.scene, SquareGrid::default());
    let picker = ScriptedPicker::new([Some(Point::new(250.0, 250.0))]);

    let spawned = Portal::default()
        .add_creature("Wolf", SpawnOptions::count(3))
        .spawn(&router, &scene, &picker)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(positions(&spawned), vec![(200.0, 200.0), (300.0, 200.0), (300.0, 300.0)]);
    assert!(spawned.iter().all(|t| t.data["actorId"] == json!(world.wolf.id.local())));
    assert_eq!(world.store.embedded(&world.scene.id, TOKEN).unwrap().len(), 3);
}

#[tokio::test]
async fn walls_meeting_the_picked_corner_do_not_block_spawns() {
    let walls = [
        Wall::new(Point::new(200.0, -1000.0), Point::new(200.0, 1000.0)),
        Wall::new(Point::new(200.0, 200.0), Point::new(1000.0, 200.0)),
    ];

    for wall in walls {
        let world = world();
        let router = router_for(&world, gm());
        let scene = SceneContext::new(&world.scene, SquareGrid::default()).with_walls(vec![wall]);
        let picker = ScriptedPicker::new([Some(Point::new(250.0, 250.0))]);

        let spawned = Portal::default()
            .add_creature("Wolf", SpawnOptions::count(3))
            .spawn(&router, &scene, &picker)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(positions(&spawned), vec![(200.0, 200.0), (300.0, 200.0), (300.0, 300.0)]);
    }
}

#[tokio::test]
async fn player_spawn_is_routed_and_applies_post_spawn_updates() {
    let world = world();
    let router = router_for(&world, player());
    let scene = SceneContext::new(&world.scene, SquareGrid::default());
    let picker = ScriptedPicker::new([Some(Point::new(0.0, 0.0))]);

    let mut items = Map::new();
    items.insert("Bite".to_string(), json!({"damage": "3d6"}));
    let update = PostSpawnUpdate {
        token: Some(json!({"name": "Dire Wolf"})),
        actor: Some(json!({"system": {"hp": 37}})),
        embedded: BTreeMap::from([(ITEM.to_string(), items)]),
    };

    let spawned = Portal::default()
        .add_creature(&world.wolf, SpawnOptions::default().with_update(update))
        .spawn(&router, &scene, &picker)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].name(), Some("Dire Wolf"));
    // The responder created it, so the player does not own it.
    assert!(!spawned[0].owners.contains("alice"));

    let wolf = world.store.get(&world.wolf.id).unwrap().unwrap();
    assert_eq!(wolf.data["system"]["hp"], json!(37));
    let bite = world.store.embedded(&world.wolf.id, ITEM).unwrap().remove(0);
    assert_eq!(bite.data["damage"], json!("3d6"));
}

#[tokio::test]
async fn out_of_range_pick_is_asked_again() {
    let world = world();
    let router = router_for(&world, gm());
    let grid = SquareGrid::default();
    let picker = ScriptedPicker::new([Some(Point::new(1000.0, 0.0)), Some(Point::new(150.0, 50.0))]);

    let mut portal = Portal::default()
        .add_creature("Wolf", SpawnOptions::default())
        .origin(Point::new(50.0, 50.0).with_elevation(Some(5.0)))
        .range(10.0);
    let picked = portal.pick(&router, &grid, &picker).await.unwrap();

    assert_eq!(picked, Some(Point::new(100.0, 0.0).with_elevation(Some(5.0))));
    assert_eq!(picker.shown().len(), 2);
}

#[tokio::test]
async fn cancelled_pick_spawns_nothing() {
    let world = world();
    let router = router_for(&world, gm());
    let scene = SceneContext::new(&world.scene, SquareGrid::default());
    let picker = ScriptedPicker::new([None]);

    let result = Portal::default()
        .add_creature("Wolf", SpawnOptions::count(2))
        .spawn(&router, &scene, &picker)
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(world.store.embedded(&world.scene.id, TOKEN).unwrap().is_empty());
}

#[tokio::test]
async fn preview_takes_size_from_first_creature() {
    let world = world();
    let giant = world
        .store
        .create(&gm(), ACTOR, &json!({"name": "Giant", "prototypeToken": {"width": 3, "height": 2}}))
        .unwrap();
    let router = router_for(&world, gm());
    let picker = ScriptedPicker::new([None]);

    let mut settings = Settings::default();
    settings.preview.color = "#00ff00".to_string();
    let mut portal = Portal::new(settings).add_creature(&giant, SpawnOptions::default());
    portal.pick(&router, &SquareGrid::default(), &picker).await.unwrap();

    let shown = picker.shown();
    assert_eq!(shown[0].distance, 15.0);
    assert_eq!(shown[0].color, "#00ff00");
}

#[tokio::test]
async fn crowded_origin_without_rings_has_no_free_position() {
    let world = world();
    world
        .store
        .create_embedded(&gm(), &world.scene.id, TOKEN, &[json!({"x": 200, "y": 200})], &MutationOptions::new())
        .unwrap();
    let router = router_for(&world, gm());
    let scene = SceneContext::new(&world.scene, SquareGrid::default());
    let picker = ScriptedPicker::new([Some(Point::new(200.0, 200.0))]);

    let settings = Settings {
        placement: PlacementSettings {
            max_rings: 0,
            collision: true,
        },
        ..Settings::default()
    };
    let err = Portal::new(settings)
        .add_creature("Wolf", SpawnOptions::default())
        .spawn(&router, &scene, &picker)
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::NoFreePosition(name) if name == "Wolf"));
}

#[tokio::test]
async fn unknown_creature_has_no_token_data() {
    let world = world();
    let router = router_for(&world, gm());
    let picker = ScriptedPicker::new([Some(Point::new(0.0, 0.0))]);

    let err = Portal::default()
        .add_creature("Tarrasque", SpawnOptions::default())
        .pick(&router, &SquareGrid::default(), &picker)
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::NoTokenData(_)));
}

#[tokio::test]
async fn teleport_fades_around_the_move() {
    let world = world();
    let grid = SquareGrid::default();
    let token = world
        .store
        .create_embedded(
            &gm(),
            &world.scene.id,
            TOKEN,
            &[json!({"x": 0, "y": 0, "elevation": 10})],
            &MutationOptions::new(),
        )
        .unwrap()
        .remove(0);
    let router = router_for(&world, player());
    let picker = ScriptedPicker::new([Some(Point::new(510.0, 310.0))]);
    let animator = RecordingAnimator::default();

    let moved = Portal::default()
        .origin_token(&grid, &token)
        .teleport(&router, &grid, &picker, &animator)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(moved.id, token.id);
    assert_eq!(positions(std::slice::from_ref(&moved)), vec![(500.0, 300.0)]);
    assert_eq!(moved.data["elevation"], json!(10.0));

    let fades = animator.fades.lock().unwrap().clone();
    let fade = Duration::from_millis(300);
    assert_eq!(
        fades,
        vec![(token.id.clone(), Fade::out(fade)), (token.id.clone(), Fade::back_in(0.8, fade))]
    );
}

#[tokio::test]
async fn teleport_needs_a_target() {
    let world = world();
    let router = router_for(&world, gm());
    let picker = ScriptedPicker::new([Some(Point::new(0.0, 0.0))]);

    let err = Portal::default()
        .origin(Point::new(0.0, 0.0))
        .teleport(&router, &SquareGrid::default(), &picker, &portal::NoAnimation)
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::NoTeleportTarget));
}
