use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use super::behavior::{HookContext, HookView, MoveRequest};
use super::blob::{Blob, BlobStyle};
use super::command::{BlobId, Command, CommandQueue, Flow};
use super::cut::{ActiveCut, Cut, CutAction};
use super::event::Diary;
use super::loader::{SceneLoadError, SceneSource};
use super::object::{GameObject, ObjectId};
use super::position::{direction, Position};
use super::scene_map::{SceneMap, TileContent};
use crate::app::rendering::RenderTarget;
use crate::app::{InputAction, InputSnapshot};

mod draw;

use draw::{DrawnSprite, DrawnTile, SpriteKey};

/// Upper bound on hook-triggered move chains resolved within one step.
const MAX_MOVE_PASSES: usize = 8;

const DIRECTION_INPUTS: [(InputAction, Position); 4] = [
    (InputAction::MoveRight, direction::RIGHT),
    (InputAction::MoveLeft, direction::LEFT),
    (InputAction::MoveUp, direction::UP),
    (InputAction::MoveDown, direction::DOWN),
];

/// Work done by the last drawn frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Background cells repainted.
    pub tiles_drawn: usize,
    pub sprites_drawn: usize,
    pub full_redraw: bool,
}

/// Runs once a cut is left.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PostCutAction {
    LoadScene { name: String, skip_pre_cut: bool },
}

/// Who stands in a cell, as seen by movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupant {
    Actor(usize),
    Tile(ObjectId),
    Empty,
}

/// Owns the running scene, its actors and the redraw caches, and advances all of it one tick
/// per [`Controller::frame`].
pub struct Controller {
    source: Box<dyn SceneSource>,
    initial_scene: String,
    scene: SceneMap,
    actors: Vec<GameObject>,
    groups: HashMap<String, Vec<ObjectId>>,
    main_character: Option<ObjectId>,
    blobs: Vec<Blob>,
    blob_style: BlobStyle,
    diary: Diary,
    commands: CommandQueue,
    cut: Option<ActiveCut>,
    post_cut: Option<PostCutAction>,
    godmode: bool,
    screen: (u32, u32),
    old_tiles: HashMap<Position, DrawnTile>,
    dirty_tiles: HashSet<Position>,
    drawn_sprites: HashMap<SpriteKey, DrawnSprite>,
    last_origin: Option<(i32, i32)>,
    force_redraw: bool,
    skip_frame: bool,
    last_stats: FrameStats,
}

impl Controller {
    /// Loads `initial_scene` from `source` and spawns its actors. The scene's pre-cut, if
    /// any, is entered right away.
    pub fn new(
        source: Box<dyn SceneSource>,
        initial_scene: impl Into<String>,
    ) -> Result<Self, SceneLoadError> {
        let initial_scene = initial_scene.into();
        let scene = source.load(&initial_scene)?;
        let screen = scene.config().display_size;
        let mut controller = Self {
            source,
            initial_scene,
            scene,
            actors: Vec::new(),
            groups: HashMap::new(),
            main_character: None,
            blobs: Vec::new(),
            blob_style: BlobStyle::default(),
            diary: Diary::default(),
            commands: CommandQueue::new(),
            cut: None,
            post_cut: None,
            godmode: false,
            screen,
            old_tiles: HashMap::new(),
            dirty_tiles: HashSet::new(),
            drawn_sprites: HashMap::new(),
            last_origin: None,
            force_redraw: true,
            skip_frame: false,
            last_stats: FrameStats::default(),
        };
        controller.spawn_scene_actors();
        controller.enter_pre_cut();
        Ok(controller)
    }

    pub fn with_godmode(mut self, godmode: bool) -> Self {
        self.godmode = godmode;
        self
    }

    pub fn with_blob_style(mut self, style: BlobStyle) -> Self {
        self.blob_style = style;
        self
    }

    pub fn scene(&self) -> &SceneMap {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneMap {
        &mut self.scene
    }

    pub fn initial_scene(&self) -> &str {
        &self.initial_scene
    }

    pub fn actors(&self) -> &[GameObject] {
        &self.actors
    }

    pub fn actor(&self, id: ObjectId) -> Option<&GameObject> {
        self.actors.iter().find(|actor| actor.id() == id)
    }

    pub fn actor_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.actors.iter_mut().find(|actor| actor.id() == id)
    }

    pub fn main_character(&self) -> Option<&GameObject> {
        self.main_character.and_then(|id| self.actor(id))
    }

    /// Live actors of class `name`, in spawn order.
    pub fn group(&self, name: &str) -> &[ObjectId] {
        self.groups
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn active_cut(&self) -> Option<&ActiveCut> {
        self.cut.as_ref()
    }

    pub fn diary(&self) -> &Diary {
        &self.diary
    }

    pub fn diary_mut(&mut self) -> &mut Diary {
        &mut self.diary
    }

    pub fn godmode(&self) -> bool {
        self.godmode
    }

    pub fn set_godmode(&mut self, godmode: bool) {
        self.godmode = godmode;
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Queues `command` for the end of the next frame's update phase.
    pub fn queue(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// The actor standing at `pos`, else the scene content there.
    pub fn occupant_at(&mut self, pos: Position) -> TileContent {
        match self.occupant(pos, None) {
            Occupant::Actor(index) => TileContent::Entity(self.actors[index].id()),
            Occupant::Tile(id) => TileContent::Entity(id),
            Occupant::Empty => self.scene.content_at(pos),
        }
    }

    /// One tick: cut input while a cut is up, otherwise scroll, input, actor updates,
    /// collisions, queued commands and the incremental redraw.
    pub fn frame(&mut self, input: &InputSnapshot, target: &mut dyn RenderTarget) -> Flow {
        self.screen = target.size();
        if input.quit_requested() {
            info!(scene = self.scene.name(), "shutdown_requested");
            return Flow::GameOver;
        }
        if self.cut.is_some() {
            return self.cut_frame(input, target);
        }

        self.skip_frame = false;
        self.scene.tick();
        if input.was_pressed(InputAction::Quit) {
            info!(scene = self.scene.name(), "game_over_requested");
            return Flow::GameOver;
        }
        self.handle_input(input);
        self.update_actors();
        self.dispatch_collisions();

        let flow = self.apply_commands();
        if flow != Flow::Continue || self.skip_frame {
            return flow;
        }
        if let Some(cut) = &mut self.cut {
            cut.draw(target);
            self.last_stats = FrameStats {
                full_redraw: true,
                ..FrameStats::default()
            };
            return Flow::Continue;
        }
        self.last_stats = self.draw(target);
        Flow::Continue
    }

    fn cut_frame(&mut self, input: &InputSnapshot, target: &mut dyn RenderTarget) -> Flow {
        let action = match &mut self.cut {
            Some(cut) => cut.handle_input(input),
            None => return Flow::Continue,
        };
        match action {
            None => {}
            Some(CutAction::Continue) => self.leave_cut(),
            Some(CutAction::Restart) => {
                info!(scene = self.scene.name(), "cut_restart");
                self.cut = None;
                return Flow::Restart;
            }
            Some(CutAction::GameOver) => {
                info!(scene = self.scene.name(), "cut_game_over");
                return Flow::GameOver;
            }
            Some(CutAction::LoadScene { scene }) => {
                self.cut = None;
                self.post_cut = None;
                self.force_redraw = true;
                self.load_scene(&scene);
            }
        }
        let drawn = match &mut self.cut {
            Some(cut) => cut.draw(target),
            None => false,
        };
        self.last_stats = FrameStats {
            full_redraw: drawn,
            ..FrameStats::default()
        };
        Flow::Continue
    }

    pub fn enter_cut(&mut self, cut: Cut) {
        self.enter_cut_then(cut, None);
    }

    fn enter_cut_then(&mut self, cut: Cut, post: Option<PostCutAction>) {
        info!(scene = self.scene.name(), title = %cut.title, "cut_entered");
        self.cut = Some(ActiveCut::new(cut));
        self.post_cut = post;
    }

    /// Drops the cut and runs whatever was waiting for it.
    pub fn leave_cut(&mut self) {
        if self.cut.take().is_none() {
            return;
        }
        info!(scene = self.scene.name(), "cut_left");
        self.force_redraw = true;
        if let Some(PostCutAction::LoadScene { name, skip_pre_cut }) = self.post_cut.take() {
            self.load_scene_with(&name, true, skip_pre_cut);
        }
    }

    /// Swaps to scene `name`, showing the current scene's post-cut first and the new scene's
    /// pre-cut after. A scene that fails to load is logged and the current one kept.
    pub fn load_scene(&mut self, name: &str) {
        self.load_scene_with(name, false, false);
    }

    fn load_scene_with(&mut self, name: &str, skip_post_cut: bool, skip_pre_cut: bool) {
        if !skip_post_cut {
            if let Some(cut) = self.scene.config().post_cut.clone() {
                let post = PostCutAction::LoadScene {
                    name: name.to_string(),
                    skip_pre_cut,
                };
                self.enter_cut_then(cut, Some(post));
                return;
            }
        }
        match self.source.load(name) {
            Ok(scene) => {
                info!(from = self.scene.name(), to = name, "scene_swap");
                self.install_scene(scene);
                if !skip_pre_cut {
                    self.enter_pre_cut();
                }
            }
            Err(err) => {
                error!(scene = name, error = %err, "scene_load_failed");
            }
        }
    }

    /// Back to the initial scene with a fresh viewport and an empty diary.
    pub fn restart(&mut self) -> Result<(), SceneLoadError> {
        info!(scene = %self.initial_scene, "restart");
        self.hard_reset();
        let mut scene = self.source.load(&self.initial_scene)?;
        scene.scroll_to(0, 0);
        self.install_scene(scene);
        self.enter_pre_cut();
        Ok(())
    }

    /// Clears the run diary, then soft-resets.
    pub fn hard_reset(&mut self) {
        info!(scene = self.scene.name(), "hard_reset");
        self.cut = None;
        self.diary.clear();
        self.soft_reset();
    }

    /// Forgets everything that was drawn and skips the rest of the current frame.
    pub fn soft_reset(&mut self) {
        debug!(scene = self.scene.name(), "soft_reset");
        self.reset_draw_caches();
        self.post_cut = None;
        self.skip_frame = true;
    }

    fn reset_draw_caches(&mut self) {
        self.old_tiles.clear();
        self.dirty_tiles.clear();
        self.drawn_sprites.clear();
        self.last_origin = None;
        self.force_redraw = true;
    }

    fn enter_pre_cut(&mut self) {
        if let Some(cut) = self.scene.config().pre_cut.clone() {
            self.enter_cut_then(cut, None);
        }
    }

    fn install_scene(&mut self, scene: SceneMap) {
        self.scene = scene;
        self.spawn_scene_actors();
    }

    fn spawn_scene_actors(&mut self) {
        self.actors.clear();
        self.groups.clear();
        self.blobs.clear();
        self.main_character = None;
        self.reset_draw_caches();

        for (pos, class) in self.scene.actor_spawns() {
            let actor = self.scene.instantiate(&class, pos);
            self.add_actor(actor);
        }
        info!(
            scene = self.scene.name(),
            width = self.scene.width(),
            height = self.scene.height(),
            actors = self.actors.len(),
            "scene_loaded"
        );
    }

    /// Places a new actor of class `name` at `pos`. `None` when no such class is registered.
    pub fn spawn(&mut self, name: &str, pos: Position) -> Option<ObjectId> {
        let Some(class) = self.scene.registry().get(name).cloned() else {
            warn!(scene = self.scene.name(), class = name, "spawn_unknown_class");
            return None;
        };
        let actor = self.scene.instantiate(&class, pos);
        let id = actor.id();
        self.add_actor(actor);
        Some(id)
    }

    fn add_actor(&mut self, actor: GameObject) {
        let id = actor.id();
        if self.main_character.is_none() && actor.is_main_character() {
            self.main_character = Some(id);
        }
        self.groups
            .entry(actor.class().name().to_string())
            .or_default()
            .push(id);
        self.actors.push(actor);
    }

    /// Removes an actor or a tile object. Killing the main character enters the scene's
    /// game-over cut.
    pub fn kill(&mut self, id: ObjectId) {
        let before = self.blobs.len();
        self.blobs.retain(|blob| blob.id().owner != id);
        if self.blobs.len() != before {
            self.force_redraw = true;
        }

        if let Some(index) = self.actor_index(id) {
            let actor = self.actors.remove(index);
            if let Some(members) = self.groups.get_mut(actor.class().name()) {
                members.retain(|member| *member != id);
            }
            info!(object = %id, class = actor.class().name(), "actor_killed");
            if self.main_character == Some(id) {
                self.main_character = None;
                let cut = self.scene.config().game_over_cut();
                self.enter_cut_then(cut, None);
            }
        } else if let Some(tile) = self.scene.remove_tile_object(id) {
            info!(object = %id, class = tile.class().name(), "tile_removed");
        }
    }

    fn actor_index(&self, id: ObjectId) -> Option<usize> {
        self.actors.iter().position(|actor| actor.id() == id)
    }

    fn viewport_cells(&self) -> (i32, i32) {
        let size = self.scene.blocksize().max(1);
        (
            self.screen.0.div_ceil(size) as i32,
            self.screen.1.div_ceil(size) as i32,
        )
    }

    fn hook_view(&self) -> HookView {
        let (blocks_x, blocks_y) = self.viewport_cells();
        HookView {
            left: self.scene.left(),
            top: self.scene.top(),
            blocks_x,
            blocks_y,
            map_width: self.scene.width(),
            map_height: self.scene.height(),
        }
    }

    fn handle_input(&mut self, input: &InputSnapshot) {
        for (action, step) in DIRECTION_INPUTS {
            if !input.is_down(action) {
                continue;
            }
            if self.godmode {
                self.scene.request_scroll(step);
            } else if let Some(id) = self.main_character {
                self.resolve_moves(vec![(id, MoveRequest::Step(step))]);
            }
        }

        if input.was_pressed(InputAction::Fire) {
            self.commands.push(Command::DismissAllText);
            let Some(index) = self.main_character.and_then(|id| self.actor_index(id)) else {
                return;
            };
            let view = self.hook_view();
            let mut ctx = HookContext::new(&mut self.commands, &mut self.diary, view);
            self.actors[index].on_fire(&mut ctx);
            let moves = ctx.take_moves();
            self.resolve_moves(moves);
        }
    }

    fn update_actors(&mut self) {
        let view = self.hook_view();
        for index in 0..self.actors.len() {
            let actor = &mut self.actors[index];
            if !actor.body.off_screen_update && !view.contains(actor.pos()) {
                continue;
            }
            let mut ctx = HookContext::new(&mut self.commands, &mut self.diary, view);
            actor.update(&mut ctx);
            let moves = ctx.take_moves();
            self.resolve_moves(moves);
        }
    }

    /// `on_over` for every ordered pair of overlapping actors, then for the tile object under
    /// each actor.
    fn dispatch_collisions(&mut self) {
        let size = self.scene.blocksize();
        let view = self.hook_view();
        let mut moves = Vec::new();

        for over in 0..self.actors.len() {
            for other in 0..self.actors.len() {
                if over == other {
                    continue;
                }
                let rect = self.actors[over].body.rect(size);
                if !rect.overlaps(&self.actors[other].body.rect(size)) {
                    continue;
                }
                let (over_actor, other_actor) = pair_mut(&mut self.actors, over, other);
                let mut ctx = HookContext::new(&mut self.commands, &mut self.diary, view);
                over_actor.on_over(&mut other_actor.body, &mut ctx);
                moves.extend(ctx.take_moves());
            }
        }

        for index in 0..self.actors.len() {
            let pos = self.actors[index].pos();
            let TileContent::Entity(tile_id) = self.scene.content_at(pos) else {
                continue;
            };
            let Some(mut tile) = self.scene.take_tile_object(tile_id) else {
                continue;
            };
            let mut ctx = HookContext::new(&mut self.commands, &mut self.diary, view);
            tile.on_over(&mut self.actors[index].body, &mut ctx);
            moves.extend(ctx.take_moves());
            self.scene.restore_tile_object(tile);
        }

        self.resolve_moves(moves);
    }

    fn resolve_moves(&mut self, mut moves: Vec<(ObjectId, MoveRequest)>) {
        let mut passes = 0;
        while !moves.is_empty() && passes < MAX_MOVE_PASSES {
            passes += 1;
            let mut follow_up = Vec::new();
            for (id, request) in moves {
                follow_up.extend(self.resolve_move(id, request));
            }
            moves = follow_up;
        }
        if !moves.is_empty() {
            warn!(
                scene = self.scene.name(),
                dropped = moves.len(),
                "move_chain_truncated"
            );
        }
    }

    /// Rate gate, bounds, `on_touch` on the occupant, hardness gate, commit. Returns the
    /// moves requested by the touched object's hooks.
    fn resolve_move(&mut self, id: ObjectId, request: MoveRequest) -> Vec<(ObjectId, MoveRequest)> {
        let Some(index) = self.actor_index(id) else {
            return Vec::new();
        };
        let (step, falling) = match request {
            MoveRequest::Step(step) => (step, false),
            MoveRequest::Fall(step) => (step, true),
        };

        let body = &mut self.actors[index].body;
        if body.move_counter < body.base_move_rate {
            return Vec::new();
        }
        if step.is_zero() {
            body.move_counter = 0;
            return Vec::new();
        }
        let target = body.pos + step;
        if !self.scene.contains(target) {
            return Vec::new();
        }

        let occupant = self.occupant(target, Some(index));
        if falling && self.occupant_hardness(occupant) >= self.actors[index].body.weight {
            return Vec::new();
        }

        let view = self.hook_view();
        let mut ctx = HookContext::new(&mut self.commands, &mut self.diary, view);
        let hardness = match occupant {
            Occupant::Actor(other) => {
                let (mover, touched) = pair_mut(&mut self.actors, index, other);
                touched.on_touch(&mut mover.body, &mut ctx);
                touched.body.hardness
            }
            Occupant::Tile(tile_id) => match self.scene.take_tile_object(tile_id) {
                Some(mut tile) => {
                    tile.on_touch(&mut self.actors[index].body, &mut ctx);
                    let hardness = tile.body.hardness;
                    self.scene.restore_tile_object(tile);
                    hardness
                }
                None => 0,
            },
            Occupant::Empty => 0,
        };
        let follow_up = ctx.take_moves();

        let body = &mut self.actors[index].body;
        if hardness > body.strength {
            return follow_up;
        }
        body.old_pos = body.pos;
        body.pos = target;
        body.move_direction = step;
        body.move_direction_count = body.tick;
        body.speed = 1.0 / body.base_move_rate.max(1) as f32;
        body.move_counter = 0;
        follow_up
    }

    fn occupant(&mut self, pos: Position, except: Option<usize>) -> Occupant {
        let standing = self
            .actors
            .iter()
            .enumerate()
            .find(|(index, actor)| Some(*index) != except && actor.pos() == pos);
        if let Some((index, _)) = standing {
            return Occupant::Actor(index);
        }
        match self.scene.content_at(pos) {
            TileContent::Entity(id) => Occupant::Tile(id),
            _ => Occupant::Empty,
        }
    }

    fn occupant_hardness(&self, occupant: Occupant) -> i32 {
        match occupant {
            Occupant::Actor(index) => self.actors[index].body.hardness,
            Occupant::Tile(id) => self
                .scene
                .tile_object(id)
                .map(|tile| tile.body.hardness)
                .unwrap_or(0),
            Occupant::Empty => 0,
        }
    }

    /// Applies queued commands in order. A reset, scene swap or loop transition drops the
    /// rest of the queue.
    fn apply_commands(&mut self) -> Flow {
        for command in self.commands.take() {
            match command {
                Command::ShowText { blob, text } => self.show_blob(blob, text),
                Command::DismissText(blob) => self.dismiss_blobs(|id| id == blob),
                Command::DismissAllText => self.dismiss_blobs(|_| true),
                Command::Kill(id) => self.kill(id),
                Command::ChangeImage { object, image } => self.change_image(object, &image),
                Command::EnterCut(cut) => self.enter_cut(cut),
                Command::Scroll(delta) => self.scene.request_scroll(delta),
                Command::SetScrollTarget { left, top } => self.scene.set_scroll_target(left, top),
                Command::ForceRedraw => self.force_redraw = true,
                Command::LoadScene(name) => {
                    self.load_scene(&name);
                    break;
                }
                Command::SoftReset => {
                    self.soft_reset();
                    break;
                }
                Command::HardReset => {
                    self.hard_reset();
                    break;
                }
                Command::Restart => return Flow::Restart,
                Command::GameOver => {
                    info!(scene = self.scene.name(), "game_over");
                    return Flow::GameOver;
                }
            }
        }
        Flow::Continue
    }

    fn change_image(&mut self, id: ObjectId, name: &str) {
        let Some(image) = self.scene.block_image(name) else {
            warn!(object = %id, image = name, "image_change_failed");
            return;
        };
        if let Some(actor) = self.actor_mut(id) {
            actor.body.set_image(image);
        } else if let Some(tile) = self.scene.tile_object_mut(id) {
            tile.body.set_image(image);
        }
    }

    fn show_blob(&mut self, id: BlobId, text: String) {
        match self.blobs.iter().position(|blob| blob.id() == id) {
            Some(index) => self.blobs[index].set_text(text),
            None => self
                .blobs
                .push(Blob::new(id, text, self.blob_style.clone())),
        }
    }

    fn dismiss_blobs(&mut self, matches: impl Fn(BlobId) -> bool) {
        let mut owners = Vec::new();
        self.blobs.retain(|blob| {
            let dismiss = matches(blob.id());
            if dismiss {
                owners.push(blob.id().owner);
            }
            !dismiss
        });
        if owners.is_empty() {
            return;
        }
        for owner in owners {
            if let Some(actor) = self.actor_mut(owner) {
                actor.body.showing_text = false;
            } else if let Some(tile) = self.scene.tile_object_mut(owner) {
                tile.body.showing_text = false;
            }
        }
        self.force_redraw = true;
    }
}

fn pair_mut<T>(items: &mut [T], first: usize, second: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(first, second);
    if first < second {
        let (head, tail) = items.split_at_mut(second);
        (&mut head[first], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(first);
        (&mut tail[0], &mut head[second])
    }
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
