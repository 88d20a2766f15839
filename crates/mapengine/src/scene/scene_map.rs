use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use super::config::SceneConfig;
use super::object::{Body, GameObject, ObjectId};
use super::position::{Facing, Position};
use super::registry::{GameObjectRegistry, ObjectClass};
use crate::content::{
    load_resource, slice_sheet, Bitmap, FacingImages, LoadOptions, Palette, ResourceCache, Rgba,
    SearchPath, SpriteSheetSpec,
};

const PLACEHOLDER_COLOR: Rgba = [255, 0, 255, 255];

/// What a map cell holds once resolved.
#[derive(Debug, Clone)]
pub enum TileContent {
    Color(Rgba),
    StaticImage(Rc<Bitmap>),
    /// A tile object owned by the scene.
    Entity(ObjectId),
}

/// Identity comparison: images compare by allocation, not by pixels.
impl PartialEq for TileContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TileContent::Color(a), TileContent::Color(b)) => a == b,
            (TileContent::StaticImage(a), TileContent::StaticImage(b)) => Rc::ptr_eq(a, b),
            (TileContent::Entity(a), TileContent::Entity(b)) => a == b,
            _ => false,
        }
    }
}

/// How a tile name resolved the first time it was seen.
#[derive(Debug, Clone)]
enum TileKind {
    Class(Rc<ObjectClass>),
    Image(Rc<Bitmap>),
    Color(Rgba),
}

/// The decoded images a scene is built from.
#[derive(Debug, Clone)]
pub struct ScenePlanes {
    pub name: String,
    pub background: Bitmap,
    pub actors: Option<Bitmap>,
    /// Unscaled; stretched to the map's pixel width on construction.
    pub overlay: Option<Bitmap>,
    pub palette: Palette,
}

type SheetFrames = Rc<Vec<Vec<Rc<Bitmap>>>>;

/// One loaded map: lazy cell resolution plus scroll state.
#[derive(Debug)]
pub struct SceneMap {
    name: String,
    config: SceneConfig,
    search: SearchPath,
    registry: Rc<GameObjectRegistry>,
    background: Bitmap,
    actor_plane: Option<Bitmap>,
    overlay: Option<Bitmap>,
    palette: Palette,
    blocksize: u32,
    width: i32,
    height: i32,
    tiles: HashMap<String, TileKind>,
    background_plane: HashMap<Position, TileContent>,
    tile_objects: HashMap<ObjectId, GameObject>,
    images: ResourceCache<Rc<Bitmap>>,
    class_images: HashMap<String, Rc<Bitmap>>,
    sheets: HashMap<SpriteSheetSpec, SheetFrames>,
    warned_spawns: HashSet<String>,
    top: i32,
    left: i32,
    target_top: i32,
    target_left: i32,
    scroll_count: u32,
}

impl SceneMap {
    pub fn from_parts(
        planes: ScenePlanes,
        config: SceneConfig,
        search: SearchPath,
        registry: Rc<GameObjectRegistry>,
    ) -> Self {
        let blocksize = config.blocksize();
        let (width, height) = planes.background.size();
        let overlay = planes
            .overlay
            .map(|overlay| overlay.scaled_to_width(width * blocksize));
        Self {
            name: planes.name,
            background: planes.background,
            actor_plane: planes.actors,
            overlay,
            palette: planes.palette,
            blocksize,
            width: width as i32,
            height: height as i32,
            tiles: HashMap::new(),
            background_plane: HashMap::new(),
            tile_objects: HashMap::new(),
            images: ResourceCache::new(),
            class_images: HashMap::new(),
            sheets: HashMap::new(),
            warned_spawns: HashSet::new(),
            top: config.top,
            left: config.left,
            target_top: config.top,
            target_left: config.left,
            scroll_count: 0,
            config,
            search,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn registry(&self) -> &Rc<GameObjectRegistry> {
        &self.registry
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn blocksize(&self) -> u32 {
        self.blocksize
    }

    /// Pre-scaled to `width * blocksize` pixels across.
    pub fn overlay(&self) -> Option<&Bitmap> {
        self.overlay.as_ref()
    }

    pub fn contains(&self, pos: Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn target_left(&self) -> i32 {
        self.target_left
    }

    pub fn target_top(&self) -> i32 {
        self.target_top
    }

    /// Resolves a cell, instantiating its tile object on first access. Later calls for the
    /// same cell return the same content.
    pub fn content_at(&mut self, pos: Position) -> TileContent {
        if let Some(content) = self.background_plane.get(&pos) {
            return content.clone();
        }
        let Some(color) = self.background.pixel(pos.x, pos.y) else {
            return TileContent::Color(self.config.out_of_map);
        };

        let name = self.palette.lookup_by_color(color).ok().map(str::to_string);
        let content = match name {
            None => TileContent::Color(color),
            Some(name) => {
                match self.tile_kind(&name, color) {
                    TileKind::Class(class) => {
                        let object = self.instantiate(&class, pos);
                        let id = object.id();
                        self.tile_objects.insert(id, object);
                        TileContent::Entity(id)
                    }
                    TileKind::Image(image) => TileContent::StaticImage(image),
                    TileKind::Color(color) => TileContent::Color(color),
                }
            }
        };
        self.background_plane.insert(pos, content.clone());
        content
    }

    /// Cached content only; never resolves.
    pub fn peek(&self, pos: Position) -> Option<&TileContent> {
        self.background_plane.get(&pos)
    }

    fn tile_kind(&mut self, name: &str, color: Rgba) -> TileKind {
        if let Some(kind) = self.tiles.get(name) {
            return kind.clone();
        }
        let kind = if let Some(class) = self.registry.get(name) {
            TileKind::Class(Rc::clone(class))
        } else if let Some(image) = self.static_tile_image(name) {
            TileKind::Image(image)
        } else {
            TileKind::Color(color)
        };
        debug!(scene = %self.name, tile = name, kind = kind_label(&kind), "tile_resolved");
        self.tiles.insert(name.to_string(), kind.clone());
        kind
    }

    /// Hardness of whatever the scene holds at `pos`. Only tile objects are hard.
    pub fn hardness_at(&mut self, pos: Position) -> i32 {
        match self.content_at(pos) {
            TileContent::Entity(id) => self
                .tile_objects
                .get(&id)
                .map(|object| object.body.hardness)
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn tile_object(&self, id: ObjectId) -> Option<&GameObject> {
        self.tile_objects.get(&id)
    }

    pub fn tile_object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.tile_objects.get_mut(&id)
    }

    pub fn tile_object_count(&self) -> usize {
        self.tile_objects.len()
    }

    /// Lends a tile object out so its hooks can run alongside a mutable scene.
    pub(crate) fn take_tile_object(&mut self, id: ObjectId) -> Option<GameObject> {
        self.tile_objects.remove(&id)
    }

    pub(crate) fn restore_tile_object(&mut self, object: GameObject) {
        self.tile_objects.insert(object.id(), object);
    }

    /// Drops a tile object. Its cell falls back to the plain map colour.
    pub fn remove_tile_object(&mut self, id: ObjectId) -> Option<GameObject> {
        let object = self.tile_objects.remove(&id)?;
        let pos = object.pos();
        let color = self
            .background
            .pixel(pos.x, pos.y)
            .unwrap_or(self.config.out_of_map);
        self.background_plane.insert(pos, TileContent::Color(color));
        Some(object)
    }

    /// The class to spawn at `pos` according to the actor plane, if any.
    pub fn spawn_class_at(&mut self, pos: Position) -> Option<Rc<ObjectClass>> {
        let color = self.actor_plane.as_ref()?.pixel(pos.x, pos.y)?;
        if color[3] == 0 {
            return None;
        }
        let Some(name) = self.palette.lookup_by_color(color).ok().map(str::to_string) else {
            self.warn_spawn_once(format!("{color:?}"), pos);
            return None;
        };
        let class = self.registry.get(&name).cloned();
        if class.is_none() {
            self.warn_spawn_once(name, pos);
        }
        class
    }

    fn warn_spawn_once(&mut self, key: String, pos: Position) {
        if self.warned_spawns.insert(key.clone()) {
            warn!(scene = %self.name, actor = %key, x = pos.x, y = pos.y, "unregistered_actor");
        }
    }

    /// Every actor-plane spawn, column by column.
    pub fn actor_spawns(&mut self) -> Vec<(Position, Rc<ObjectClass>)> {
        let mut spawns = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                let pos = Position::new(x, y);
                if let Some(class) = self.spawn_class_at(pos) {
                    spawns.push((pos, class));
                }
            }
        }
        spawns
    }

    /// Builds a fresh object of `class` at `pos` with images from this scene.
    pub fn instantiate(&mut self, class: &Rc<ObjectClass>, pos: Position) -> GameObject {
        let (image, images) = self.object_images(class);
        let body = Body::new(class, pos, image, images);
        GameObject::new(Rc::clone(class), body)
    }

    fn object_images(
        &mut self,
        class: &ObjectClass,
    ) -> (Option<Rc<Bitmap>>, Option<FacingImages>) {
        if let Some(sheet) = class.image_sequence() {
            let rows = self.sheet_frames(sheet);
            if let Some(images) = FacingImages::from_rows(&rows) {
                return (images.resting(Facing::Right).cloned(), Some(images));
            }
            warn!(scene = %self.name, class = class.name(), sheet = %sheet.file, "sprite_sheet_empty");
        }
        let image = self.class_image(class);
        let images = class
            .auto_flip()
            .then(|| FacingImages::auto_flip(Rc::clone(&image)));
        (Some(image), images)
    }

    fn class_image(&mut self, class: &ObjectClass) -> Rc<Bitmap> {
        if let Some(image) = self.class_images.get(class.name()) {
            return Rc::clone(image);
        }
        let own = self
            .block_image(class.image_name())
            .unwrap_or_else(|| Rc::new(self.placeholder(class.name())));
        let image = match class.background_image().and_then(|name| self.block_image(name)) {
            Some(under) => {
                let mut composed = (*under).clone();
                composed.draw_over(&own, 0, 0);
                Rc::new(composed)
            }
            None => own,
        };
        self.class_images
            .insert(class.name().to_string(), Rc::clone(&image));
        image
    }

    /// A block-sized square in the palette colour named after the class.
    fn placeholder(&self, class_name: &str) -> Bitmap {
        let color = self
            .palette
            .lookup_by_name(class_name)
            .unwrap_or(PLACEHOLDER_COLOR);
        Bitmap::solid(self.blocksize, self.blocksize, color)
    }

    fn sheet_frames(&mut self, sheet: &SpriteSheetSpec) -> SheetFrames {
        if let Some(frames) = self.sheets.get(sheet) {
            return Rc::clone(frames);
        }
        let raw = load_resource(
            &image_file_name(&sheet.file),
            &self.search,
            LoadOptions::optional(),
            |path| Bitmap::open(path),
        )
        .ok()
        .flatten();
        let blocksize = self.blocksize;
        let rows = raw
            .map(|raw| {
                let height = sheet.height.unwrap_or(raw.height());
                slice_sheet(&raw, sheet.width, height)
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|frame| Rc::new(frame.scaled_to_fit(blocksize)))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let frames = Rc::new(rows);
        self.sheets.insert(sheet.clone(), Rc::clone(&frames));
        frames
    }

    /// Loads `name` (adding `.png` when it has no image extension) scaled to the block size.
    /// Results, including misses, are cached for the life of the scene.
    pub fn block_image(&mut self, name: &str) -> Option<Rc<Bitmap>> {
        let blocksize = self.blocksize;
        self.images
            .load(
                &image_file_name(name),
                &self.search,
                LoadOptions::optional(),
                |path| Bitmap::open(path).map(|image| Rc::new(image.scaled_to_fit(blocksize))),
            )
            .ok()
            .flatten()
    }

    /// Image of a plain (classless) tile. These keep their aspect ratio and are scaled to the
    /// block width; the result is cached with the tile kind.
    fn static_tile_image(&self, name: &str) -> Option<Rc<Bitmap>> {
        let blocksize = self.blocksize;
        load_resource(
            &image_file_name(name),
            &self.search,
            LoadOptions::optional(),
            |path| Bitmap::open(path).map(|image| Rc::new(image.scaled_to_width(blocksize))),
        )
        .ok()
        .flatten()
    }

    /// Moves the scroll target by `delta` cells.
    pub fn request_scroll(&mut self, delta: Position) {
        self.target_left += delta.x;
        self.target_top += delta.y;
        self.clamp_target();
    }

    pub fn set_scroll_target(&mut self, left: Option<i32>, top: Option<i32>) {
        if let Some(left) = left {
            self.target_left = left;
        }
        if let Some(top) = top {
            self.target_top = top;
        }
        self.clamp_target();
    }

    /// Jumps the viewport (and its target) to `left`/`top`, unclamped.
    pub fn scroll_to(&mut self, left: i32, top: i32) {
        self.left = left;
        self.top = top;
        self.target_left = left;
        self.target_top = top;
        self.scroll_count = 0;
    }

    /// Keeps the target within `[-margin, size - window + margin]` on each axis. When the map
    /// is smaller than the window, the lower bound wins.
    pub fn clamp_target(&mut self) {
        let h_margin = self.config.h_margin();
        let v_margin = self.config.v_margin();
        let max_left = self.width - self.config.window_width as i32 + h_margin;
        let max_top = self.height - self.config.window_height as i32 + v_margin;
        self.target_left = self.target_left.min(max_left).max(-h_margin);
        self.target_top = self.target_top.min(max_top).max(-v_margin);
    }

    /// One scroll tick: the viewport steps one cell per axis toward the target every
    /// `scroll_rate` ticks.
    pub fn tick(&mut self) {
        self.clamp_target();
        self.scroll_count += 1;
        if self.scroll_count < self.config.scroll_rate.max(1) {
            return;
        }
        self.scroll_count = 0;
        self.left += (self.target_left - self.left).signum();
        self.top += (self.target_top - self.top).signum();
    }
}

fn kind_label(kind: &TileKind) -> &'static str {
    match kind {
        TileKind::Class(_) => "class",
        TileKind::Image(_) => "image",
        TileKind::Color(_) => "color",
    }
}

fn image_file_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if [".png", ".bmp", ".tif", ".tiff"]
        .iter()
        .any(|ext| lower.ends_with(ext))
    {
        name.to_string()
    } else {
        format!("{name}.png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{palette, planes, write_png, BLUE, GREEN, RED};
    use tempfile::TempDir;

    const GREY: Rgba = [128, 128, 128, 255];

    fn registry() -> Rc<GameObjectRegistry> {
        Rc::new(
            GameObjectRegistry::new()
                .with(ObjectClass::tile("wall").with_hardness(10))
                .with(ObjectClass::actor("hero")),
        )
    }

    fn scene(background: &[&[Rgba]], actors: Option<&[&[Rgba]]>, search: SearchPath) -> SceneMap {
        let palette = palette(&[(RED, "wall"), (GREEN, "ground"), (BLUE, "hero")]);
        SceneMap::from_parts(
            planes("test", background, actors, palette),
            SceneConfig::default(),
            search,
            registry(),
        )
    }

    #[test]
    fn content_is_cached_per_cell_and_instances_are_per_cell() {
        let mut map = scene(&[&[RED, RED, GREEN]], None, SearchPath::default());
        let first = map.content_at(Position::new(0, 0));
        let again = map.content_at(Position::new(0, 0));
        let neighbour = map.content_at(Position::new(1, 0));

        assert!(matches!(first, TileContent::Entity(_)));
        assert_eq!(first, again);
        assert_ne!(first, neighbour);
        assert_eq!(map.tile_object_count(), 2);
    }

    #[test]
    fn names_fall_back_from_class_to_image_to_colour() {
        let dir = TempDir::new().expect("temp dir");
        write_png(&dir.path().join("ground.png"), &Bitmap::solid(10, 10, GREY));
        let mut map = scene(
            &[&[RED, GREEN, GREEN, GREY]],
            None,
            SearchPath::new([dir.path()]),
        );

        assert!(matches!(map.content_at(Position::new(0, 0)), TileContent::Entity(_)));
        let ground_a = map.content_at(Position::new(1, 0));
        let ground_b = map.content_at(Position::new(2, 0));
        match (&ground_a, &ground_b) {
            (TileContent::StaticImage(a), TileContent::StaticImage(b)) => {
                assert!(Rc::ptr_eq(a, b));
                assert_eq!(a.size(), (50, 50));
            }
            other => panic!("expected images, got {other:?}"),
        }
        assert_eq!(map.content_at(Position::new(3, 0)), TileContent::Color(GREY));
    }

    #[test]
    fn wide_tile_images_are_scaled_to_the_block_width() {
        let dir = TempDir::new().expect("temp dir");
        write_png(&dir.path().join("ground.png"), &Bitmap::solid(20, 10, GREY));
        let mut map = scene(&[&[GREEN]], None, SearchPath::new([dir.path()]));

        match map.content_at(Position::new(0, 0)) {
            TileContent::StaticImage(image) => assert_eq!(image.size(), (50, 25)),
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[test]
    fn unnamed_image_lookups_fall_back_to_the_palette_colour() {
        let mut map = scene(&[&[GREEN]], None, SearchPath::default());
        assert_eq!(map.content_at(Position::new(0, 0)), TileContent::Color(GREEN));
    }

    #[test]
    fn positions_outside_the_map_return_the_sentinel_colour() {
        let mut map = scene(&[&[GREEN]], None, SearchPath::default());
        let sentinel = map.config().out_of_map;
        assert_eq!(map.content_at(Position::new(-1, 0)), TileContent::Color(sentinel));
        assert_eq!(map.content_at(Position::new(0, 5)), TileContent::Color(sentinel));
        assert!(map.peek(Position::new(-1, 0)).is_none());
    }

    #[test]
    fn hardness_comes_from_tile_objects_only() {
        let mut map = scene(&[&[RED, GREEN]], None, SearchPath::default());
        assert_eq!(map.hardness_at(Position::new(0, 0)), 10);
        assert_eq!(map.hardness_at(Position::new(1, 0)), 0);
    }

    #[test]
    fn spawns_skip_transparent_and_unregistered_pixels() {
        let clear = [0, 0, 0, 0];
        let mut map = scene(
            &[&[GREEN, GREEN, GREEN]],
            Some(&[&[clear, BLUE, GREY]]),
            SearchPath::default(),
        );
        assert!(map.spawn_class_at(Position::new(0, 0)).is_none());
        assert!(map.spawn_class_at(Position::new(2, 0)).is_none());
        let spawns = map.actor_spawns();
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].0, Position::new(1, 0));
        assert_eq!(spawns[0].1.name(), "hero");
    }

    #[test]
    fn missing_object_images_use_the_palette_colour() {
        let mut map = scene(&[&[GREEN]], None, SearchPath::default());
        let class = map.registry().get("hero").cloned().expect("hero class");
        let hero = map.instantiate(&class, Position::new(0, 0));
        let image = hero.body.image.clone().expect("placeholder");
        assert_eq!(image.size(), (50, 50));
        assert_eq!(image.pixel(0, 0), Some(BLUE));

        let other = map.instantiate(&class, Position::new(0, 0));
        assert_ne!(hero.id(), other.id());
    }

    #[test]
    fn removing_a_tile_object_leaves_the_plain_colour() {
        let mut map = scene(&[&[RED]], None, SearchPath::default());
        let TileContent::Entity(id) = map.content_at(Position::new(0, 0)) else {
            panic!("wall should be an entity");
        };
        assert!(map.remove_tile_object(id).is_some());
        assert_eq!(map.content_at(Position::new(0, 0)), TileContent::Color(RED));
    }

    fn wide_scene() -> SceneMap {
        let row = vec![GREEN; 40];
        let rows: Vec<&[Rgba]> = (0..30).map(|_| row.as_slice()).collect();
        scene(&rows, None, SearchPath::default())
    }

    #[test]
    fn scroll_target_is_clamped_to_margins() {
        let mut map = wide_scene();
        map.request_scroll(Position::new(-100, 100));
        map.tick();
        assert_eq!(map.target_left(), -3);
        assert_eq!(map.target_top(), 30 - 12 + 3);

        map.set_scroll_target(Some(1000), Some(-1000));
        map.tick();
        assert_eq!(map.target_left(), 40 - 16 + 3);
        assert_eq!(map.target_top(), -3);
    }

    #[test]
    fn viewport_steps_once_per_scroll_rate() {
        let mut map = wide_scene();
        map.set_scroll_target(Some(5), Some(2));
        for _ in 0..7 {
            map.tick();
        }
        assert_eq!((map.left(), map.top()), (0, 0));
        map.tick();
        assert_eq!((map.left(), map.top()), (1, 1));
        for _ in 0..8 {
            map.tick();
        }
        assert_eq!((map.left(), map.top()), (2, 2));
        for _ in 0..8 {
            map.tick();
        }
        assert_eq!((map.left(), map.top()), (3, 2));
    }

    #[test]
    fn small_maps_clamp_to_the_lower_bound() {
        let mut map = scene(&[&[GREEN]], None, SearchPath::default());
        map.set_scroll_target(Some(4), Some(4));
        assert_eq!((map.target_left(), map.target_top()), (-3, -3));
    }

    #[test]
    fn overlay_is_scaled_to_the_map_width() {
        let palette = palette(&[(GREEN, "ground")]);
        let mut parts = planes("test", &[&[GREEN, GREEN]], None, palette);
        parts.overlay = Some(Bitmap::solid(10, 5, GREY));
        let map = SceneMap::from_parts(
            parts,
            SceneConfig::default(),
            SearchPath::default(),
            registry(),
        );
        assert_eq!(map.overlay().map(Bitmap::size), Some((100, 50)));
    }

    #[test]
    fn image_names_get_a_png_extension_unless_they_have_one() {
        assert_eq!(image_file_name("wall"), "wall.png");
        assert_eq!(image_file_name("Wall.PNG"), "Wall.PNG");
        assert_eq!(image_file_name("old.bmp"), "old.bmp");
    }
}
