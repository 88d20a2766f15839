use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::behavior::Behavior;
use crate::content::SpriteSheetSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Sits in its cell. Only reacts through hooks.
    Tile,
    /// Moves, blinks and gets updated every tick.
    Actor,
}

pub type BehaviorFactory = Rc<dyn Fn() -> Box<dyn Behavior>>;

/// Static description of a kind of game object. Instances are created from it whenever a
/// map cell or actor-plane pixel names it.
#[derive(Clone)]
pub struct ObjectClass {
    name: String,
    kind: ObjectKind,
    hardness: i32,
    strength: i32,
    weight: i32,
    base_move_rate: i64,
    image_name: Option<String>,
    image_sequence: Option<SpriteSheetSpec>,
    background_image: Option<String>,
    auto_flip: bool,
    off_screen_update: bool,
    main_character: bool,
    behaviors: Vec<BehaviorFactory>,
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("hardness", &self.hardness)
            .field("strength", &self.strength)
            .field("base_move_rate", &self.base_move_rate)
            .field("image_sequence", &self.image_sequence)
            .field("main_character", &self.main_character)
            .field("behaviors", &self.behaviors.len())
            .finish()
    }
}

impl ObjectClass {
    fn with_kind(name: &str, kind: ObjectKind) -> Self {
        Self {
            name: name.to_lowercase(),
            kind,
            hardness: 0,
            strength: 4,
            weight: 1,
            base_move_rate: 4,
            image_name: None,
            image_sequence: None,
            background_image: None,
            auto_flip: kind == ObjectKind::Actor,
            off_screen_update: false,
            main_character: false,
            behaviors: Vec::new(),
        }
    }

    pub fn tile(name: &str) -> Self {
        Self::with_kind(name, ObjectKind::Tile)
    }

    pub fn actor(name: &str) -> Self {
        Self::with_kind(name, ObjectKind::Actor)
    }

    pub fn with_hardness(mut self, hardness: i32) -> Self {
        self.hardness = hardness;
        self
    }

    pub fn with_strength(mut self, strength: i32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_move_rate(mut self, ticks: i64) -> Self {
        self.base_move_rate = ticks.max(1);
        self
    }

    /// Image file stem. Defaults to the class name.
    pub fn with_image(mut self, name: &str) -> Self {
        self.image_name = Some(name.to_string());
        self
    }

    pub fn with_image_sequence(mut self, sheet: SpriteSheetSpec) -> Self {
        self.image_sequence = Some(sheet);
        self
    }

    /// Drawn beneath the object's own image.
    pub fn with_background_image(mut self, name: &str) -> Self {
        self.background_image = Some(name.to_string());
        self
    }

    pub fn with_auto_flip(mut self, auto_flip: bool) -> Self {
        self.auto_flip = auto_flip;
        self
    }

    pub fn updates_off_screen(mut self) -> Self {
        self.off_screen_update = true;
        self
    }

    /// The controller follows and steers the first actor of a main-character class.
    pub fn main_character(mut self) -> Self {
        self.main_character = true;
        self
    }

    pub fn with_behavior<F, B>(mut self, factory: F) -> Self
    where
        F: Fn() -> B + 'static,
        B: Behavior + 'static,
    {
        self.behaviors
            .push(Rc::new(move || Box::new(factory()) as Box<dyn Behavior>));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn hardness(&self) -> i32 {
        self.hardness
    }

    pub fn strength(&self) -> i32 {
        self.strength
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn base_move_rate(&self) -> i64 {
        self.base_move_rate
    }

    pub fn image_name(&self) -> &str {
        self.image_name.as_deref().unwrap_or(&self.name)
    }

    pub fn image_sequence(&self) -> Option<&SpriteSheetSpec> {
        self.image_sequence.as_ref()
    }

    pub fn background_image(&self) -> Option<&str> {
        self.background_image.as_deref()
    }

    pub fn auto_flip(&self) -> bool {
        self.auto_flip
    }

    pub fn off_screen_update(&self) -> bool {
        self.off_screen_update
    }

    pub fn is_main_character(&self) -> bool {
        self.main_character
    }

    pub(crate) fn build_behaviors(&self) -> Vec<Box<dyn Behavior>> {
        self.behaviors.iter().map(|factory| factory()).collect()
    }
}

/// Name to class directory, built once at startup and shared by every scene.
#[derive(Debug, Default)]
pub struct GameObjectRegistry {
    classes: HashMap<String, Rc<ObjectClass>>,
}

impl GameObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `class` under its lowercase name. A later registration replaces an earlier
    /// one.
    pub fn register(&mut self, class: ObjectClass) -> Rc<ObjectClass> {
        let class = Rc::new(class);
        if let Some(previous) = self
            .classes
            .insert(class.name().to_string(), Rc::clone(&class))
        {
            warn!(class = previous.name(), "object_class_replaced");
        }
        class
    }

    pub fn with(mut self, class: ObjectClass) -> Self {
        self.register(class);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Rc<ObjectClass>> {
        self.classes.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
