use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use super::behavior::{Behavior, HookContext};
use super::command::{BlobId, Command, CommandQueue};
use super::config::seconds_to_ticks;
use super::event::{AttrValue, Event};
use super::position::{direction, Facing, Position};
use super::registry::{ObjectClass, ObjectKind};
use crate::app::rendering::PixelRect;
use crate::content::{Bitmap, FacingImages};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-instance state of a game object. Hooks receive it mutably.
#[derive(Debug)]
pub struct Body {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    pub pos: Position,
    pub old_pos: Position,
    pub tick: i64,
    /// 0 is passable; movers need at least this much strength to enter.
    pub hardness: i32,
    pub strength: i32,
    /// Falls through cells whose hardness is below this.
    pub weight: i32,
    /// Minimum ticks between two accepted moves.
    pub base_move_rate: i64,
    pub move_counter: i64,
    pub move_direction: Position,
    /// Tick of the last accepted move.
    pub move_direction_count: i64,
    /// Fraction of a cell covered per tick while interpolating; 0 when idle.
    pub speed: f32,
    pub blinking: bool,
    pub showing_text: bool,
    pub off_screen_update: bool,
    /// What gets drawn this tick. `None` while blinked off.
    pub image: Option<Rc<Bitmap>>,
    base_image: Option<Rc<Bitmap>>,
    images: Option<FacingImages>,
    events: Vec<Event>,
    text_queue: VecDeque<(String, Option<f32>)>,
    next_blob: u32,
    current_blob: Option<BlobId>,
    /// Attributes without a dedicated field.
    pub vars: HashMap<String, AttrValue>,
}

impl Body {
    pub(crate) fn new(
        class: &ObjectClass,
        pos: Position,
        image: Option<Rc<Bitmap>>,
        images: Option<FacingImages>,
    ) -> Self {
        Self {
            id: ObjectId::next(),
            name: class.name().to_string(),
            kind: class.kind(),
            pos,
            old_pos: pos,
            tick: 0,
            hardness: class.hardness(),
            strength: class.strength(),
            weight: class.weight(),
            base_move_rate: class.base_move_rate(),
            move_counter: 0,
            move_direction: direction::RIGHT,
            move_direction_count: 0,
            speed: 0.0,
            blinking: false,
            showing_text: false,
            off_screen_update: class.off_screen_update(),
            image: image.clone(),
            base_image: image,
            images,
            events: Vec::new(),
            text_queue: VecDeque::new(),
            next_blob: 0,
            current_blob: None,
            vars: HashMap::new(),
        }
    }

    pub fn is_actor(&self) -> bool {
        self.kind == ObjectKind::Actor
    }

    /// Grid rectangle in scene pixels.
    pub fn rect(&self, blocksize: u32) -> PixelRect {
        let size = blocksize as i32;
        PixelRect::new(self.pos.x * size, self.pos.y * size, blocksize, blocksize)
    }

    pub fn moving_time(&self) -> i64 {
        self.tick - self.move_direction_count
    }

    pub fn facing(&self) -> Option<Facing> {
        Facing::from_direction(self.move_direction)
    }

    /// Scene-pixel position of the sprite, blended from `old_pos` while moving.
    pub fn draw_offset(&self, blocksize: u32) -> (i32, i32) {
        let size = blocksize as f32;
        if self.speed <= 0.0 {
            return (self.pos.x * blocksize as i32, self.pos.y * blocksize as i32);
        }
        let elapsed = self.moving_time().clamp(0, self.base_move_rate.max(1)) as f32;
        let progress = (self.speed * elapsed).min(1.0);
        let blend = |old: i32, new: i32| {
            (old as f32 * size + (new - old) as f32 * size * progress).round() as i32
        };
        (
            blend(self.old_pos.x, self.pos.x),
            blend(self.old_pos.y, self.pos.y),
        )
    }

    /// Schedules `event`, replacing any pending event with the same key.
    pub fn add_event(&mut self, event: Event) {
        self.events.retain(|pending| pending.key() != event.key());
        self.events.push(event);
    }

    pub fn has_event(&self, key: &str) -> bool {
        self.events.iter().any(|event| event.key() == key)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Counts every pending event down one tick and applies the ones that came due.
    pub fn process_events(&mut self, commands: &mut CommandQueue) {
        let mut due = Vec::new();
        for mut event in std::mem::take(&mut self.events) {
            if event.tick() {
                due.push(event);
            } else {
                self.events.push(event);
            }
        }
        for event in due {
            event.apply(self, commands);
        }
    }

    pub fn set_attribute(&mut self, attribute: &str, value: AttrValue) {
        let applied = match attribute {
            "strength" => assign_int(&mut self.strength, &value),
            "hardness" => assign_int(&mut self.hardness, &value),
            "weight" => assign_int(&mut self.weight, &value),
            "base_move_rate" => value
                .as_int()
                .map(|rate| self.base_move_rate = rate.max(1))
                .is_some(),
            "blinking" => value.as_bool().map(|on| self.blinking = on).is_some(),
            "showing_text" => value.as_bool().map(|on| self.showing_text = on).is_some(),
            _ => {
                self.vars.insert(attribute.to_string(), value.clone());
                true
            }
        };
        if !applied {
            warn!(object = %self.id, attribute, value = ?value, "attribute_type_mismatch");
        }
    }

    /// Replaces the drawn image. Drops any sprite-sheet animation.
    pub fn set_image(&mut self, image: Rc<Bitmap>) {
        self.images = None;
        self.base_image = Some(Rc::clone(&image));
        self.image = Some(image);
    }

    pub fn var(&self, name: &str) -> Option<&AttrValue> {
        self.vars.get(name)
    }

    /// Shows `message` in a blob under this object, or queues it while another one is up.
    /// With a duration in seconds, the blob goes away on its own.
    pub fn show_text(&mut self, message: impl Into<String>, duration: Option<f32>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.text_queue.push_back((message, duration));
    }

    pub fn queued_texts(&self) -> usize {
        self.text_queue.len()
    }

    pub fn current_blob(&self) -> Option<BlobId> {
        self.current_blob
    }

    fn dequeue_text(&mut self, commands: &mut CommandQueue) {
        if self.showing_text {
            return;
        }
        let Some((text, duration)) = self.text_queue.pop_front() else {
            return;
        };
        let blob = BlobId {
            owner: self.id,
            serial: self.next_blob,
        };
        self.next_blob += 1;
        self.current_blob = Some(blob);
        self.showing_text = true;
        commands.push(Command::ShowText { blob, text });

        if let Some(seconds) = duration.filter(|seconds| *seconds > 0.0) {
            let ticks = seconds_to_ticks(seconds);
            self.add_event(Event::invoke(ticks, "dismiss_text", move |_, commands| {
                commands.push(Command::DismissText(blob));
            }));
            self.add_event(Event::assign(ticks, "showing_text", false));
        }
    }

    fn refresh_animation(&mut self) {
        let rate = self.base_move_rate.max(1);
        let moving_time = self.moving_time();
        if moving_time as f32 > 1.5 * rate as f32 {
            self.speed = 0.0;
        }

        let Some(images) = &self.images else {
            return;
        };
        let Some(facing) = self.facing() else {
            return;
        };
        let frames = images.frames(facing);
        let Some(resting) = frames.first() else {
            return;
        };
        let frame = if self.speed <= 0.0 || frames.len() == 1 {
            resting
        } else {
            let index = (moving_time.max(0) / rate) as usize % (frames.len() - 1);
            &frames[index + 1]
        };
        self.base_image = Some(Rc::clone(frame));
        self.image = self.base_image.clone();
    }
}

fn assign_int(slot: &mut i32, value: &AttrValue) -> bool {
    match value.as_int() {
        Some(number) => {
            *slot = number as i32;
            true
        }
        None => false,
    }
}

/// A placed instance of an [`ObjectClass`]: its state plus its behaviours.
pub struct GameObject {
    pub body: Body,
    class: Rc<ObjectClass>,
    behaviors: Vec<Box<dyn Behavior>>,
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("body", &self.body)
            .field("class", &self.class.name())
            .field("behaviors", &self.behaviors.len())
            .finish()
    }
}

impl GameObject {
    pub(crate) fn new(class: Rc<ObjectClass>, body: Body) -> Self {
        let behaviors = class.build_behaviors();
        Self {
            body,
            class,
            behaviors,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.body.id
    }

    pub fn pos(&self) -> Position {
        self.body.pos
    }

    pub fn class(&self) -> &Rc<ObjectClass> {
        &self.class
    }

    pub fn is_main_character(&self) -> bool {
        self.class.is_main_character()
    }

    /// One tick: timed events, animation frame, queued text, blink and move pacing, then
    /// behaviours.
    pub fn update(&mut self, ctx: &mut HookContext<'_>) {
        self.body.process_events(ctx.commands);
        self.body.tick += 1;
        self.body.refresh_animation();
        self.body.dequeue_text(ctx.commands);
        if self.body.is_actor() {
            self.body.image = if self.body.blinking && self.body.tick % 2 == 1 {
                None
            } else {
                self.body.base_image.clone()
            };
            self.body.move_counter += 1;
        }
        for behavior in &mut self.behaviors {
            behavior.update(&mut self.body, ctx);
        }
    }

    /// `other` overlaps this object.
    pub fn on_over(&mut self, other: &mut Body, ctx: &mut HookContext<'_>) {
        for behavior in &mut self.behaviors {
            behavior.on_over(&mut self.body, other, ctx);
        }
        self.settle_tile_text(ctx);
    }

    /// `other` tried to move into this object's cell.
    pub fn on_touch(&mut self, other: &mut Body, ctx: &mut HookContext<'_>) {
        for behavior in &mut self.behaviors {
            behavior.on_touch(&mut self.body, other, ctx);
        }
        self.settle_tile_text(ctx);
    }

    pub fn on_fire(&mut self, ctx: &mut HookContext<'_>) {
        for behavior in &mut self.behaviors {
            behavior.on_fire(&mut self.body, ctx);
        }
        self.settle_tile_text(ctx);
    }

    /// Tile objects never tick, so text they ask for is shown as soon as their hooks return.
    fn settle_tile_text(&mut self, ctx: &mut HookContext<'_>) {
        if !self.body.is_actor() {
            self.body.dequeue_text(ctx.commands);
        }
    }
}
