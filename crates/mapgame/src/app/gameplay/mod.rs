use mapengine::scene::{
    direction, seconds_to_ticks, AttrValue, Behavior, Body, CameraFollow, Command, Event,
    GameObjectRegistry, HookContext, MoveRequest, ObjectClass, Position,
};

use super::manifest::GameManifest;

const HERO: &str = "hero";
const HERO_STRENGTH: i32 = 4;
const HERO_MOVE_RATE: i64 = 4;
const BOOSTED_STRENGTH: i32 = 6;
const WOOD_BOOST_SECONDS: f32 = 5.0;
const GOAT_BOOST_SECONDS: f32 = 10.0;
const BLEAT_SECONDS: f32 = 2.0;
const CAMERA_MARGIN: i32 = 2;
/// Ticks between two patrol steps.
const PATROL_STEP_TICKS: i64 = 12;
const PATROL: [Position; 8] = [
    direction::RIGHT,
    direction::RIGHT,
    direction::RIGHT,
    direction::PAUSE,
    direction::LEFT,
    direction::LEFT,
    direction::LEFT,
    direction::PAUSE,
];
const CHANGER_VAR: &str = "changer_image";

fn is_hero(body: &Body) -> bool {
    body.name == HERO
}

/// Raises the hero's strength and makes it blink until the timer runs out.
fn boost(hero: &mut Body, seconds: f32) {
    let ticks = seconds_to_ticks(seconds);
    hero.strength = BOOSTED_STRENGTH;
    hero.blinking = true;
    hero.add_event(Event::assign(ticks, "blinking", false));
    hero.add_event(Event::assign(ticks, "strength", HERO_STRENGTH));
}

fn bleat(tick: i64) -> String {
    if tick % 5 == 0 {
        return "I should be the killer rabbit of Caerbannog! Bleee! Be afraid!".to_string();
    }
    format!("Ble{}", "e".repeat(1 + (tick.rem_euclid(3)) as usize))
}

/// Touching wood makes whoever touched it strong enough to push through brick for a while.
struct Wood;

impl Behavior for Wood {
    fn on_touch(&mut self, _body: &mut Body, other: &mut Body, _ctx: &mut HookContext<'_>) {
        boost(other, WOOD_BOOST_SECONDS);
    }
}

/// Walks right three cells, rests, walks back, rests.
struct Patrol;

impl Behavior for Patrol {
    fn update(&mut self, body: &mut Body, ctx: &mut HookContext<'_>) {
        if body.tick % PATROL_STEP_TICKS != 0 {
            return;
        }
        let step = (body.tick / PATROL_STEP_TICKS) as usize % PATROL.len();
        ctx.request_move(body, MoveRequest::Step(PATROL[step]));
    }
}

struct Bleat;

impl Behavior for Bleat {
    fn on_over(&mut self, body: &mut Body, other: &mut Body, _ctx: &mut HookContext<'_>) {
        if !is_hero(other) {
            return;
        }
        boost(other, GOAT_BOOST_SECONDS);
        if body.showing_text || body.queued_texts() > 0 {
            return;
        }
        body.show_text(bleat(body.tick), Some(BLEAT_SECONDS));
    }
}

struct Predator;

impl Behavior for Predator {
    fn on_over(&mut self, _body: &mut Body, other: &mut Body, ctx: &mut HookContext<'_>) {
        if is_hero(other) {
            ctx.push(Command::Kill(other.id));
        }
    }
}

/// Terrain that re-skins the hero while it walks over it.
struct ImageChanger {
    image: &'static str,
    move_rate: i64,
}

impl ImageChanger {
    fn new(image: &'static str) -> Self {
        Self {
            image,
            move_rate: HERO_MOVE_RATE,
        }
    }
}

impl Behavior for ImageChanger {
    fn on_over(&mut self, _body: &mut Body, other: &mut Body, ctx: &mut HookContext<'_>) {
        if !is_hero(other) {
            return;
        }
        if let Some(AttrValue::Text(current)) = other.var(CHANGER_VAR) {
            if current == self.image {
                return;
            }
        }
        other.set_attribute(CHANGER_VAR, AttrValue::from(self.image));
        other.base_move_rate = self.move_rate;
        ctx.push(Command::ChangeImage {
            object: other.id,
            image: self.image.to_string(),
        });
    }
}

struct Portal {
    target: String,
}

impl Behavior for Portal {
    fn on_over(&mut self, _body: &mut Body, other: &mut Body, ctx: &mut HookContext<'_>) {
        if is_hero(other) {
            ctx.push(Command::LoadScene(self.target.clone()));
        }
    }
}

/// Every object class the demo scenes use, keyed by palette colour name.
pub(crate) fn build_registry(manifest: &GameManifest) -> GameObjectRegistry {
    let portal_target = manifest.portal_target().to_string();
    GameObjectRegistry::new()
        .with(ObjectClass::tile("wall").with_hardness(10))
        .with(ObjectClass::tile("ground").with_hardness(5))
        .with(ObjectClass::tile("brick").with_hardness(5))
        .with(ObjectClass::tile("wood").with_behavior(|| Wood))
        .with(ObjectClass::tile("ocean").with_behavior(|| ImageChanger::new("hero_boat")))
        .with(ObjectClass::tile("desert").with_behavior(|| ImageChanger::new("hero_desert")))
        .with(ObjectClass::tile("forest").with_behavior(|| ImageChanger::new(HERO)))
        .with(ObjectClass::tile("ice").with_behavior(|| ImageChanger::new("hero_ice")))
        .with(ObjectClass::tile("portal").with_behavior(move || Portal {
            target: portal_target.clone(),
        }))
        .with(
            ObjectClass::actor(HERO)
                .main_character()
                .with_strength(HERO_STRENGTH)
                .with_move_rate(HERO_MOVE_RATE)
                .with_behavior(|| CameraFollow {
                    margin: CAMERA_MARGIN,
                }),
        )
        .with(
            ObjectClass::actor("goat")
                .with_behavior(|| Patrol)
                .with_behavior(|| Bleat),
        )
        .with(
            ObjectClass::actor("wolf")
                .with_behavior(|| Patrol)
                .with_behavior(|| Predator),
        )
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
