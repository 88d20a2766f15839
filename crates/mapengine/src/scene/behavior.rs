use super::command::{Command, CommandQueue};
use super::event::Diary;
use super::object::{Body, ObjectId};
use super::position::{direction, Position};

/// The viewport as seen from inside a hook, in cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookView {
    pub left: i32,
    pub top: i32,
    pub blocks_x: i32,
    pub blocks_y: i32,
    pub map_width: i32,
    pub map_height: i32,
}

impl HookView {
    pub fn contains(&self, pos: Position) -> bool {
        (self.left..self.left + self.blocks_x).contains(&pos.x)
            && (self.top..self.top + self.blocks_y).contains(&pos.y)
    }
}

/// A movement an object asks for. The controller resolves it against the scene right after
/// the hook returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRequest {
    /// Rate-limited, hardness-gated step. A zero direction only spends the move window.
    Step(Position),
    /// Steps in `direction` only when the cell there is softer than the object's weight.
    Fall(Position),
}

/// Everything a hook may touch besides the objects it is handed.
pub struct HookContext<'a> {
    pub commands: &'a mut CommandQueue,
    pub diary: &'a mut Diary,
    view: HookView,
    moves: Vec<(ObjectId, MoveRequest)>,
}

impl<'a> HookContext<'a> {
    pub fn new(commands: &'a mut CommandQueue, diary: &'a mut Diary, view: HookView) -> Self {
        Self {
            commands,
            diary,
            view,
            moves: Vec::new(),
        }
    }

    pub fn view(&self) -> HookView {
        self.view
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn request_move(&mut self, body: &Body, request: MoveRequest) {
        self.moves.push((body.id, request));
    }

    pub fn pending_moves(&self) -> &[(ObjectId, MoveRequest)] {
        &self.moves
    }

    pub(crate) fn take_moves(&mut self) -> Vec<(ObjectId, MoveRequest)> {
        std::mem::take(&mut self.moves)
    }
}

/// Per-object capability. Every hook defaults to doing nothing.
pub trait Behavior {
    fn update(&mut self, _body: &mut Body, _ctx: &mut HookContext<'_>) {}

    /// `other` overlaps `body`.
    fn on_over(&mut self, _body: &mut Body, _other: &mut Body, _ctx: &mut HookContext<'_>) {}

    /// `other` tried to step into `body`'s cell. Runs whether or not the step succeeds.
    fn on_touch(&mut self, _body: &mut Body, _other: &mut Body, _ctx: &mut HookContext<'_>) {}

    /// Fire was pressed while `body` is the main character.
    fn on_fire(&mut self, _body: &mut Body, _ctx: &mut HookContext<'_>) {}
}

/// Falls one cell per move window while the cell below is softer than the object's weight.
#[derive(Debug, Clone, Copy)]
pub struct Gravity {
    pub direction: Position,
}

impl Default for Gravity {
    fn default() -> Self {
        Self {
            direction: direction::DOWN,
        }
    }
}

impl Behavior for Gravity {
    fn update(&mut self, body: &mut Body, ctx: &mut HookContext<'_>) {
        ctx.request_move(body, MoveRequest::Fall(self.direction));
    }
}

/// Pushes the scroll target so the object stays at least `margin` cells inside the viewport.
#[derive(Debug, Clone, Copy)]
pub struct CameraFollow {
    pub margin: i32,
}

impl Default for CameraFollow {
    fn default() -> Self {
        Self { margin: 2 }
    }
}

impl CameraFollow {
    fn follow_axis(pos: i32, origin: i32, span: i32, margin: i32) -> Option<i32> {
        if pos <= origin + margin {
            Some(pos - margin)
        } else if pos > origin + span - margin - 1 {
            Some(pos - span + margin + 1)
        } else {
            None
        }
    }
}

impl Behavior for CameraFollow {
    fn update(&mut self, body: &mut Body, ctx: &mut HookContext<'_>) {
        let view = ctx.view();
        let left = Self::follow_axis(body.pos.x, view.left, view.blocks_x, self.margin);
        let top = Self::follow_axis(body.pos.y, view.top, view.blocks_y, self.margin);
        if left.is_some() || top.is_some() {
            ctx.push(Command::SetScrollTarget { left, top });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> HookView {
        HookView {
            left: 0,
            top: 0,
            blocks_x: 16,
            blocks_y: 12,
            map_width: 40,
            map_height: 30,
        }
    }

    #[test]
    fn camera_stays_put_while_inside_the_margin_band() {
        assert_eq!(CameraFollow::follow_axis(5, 0, 16, 2), None);
        assert_eq!(CameraFollow::follow_axis(13, 0, 16, 2), None);
    }

    #[test]
    fn camera_pushes_outward_near_either_edge() {
        assert_eq!(CameraFollow::follow_axis(2, 0, 16, 2), Some(0));
        assert_eq!(CameraFollow::follow_axis(1, 0, 16, 2), Some(-1));
        assert_eq!(CameraFollow::follow_axis(14, 0, 16, 2), Some(1));
        assert_eq!(CameraFollow::follow_axis(20, 4, 16, 2), Some(7));
    }

    #[test]
    fn view_containment_uses_half_open_ranges() {
        let view = view();
        assert!(view.contains(Position::new(15, 11)));
        assert!(!view.contains(Position::new(16, 0)));
        assert!(!view.contains(Position::new(0, -1)));
    }
}
