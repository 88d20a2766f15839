use super::cut::Cut;
use super::object::ObjectId;
use super::position::Position;

/// Identifies one text blob shown for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId {
    pub owner: ObjectId,
    pub serial: u32,
}

/// Requests from object hooks and events to the controller. Applied once the update and
/// collision phase of a frame is over, in queue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ShowText { blob: BlobId, text: String },
    DismissText(BlobId),
    DismissAllText,
    Kill(ObjectId),
    /// Swaps an object's image for a block image loaded by name.
    ChangeImage { object: ObjectId, image: String },
    LoadScene(String),
    EnterCut(Cut),
    /// Moves the scroll target by a number of cells.
    Scroll(Position),
    SetScrollTarget { left: Option<i32>, top: Option<i32> },
    ForceRedraw,
    SoftReset,
    HardReset,
    Restart,
    GameOver,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub(crate) fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

/// What the loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Reload the initial scene from scratch.
    Restart,
    /// Leave the loop.
    GameOver,
}
