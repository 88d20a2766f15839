use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Integer grid coordinate. Used both for map cells and for screen cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, other: Position) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<i32> for Position {
    type Output = Position;

    fn mul(self, factor: i32) -> Position {
        Position::new(self.x * factor, self.y * factor)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

pub mod direction {
    use super::Position;

    pub const RIGHT: Position = Position::new(1, 0);
    pub const LEFT: Position = Position::new(-1, 0);
    pub const UP: Position = Position::new(0, -1);
    pub const DOWN: Position = Position::new(0, 1);
    pub const PAUSE: Position = Position::new(0, 0);
}

/// Which way an object's sprite row points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Right,
    Left,
    Up,
    Down,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::Right, Facing::Left, Facing::Up, Facing::Down];

    /// Only the four unit directions have a facing.
    pub fn from_direction(direction: Position) -> Option<Facing> {
        match (direction.x, direction.y) {
            (1, 0) => Some(Facing::Right),
            (-1, 0) => Some(Facing::Left),
            (0, -1) => Some(Facing::Up),
            (0, 1) => Some(Facing::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Right => "right",
            Facing::Left => "left",
            Facing::Up => "up",
            Facing::Down => "down",
        }
    }
}
