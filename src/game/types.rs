use crate::transport::outbound::ConnectionHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

pub type PlayerId = u64;
pub type RoomId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector2 {
  pub x: i32,
  pub y: i32,
}

impl Vector2 {
  pub fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }
}

/// Heading on the grid. Serialized as its index: 0=+X, 1=+Y, 2=-X, 3=-Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
  East,
  South,
  West,
  North,
}

impl Direction {
  pub const ALL: [Direction; 4] = [
    Direction::East,
    Direction::South,
    Direction::West,
    Direction::North,
  ];

  pub fn index(self) -> u8 {
    match self {
      Direction::East => 0,
      Direction::South => 1,
      Direction::West => 2,
      Direction::North => 3,
    }
  }

  pub fn from_index(index: u8) -> Option<Self> {
    Self::ALL.get(index as usize).copied()
  }

  pub fn opposite(self) -> Self {
    Self::ALL[((self.index() + 2) % 4) as usize]
  }

  pub fn delta(self) -> Vector2 {
    match self {
      Direction::East => Vector2::new(1, 0),
      Direction::South => Vector2::new(0, 1),
      Direction::West => Vector2::new(-1, 0),
      Direction::North => Vector2::new(0, -1),
    }
  }
}

impl From<Direction> for u8 {
  fn from(direction: Direction) -> Self {
    direction.index()
  }
}

impl TryFrom<u8> for Direction {
  type Error = String;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Direction::from_index(value).ok_or_else(|| format!("direction {value} is out of range"))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snake {
  /// Head first.
  pub body: VecDeque<Vector2>,
  pub body_len: usize,
  #[serde(rename = "dir")]
  pub direction: Direction,
  pub color: String,
  pub dead: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Food {
  pub position: Vector2,
}

#[derive(Debug, Clone)]
pub struct Player {
  pub id: PlayerId,
  pub name: String,
  /// Reconnection secret.
  pub unique_id: String,
  pub room: Option<RoomId>,
  pub snake: Option<Snake>,
  pub connection: Option<ConnectionHandle>,
  pub last_active: i64,
}

impl Player {
  pub fn public(&self) -> PlayerPublic {
    PlayerPublic {
      id: self.id,
      name: self.name.clone(),
      unique_id: self.unique_id.clone(),
    }
  }

  pub fn view(&self) -> PlayerView {
    PlayerView {
      id: self.id,
      name: self.name.clone(),
      unique_id: self.unique_id.clone(),
      room: self.room.clone(),
      snake: self.snake.clone(),
    }
  }
}

/// Identity returned by connect/reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerPublic {
  pub id: PlayerId,
  pub name: String,
  pub unique_id: String,
}

/// Player as seen in room payloads; everything but the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
  pub id: PlayerId,
  pub name: String,
  pub unique_id: String,
  pub room: Option<RoomId>,
  pub snake: Option<Snake>,
}

#[derive(Debug, Clone)]
pub struct Room {
  pub id: RoomId,
  pub players: BTreeSet<PlayerId>,
  pub foods: Vec<Food>,
}

impl Room {
  pub fn new(id: RoomId) -> Self {
    Self {
      id,
      players: BTreeSet::new(),
      foods: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
  pub id: RoomId,
  pub players: Vec<PlayerView>,
  pub foods: Vec<Food>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
  pub snakes: Vec<PlayerView>,
  pub foods: Vec<Food>,
}

/// Arena geometry and grace period shared by every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSettings {
  pub width: i32,
  pub height: i32,
  pub player_timeout_ms: i64,
}
