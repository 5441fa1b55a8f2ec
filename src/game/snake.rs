use super::constants::STARTING_LENGTH;
use super::types::{Direction, Snake, Vector2};
use std::collections::VecDeque;

/// Wraps a cell onto a `width` x `height` torus.
pub fn wrap(cell: Vector2, width: i32, height: i32) -> Vector2 {
  Vector2 {
    x: cell.x.rem_euclid(width),
    y: cell.y.rem_euclid(height),
  }
}

impl Snake {
  pub fn new(head: Vector2, direction: Direction, color: String) -> Self {
    Self {
      body: VecDeque::from(vec![head]),
      body_len: STARTING_LENGTH,
      direction,
      color,
      dead: false,
    }
  }

  pub fn head(&self) -> Option<Vector2> {
    self.body.front().copied()
  }

  /// Moves one cell along `direction`. Growth is realized by the tail trim
  /// lagging behind `body_len`.
  pub fn advance(&mut self, width: i32, height: i32) {
    let Some(head) = self.head() else { return };
    let delta = self.direction.delta();
    let next = wrap(
      Vector2::new(head.x + delta.x, head.y + delta.y),
      width,
      height,
    );
    self.body.push_front(next);
    while self.body.len() > self.body_len {
      self.body.pop_back();
    }
  }

  pub fn hits_self(&self) -> bool {
    let Some(head) = self.head() else { return false };
    self.body.iter().skip(1).any(|segment| *segment == head)
  }

  pub fn occupies(&self, cell: Vector2) -> bool {
    self.body.contains(&cell)
  }

  pub fn grow(&mut self) {
    self.body_len += 1;
  }

  /// Applies a heading change unless it reverses a snake longer than one
  /// cell. Returns whether the heading was accepted.
  pub fn steer(&mut self, requested: Direction) -> bool {
    if requested == self.direction.opposite() && self.body_len > 1 {
      return false;
    }
    self.direction = requested;
    true
  }
}
