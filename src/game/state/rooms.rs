use super::ServerState;
use crate::game::color::random_color;
use crate::game::constants::{MAX_SPAWN_ATTEMPTS, TOKEN_LENGTH};
use crate::game::types::{Direction, Food, PlayerId, Room, RoomId, RoomView, Snake, Vector2};
use crate::protocol::{SessionError, TYPE_CREATE, TYPE_JOIN};
use crate::shared::tokens::random_token;
use rand::Rng;
use std::collections::HashSet;

impl ServerState {
  /// Opens a room owned by `player_id`. `Ok(None)` when the player already
  /// has a room, which clients treat as a silent no-op.
  pub fn create_room(&mut self, player_id: PlayerId) -> Result<Option<RoomView>, SessionError> {
    let Some(player) = self.players.get(&player_id) else {
      return Err(SessionError::NotConnected(TYPE_CREATE));
    };
    if player.room.is_some() {
      return Ok(None);
    }

    let room_id = self.fresh_room_id();
    let mut room = Room::new(room_id.clone());
    room.players.insert(player_id);
    self.rooms.insert(room_id.clone(), room);
    let snake = self.spawn_snake(&room_id);
    if let Some(player) = self.players.get_mut(&player_id) {
      player.room = Some(room_id.clone());
      player.snake = Some(snake);
    }

    tracing::info!(player_id, room_id = %room_id, "room created");
    Ok(self.room_view(&room_id))
  }

  pub fn join_room(&mut self, player_id: PlayerId, room_id: &str) -> Result<Snake, SessionError> {
    let room_id = room_id.trim().to_ascii_uppercase();
    if !self.rooms.contains_key(&room_id) {
      return Err(SessionError::RoomNotFound);
    }
    let Some(player) = self.players.get(&player_id) else {
      return Err(SessionError::NotConnected(TYPE_JOIN));
    };
    if player.room.is_some() {
      return Err(SessionError::AlreadyInRoom);
    }

    let snake = self.spawn_snake(&room_id);
    let Some(room) = self.rooms.get_mut(&room_id) else {
      return Err(SessionError::RoomNotFound);
    };
    room.players.insert(player_id);
    let total_players = room.players.len();
    if let Some(player) = self.players.get_mut(&player_id) {
      player.room = Some(room_id.clone());
      player.snake = Some(snake.clone());
    }

    tracing::info!(player_id, room_id = %room_id, total_players, "player joined room");
    Ok(snake)
  }

  /// Drops the player's room membership and snake. Returns false when the
  /// player had no room.
  pub fn leave_room(&mut self, player_id: PlayerId) -> bool {
    let Some(player) = self.players.get_mut(&player_id) else { return false };
    let Some(room_id) = player.room.take() else { return false };
    player.snake = None;
    if let Some(room) = self.rooms.get_mut(&room_id) {
      room.players.remove(&player_id);
    }
    tracing::info!(player_id, room_id = %room_id, "player left room");
    true
  }

  pub fn prune_empty_rooms(&mut self) -> Vec<RoomId> {
    let empty: Vec<RoomId> = self
      .rooms
      .values()
      .filter(|room| room.players.is_empty())
      .map(|room| room.id.clone())
      .collect();
    for room_id in &empty {
      self.rooms.remove(room_id);
      tracing::info!(room_id = %room_id, "removed empty room");
    }
    empty
  }

  pub(super) fn room_view(&self, room_id: &str) -> Option<RoomView> {
    let room = self.rooms.get(room_id)?;
    Some(RoomView {
      id: room.id.clone(),
      players: room
        .players
        .iter()
        .filter_map(|id| self.players.get(id))
        .map(|player| player.view())
        .collect(),
      foods: room.foods.clone(),
    })
  }

  pub(super) fn spawn_food(&mut self, room_id: &str) {
    let position = self.free_cell(room_id);
    if let Some(room) = self.rooms.get_mut(room_id) {
      room.foods.push(Food { position });
    }
  }

  fn spawn_snake(&mut self, room_id: &str) -> Snake {
    let head = self.free_cell(room_id);
    let direction = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
    let color = random_color(&mut self.rng);
    Snake::new(head, direction, color)
  }

  fn fresh_room_id(&mut self) -> RoomId {
    loop {
      let candidate = random_token(&mut self.rng, TOKEN_LENGTH);
      if !self.rooms.contains_key(&candidate) {
        return candidate;
      }
    }
  }

  /// A random cell not covered by any snake or food of the room. Gives up
  /// after a bounded number of tries and returns the last candidate.
  fn free_cell(&mut self, room_id: &str) -> Vector2 {
    let occupied = self.occupied_cells(room_id);
    let mut candidate = Vector2::new(0, 0);
    for _ in 0..MAX_SPAWN_ATTEMPTS {
      candidate = Vector2::new(
        self.rng.gen_range(0..self.settings.width),
        self.rng.gen_range(0..self.settings.height),
      );
      if !occupied.contains(&candidate) {
        break;
      }
    }
    candidate
  }

  fn occupied_cells(&self, room_id: &str) -> HashSet<Vector2> {
    let Some(room) = self.rooms.get(room_id) else { return HashSet::new() };
    let snake_cells = room
      .players
      .iter()
      .filter_map(|id| self.players.get(id))
      .filter_map(|player| player.snake.as_ref())
      .flat_map(|snake| snake.body.iter().copied());
    let food_cells = room.foods.iter().map(|food| food.position);
    snake_cells.chain(food_cells).collect()
  }
}
