use super::{Outbound, ServerState};
use crate::game::types::{PlayerId, RoomSnapshot, Snake};
use crate::protocol::ServerMessage;

impl ServerState {
  /// Runs one simulation step over every room and returns the writes it
  /// produced. Rooms are visited in id order and players in id order.
  pub fn tick(&mut self) -> Vec<Outbound> {
    let mut outbound = Vec::new();
    let room_ids: Vec<String> = self.rooms.keys().cloned().collect();
    for room_id in &room_ids {
      self.tick_room(room_id, &mut outbound);
    }
    self.prune_empty_rooms();
    for room_id in &room_ids {
      self.broadcast_room(room_id, &mut outbound);
    }
    outbound
  }

  /// Evicts players whose connection has been gone longer than the grace
  /// period from their room. The player records stay in the registry.
  pub fn reap_idle(&mut self, now: i64) -> Vec<PlayerId> {
    let timeout = self.settings.player_timeout_ms;
    let expired: Vec<PlayerId> = self
      .players
      .values()
      .filter(|player| player.connection.is_none() && player.room.is_some())
      .filter(|player| now - player.last_active > timeout)
      .map(|player| player.id)
      .collect();
    for player_id in &expired {
      if self.leave_room(*player_id) {
        tracing::info!(player_id, "reaped idle player");
      }
    }
    expired
  }

  fn tick_room(&mut self, room_id: &str, outbound: &mut Vec<Outbound>) {
    let Some(room) = self.rooms.get(room_id) else { return };
    let members: Vec<PlayerId> = room.players.iter().copied().collect();
    let (width, height) = (self.settings.width, self.settings.height);

    for id in &members {
      if let Some(snake) = self.live_snake_mut(*id) {
        snake.advance(width, height);
        if snake.hits_self() {
          snake.dead = true;
        }
      }
    }

    for id in &members {
      let Some(head) = self.live_snake_mut(*id).and_then(|snake| snake.head()) else { continue };
      let Some(room) = self.rooms.get_mut(room_id) else { return };
      let Some(index) = room.foods.iter().position(|food| food.position == head) else { continue };
      room.foods.remove(index);
      self.spawn_food(room_id);
      if let Some(snake) = self.live_snake_mut(*id) {
        snake.grow();
        tracing::debug!(player_id = id, room_id, body_len = snake.body_len, "food eaten");
      }
    }

    // Only snakes alive after the self-collision pass can kill others, so a
    // head-on meeting kills both.
    let alive: Vec<(PlayerId, Snake)> = members
      .iter()
      .filter_map(|id| {
        let snake = self.players.get(id)?.snake.as_ref()?;
        (!snake.dead).then(|| (*id, snake.clone()))
      })
      .collect();
    let crashed: Vec<PlayerId> = alive
      .iter()
      .filter(|(id, snake)| {
        let Some(head) = snake.head() else { return false };
        alive
          .iter()
          .any(|(other_id, other)| other_id != id && other.occupies(head))
      })
      .map(|(id, _)| *id)
      .collect();
    for id in crashed {
      if let Some(snake) = self.live_snake_mut(id) {
        snake.dead = true;
      }
    }

    for id in &members {
      self.remove_if_dead(room_id, *id, outbound);
    }

    let Some(room) = self.rooms.get(room_id) else { return };
    let wanted = room.players.len();
    let mut stocked = room.foods.len();
    while stocked < wanted {
      self.spawn_food(room_id);
      stocked += 1;
    }
  }

  fn live_snake_mut(&mut self, id: PlayerId) -> Option<&mut Snake> {
    self
      .players
      .get_mut(&id)
      .and_then(|player| player.snake.as_mut())
      .filter(|snake| !snake.dead)
  }

  fn remove_if_dead(&mut self, room_id: &str, id: PlayerId, outbound: &mut Vec<Outbound>) {
    let Some(player) = self.players.get_mut(&id) else {
      if let Some(room) = self.rooms.get_mut(room_id) {
        room.players.remove(&id);
      }
      return;
    };
    if player.snake.as_ref().is_some_and(|snake| !snake.dead) {
      return;
    }

    let view = player.view();
    player.snake = None;
    player.room = None;
    if let Some(connection) = &player.connection {
      outbound.extend(Outbound::message(connection, &ServerMessage::SnakeDead(view)));
    }
    if let Some(room) = self.rooms.get_mut(room_id) {
      room.players.remove(&id);
    }
    tracing::debug!(player_id = id, room_id, "snake died");
  }

  fn broadcast_room(&self, room_id: &str, outbound: &mut Vec<Outbound>) {
    let Some(room) = self.rooms.get(room_id) else { return };
    if room.players.is_empty() {
      return;
    }
    let snapshot = RoomSnapshot {
      snakes: room
        .players
        .iter()
        .filter_map(|id| self.players.get(id))
        .map(|player| player.view())
        .collect(),
      foods: room.foods.clone(),
    };
    let message = ServerMessage::BroadcastRoom(snapshot);
    let payload = match message.encode() {
      Ok(payload) => payload,
      Err(error) => {
        tracing::warn!(?error, room_id, "failed to encode room broadcast");
        return;
      }
    };
    for player in room.players.iter().filter_map(|id| self.players.get(id)) {
      if let Some(connection) = &player.connection {
        outbound.push(Outbound::Send {
          connection: connection.clone(),
          payload: payload.clone(),
        });
      }
    }
  }
}
