use super::constants::TOKEN_LENGTH;
use super::types::{Direction, Player, PlayerId, PlayerPublic, Room, RoomId, WorldSettings};
use crate::protocol::{ServerMessage, SessionError};
use crate::shared::names::sanitize_player_name;
use crate::shared::tokens::random_token;
use crate::transport::outbound::ConnectionHandle;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use uuid::Uuid;

mod rooms;
mod simulation;
#[cfg(test)]
mod tests;

/// Everything the handlers, the simulation loop and the reaper share. Lives
/// behind a single lock; every method here is pure in-memory work.
#[derive(Debug)]
pub struct ServerState {
  settings: WorldSettings,
  players: BTreeMap<PlayerId, Player>,
  rooms: BTreeMap<RoomId, Room>,
  next_player_id: PlayerId,
  rng: StdRng,
}

/// Work produced under the lock and performed after it is released.
#[derive(Debug)]
pub enum Outbound {
  Send {
    connection: ConnectionHandle,
    payload: String,
  },
  Close(ConnectionHandle),
}

impl Outbound {
  pub fn message(connection: &ConnectionHandle, message: &ServerMessage) -> Option<Self> {
    match message.encode() {
      Ok(payload) => Some(Outbound::Send {
        connection: connection.clone(),
        payload,
      }),
      Err(error) => {
        tracing::warn!(?error, "failed to encode outbound message");
        None
      }
    }
  }

  pub fn deliver(self) {
    match self {
      Outbound::Send { connection, payload } => {
        if !connection.send_text(payload) {
          tracing::warn!(connection_id = %connection.id(), "dropping write to closed connection");
        }
      }
      Outbound::Close(connection) => connection.close(),
    }
  }
}

impl ServerState {
  pub fn new(settings: WorldSettings) -> Self {
    Self::with_rng(settings, StdRng::from_entropy())
  }

  #[cfg(test)]
  pub fn with_seed(settings: WorldSettings, seed: u64) -> Self {
    Self::with_rng(settings, StdRng::seed_from_u64(seed))
  }

  fn with_rng(settings: WorldSettings, rng: StdRng) -> Self {
    Self {
      settings,
      players: BTreeMap::new(),
      rooms: BTreeMap::new(),
      next_player_id: 0,
      rng,
    }
  }

  #[cfg(test)]
  pub fn player(&self, id: PlayerId) -> Option<&Player> {
    self.players.get(&id)
  }

  #[cfg(test)]
  pub fn room(&self, id: &str) -> Option<&Room> {
    self.rooms.get(id)
  }

  /// True while `connection_id` is the live connection of player `id`.
  pub fn is_bound(&self, id: PlayerId, connection_id: Uuid) -> bool {
    self
      .players
      .get(&id)
      .and_then(|player| player.connection.as_ref())
      .is_some_and(|connection| connection.id() == connection_id)
  }

  pub fn connect(&mut self, name: &str, connection: ConnectionHandle, now: i64) -> PlayerPublic {
    let id = self.next_player_id;
    self.next_player_id += 1;
    let player = Player {
      id,
      name: sanitize_player_name(name),
      unique_id: random_token(&mut self.rng, TOKEN_LENGTH),
      room: None,
      snake: None,
      connection: Some(connection),
      last_active: now,
    };
    let public = player.public();
    self.players.insert(id, player);
    tracing::info!(player_id = id, name = %public.name, "player connected");
    public
  }

  /// Rebinds `connection` to the player matching `(id, unique_id)`. The
  /// previous connection, if it is a different one, is returned so the
  /// caller can close it once the lock is released.
  pub fn reconnect(
    &mut self,
    id: PlayerId,
    unique_id: &str,
    connection: ConnectionHandle,
    now: i64,
  ) -> Result<(PlayerPublic, Option<ConnectionHandle>), SessionError> {
    let Some(player) = self.players.get_mut(&id) else {
      return Err(SessionError::ReconnectFailed);
    };
    if player.unique_id != unique_id {
      return Err(SessionError::ReconnectFailed);
    }
    let previous = player
      .connection
      .replace(connection.clone())
      .filter(|previous| !previous.same_as(&connection));
    player.last_active = now;
    tracing::info!(
      player_id = id,
      room_id = ?player.room,
      evicted = previous.is_some(),
      "player reconnected"
    );
    Ok((player.public(), previous))
  }

  /// Detaches the player from `connection_id` if it is still the live one.
  /// Room membership is kept so a reconnect can resume in place.
  pub fn mark_disconnected(&mut self, id: PlayerId, connection_id: Uuid, now: i64) -> bool {
    let Some(player) = self.players.get_mut(&id) else { return false };
    let is_current = player
      .connection
      .as_ref()
      .is_some_and(|connection| connection.id() == connection_id);
    if !is_current {
      return false;
    }
    player.connection = None;
    player.last_active = now;
    tracing::info!(player_id = id, room_id = ?player.room, "player detached");
    true
  }

  /// Queues a heading change for the next tick. Returns whether it was
  /// accepted; players without a snake are ignored.
  pub fn steer(&mut self, id: PlayerId, direction: Direction) -> bool {
    self
      .players
      .get_mut(&id)
      .and_then(|player| player.snake.as_mut())
      .is_some_and(|snake| snake.steer(direction))
  }
}
