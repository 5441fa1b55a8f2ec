use crate::game::types::{Direction, PlayerId, PlayerPublic, PlayerView, RoomSnapshot, RoomView, Snake};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_CONNECT: &str = "connect";
pub const TYPE_RECONNECT: &str = "reconnect";
pub const TYPE_CREATE: &str = "create";
pub const TYPE_JOIN: &str = "join";
pub const TYPE_DISCONNECT: &str = "disconnect";
pub const TYPE_INPUT: &str = "input";

pub const TYPE_PLAYER: &str = "player";
pub const TYPE_ROOM: &str = "room";
pub const TYPE_SNAKE: &str = "snake";
pub const TYPE_OK: &str = "ok";
pub const TYPE_FAIL: &str = "fail";
pub const TYPE_BROADCAST_ROOM: &str = "broadcast_room";
pub const TYPE_BROADCAST_SNAKE_DED: &str = "broadcast_snake_ded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
  Connect { name: String },
  Reconnect { id: PlayerId, unique_id: String },
  Create,
  Join { room: String },
  Disconnect,
  Input { direction: Direction },
}

impl ClientMessage {
  pub fn kind(&self) -> &'static str {
    match self {
      ClientMessage::Connect { .. } => TYPE_CONNECT,
      ClientMessage::Reconnect { .. } => TYPE_RECONNECT,
      ClientMessage::Create => TYPE_CREATE,
      ClientMessage::Join { .. } => TYPE_JOIN,
      ClientMessage::Disconnect => TYPE_DISCONNECT,
      ClientMessage::Input { .. } => TYPE_INPUT,
    }
  }
}

/// Taxonomy class of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  MalformedMessage,
  PreconditionViolation,
  NotFound,
}

/// Recoverable request failures. The Display text is the reason sent back
/// in the `fail` envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
  #[error("Invalid JSON")]
  InvalidJson,
  #[error("Failed to parse {0} data")]
  MalformedPayload(&'static str),
  #[error("Connect first to access {0}.")]
  NotConnected(&'static str),
  #[error("Already connected as a player.")]
  AlreadyConnected,
  #[error("Already joined another room.")]
  AlreadyInRoom,
  #[error("Join first to disconnect.")]
  NotInRoom,
  #[error("There is no room with that id.")]
  RoomNotFound,
  #[error("Failed to reconnect with that id and unique_id")]
  ReconnectFailed,
}

impl SessionError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      SessionError::InvalidJson | SessionError::MalformedPayload(_) => ErrorKind::MalformedMessage,
      SessionError::NotConnected(_)
      | SessionError::AlreadyConnected
      | SessionError::AlreadyInRoom
      | SessionError::NotInRoom => ErrorKind::PreconditionViolation,
      SessionError::RoomNotFound | SessionError::ReconnectFailed => ErrorKind::NotFound,
    }
  }
}

/// A message that could not be decoded, with the `response` value its
/// `fail` envelope should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
  pub response: &'static str,
  pub error: SessionError,
}

#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamePayload {
  Plain(String),
  Named { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoomPayload {
  Plain(String),
  Named { room: String },
}

#[derive(Debug, Deserialize)]
struct ReconnectPayload {
  id: PlayerId,
  unique_id: String,
}

#[derive(Debug, Deserialize)]
struct InputPayload {
  dir: Direction,
}

/// Decodes one inbound frame. `Ok(None)` is an unrecognized type, which the
/// caller ignores.
pub fn decode_client_message(text: &str) -> Result<Option<ClientMessage>, DecodeError> {
  let envelope: Envelope = serde_json::from_str(text).map_err(|_| DecodeError {
    response: "",
    error: SessionError::InvalidJson,
  })?;

  let message = match envelope.kind.as_str() {
    TYPE_CONNECT => {
      let name = match payload::<NamePayload>(envelope.data, TYPE_CONNECT)? {
        NamePayload::Plain(name) | NamePayload::Named { name } => name,
      };
      ClientMessage::Connect { name }
    }
    TYPE_RECONNECT => {
      let ReconnectPayload { id, unique_id } = payload(envelope.data, TYPE_RECONNECT)?;
      ClientMessage::Reconnect { id, unique_id }
    }
    TYPE_CREATE => ClientMessage::Create,
    TYPE_JOIN => {
      let room = match payload::<RoomPayload>(envelope.data, TYPE_JOIN)? {
        RoomPayload::Plain(room) | RoomPayload::Named { room } => room,
      };
      ClientMessage::Join { room }
    }
    TYPE_DISCONNECT => ClientMessage::Disconnect,
    TYPE_INPUT => {
      let InputPayload { dir } = payload(envelope.data, TYPE_INPUT)?;
      ClientMessage::Input { direction: dir }
    }
    _ => return Ok(None),
  };
  Ok(Some(message))
}

fn payload<T: serde::de::DeserializeOwned>(
  data: Value,
  kind: &'static str,
) -> Result<T, DecodeError> {
  serde_json::from_value(data).map_err(|_| DecodeError {
    response: kind,
    error: SessionError::MalformedPayload(kind),
  })
}

#[derive(Debug, Clone)]
pub enum ServerMessage {
  Player {
    response: &'static str,
    player: PlayerPublic,
  },
  RoomCreated(RoomView),
  Joined(Snake),
  Disconnected,
  Fail {
    response: &'static str,
    reason: String,
  },
  BroadcastRoom(RoomSnapshot),
  SnakeDead(PlayerView),
}

impl ServerMessage {
  pub fn fail(response: &'static str, error: &SessionError) -> Self {
    ServerMessage::Fail {
      response,
      reason: error.to_string(),
    }
  }

  pub fn encode(&self) -> serde_json::Result<String> {
    match self {
      ServerMessage::Player { response, player } => reply(response, TYPE_PLAYER, player),
      ServerMessage::RoomCreated(room) => reply(TYPE_CREATE, TYPE_ROOM, room),
      ServerMessage::Joined(snake) => reply(TYPE_JOIN, TYPE_SNAKE, snake),
      ServerMessage::Disconnected => reply(TYPE_DISCONNECT, TYPE_OK, &true),
      ServerMessage::Fail { response, reason } => reply(response, TYPE_FAIL, reason),
      ServerMessage::BroadcastRoom(snapshot) => broadcast(TYPE_BROADCAST_ROOM, snapshot),
      ServerMessage::SnakeDead(player) => broadcast(TYPE_BROADCAST_SNAKE_DED, player),
    }
  }
}

#[derive(Serialize)]
struct Reply<'a, T: Serialize> {
  response: &'a str,
  #[serde(rename = "type")]
  kind: &'a str,
  data: &'a T,
}

#[derive(Serialize)]
struct Broadcast<'a, T: Serialize> {
  #[serde(rename = "type")]
  kind: &'a str,
  data: &'a T,
}

fn reply<T: Serialize>(response: &str, kind: &str, data: &T) -> serde_json::Result<String> {
  serde_json::to_string(&Reply {
    response,
    kind,
    data,
  })
}

fn broadcast<T: Serialize>(kind: &str, data: &T) -> serde_json::Result<String> {
  serde_json::to_string(&Broadcast { kind, data })
}
