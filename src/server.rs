use crate::game::state::{Outbound, ServerState};
use crate::game::types::{PlayerId, WorldSettings};
use crate::protocol::{self, ClientMessage, ErrorKind, ServerMessage, SessionError};
use crate::shared::time::now_millis;
use crate::transport::outbound::ConnectionHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Owns the shared state and the one lock guarding it.
#[derive(Debug)]
pub struct GameServer {
    state: Mutex<ServerState>,
}

/// Connection-local side of the protocol state machine: which player, if
/// any, this socket speaks for.
#[derive(Debug)]
pub struct ConnectionSession {
    connection: ConnectionHandle,
    player_id: Option<PlayerId>,
}

impl ConnectionSession {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            player_id: None,
        }
    }

    /// The bound player, unless another socket has since taken it over.
    fn bound_player(&self, state: &ServerState) -> Option<PlayerId> {
        self.player_id
            .filter(|id| state.is_bound(*id, self.connection.id()))
    }

    fn handle(&mut self, state: &mut ServerState, message: ClientMessage, now: i64) -> Vec<Outbound> {
        let kind = message.kind();
        match self.apply(state, message, now) {
            Ok(outbound) => outbound,
            Err(error) => {
                match error.kind() {
                    ErrorKind::MalformedMessage => {
                        tracing::warn!(connection_id = %self.connection.id(), %error, "malformed request")
                    }
                    _ => tracing::debug!(connection_id = %self.connection.id(), %error, "request rejected"),
                }
                self.reply(&ServerMessage::fail(kind, &error))
            }
        }
    }

    fn apply(
        &mut self,
        state: &mut ServerState,
        message: ClientMessage,
        now: i64,
    ) -> Result<Vec<Outbound>, SessionError> {
        let bound = self.bound_player(state);
        match message {
            ClientMessage::Connect { name } => {
                if bound.is_some() {
                    return Err(SessionError::AlreadyConnected);
                }
                let player = state.connect(&name, self.connection.clone(), now);
                self.player_id = Some(player.id);
                Ok(self.reply(&ServerMessage::Player {
                    response: protocol::TYPE_CONNECT,
                    player,
                }))
            }
            ClientMessage::Reconnect { id, unique_id } => {
                let (player, evicted) = state.reconnect(id, &unique_id, self.connection.clone(), now)?;
                if let Some(previous) = bound.filter(|previous| *previous != id) {
                    state.mark_disconnected(previous, self.connection.id(), now);
                }
                self.player_id = Some(id);
                let mut outbound = self.reply(&ServerMessage::Player {
                    response: protocol::TYPE_RECONNECT,
                    player,
                });
                outbound.extend(evicted.map(Outbound::Close));
                Ok(outbound)
            }
            ClientMessage::Create => {
                let id = bound.ok_or(SessionError::NotConnected(protocol::TYPE_CREATE))?;
                match state.create_room(id)? {
                    Some(room) => Ok(self.reply(&ServerMessage::RoomCreated(room))),
                    None => Ok(Vec::new()),
                }
            }
            ClientMessage::Join { room } => {
                let id = bound.ok_or(SessionError::NotConnected(protocol::TYPE_JOIN))?;
                let snake = state.join_room(id, &room)?;
                Ok(self.reply(&ServerMessage::Joined(snake)))
            }
            ClientMessage::Disconnect => {
                let id = bound.ok_or(SessionError::NotConnected(protocol::TYPE_DISCONNECT))?;
                if !state.leave_room(id) {
                    return Err(SessionError::NotInRoom);
                }
                Ok(self.reply(&ServerMessage::Disconnected))
            }
            ClientMessage::Input { direction } => {
                let id = bound.ok_or(SessionError::NotConnected(protocol::TYPE_INPUT))?;
                state.steer(id, direction);
                Ok(Vec::new())
            }
        }
    }

    fn reply(&self, message: &ServerMessage) -> Vec<Outbound> {
        Outbound::message(&self.connection, message).into_iter().collect()
    }
}

impl GameServer {
    pub fn new(settings: WorldSettings) -> Self {
        Self::with_state(ServerState::new(settings))
    }

    pub fn with_state(state: ServerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Decodes and applies one inbound frame. Replies are written only after
    /// the state lock is released.
    pub async fn handle_text(&self, session: &mut ConnectionSession, text: &str) {
        let outbound = match protocol::decode_client_message(text) {
            Ok(Some(message)) => {
                let mut state = self.state.lock().await;
                session.handle(&mut state, message, now_millis())
            }
            Ok(None) => Vec::new(),
            Err(decode_error) => {
                tracing::warn!(
                    connection_id = %session.connection.id(),
                    error = %decode_error.error,
                    "undecodable message"
                );
                session.reply(&ServerMessage::fail(decode_error.response, &decode_error.error))
            }
        };
        deliver(outbound);
    }

    /// Called once the receive loop ends for any reason. The player keeps
    /// its room so a reconnect can resume in place.
    pub async fn connection_closed(&self, session: &ConnectionSession) {
        let Some(player_id) = session.player_id else { return };
        let mut state = self.state.lock().await;
        state.mark_disconnected(player_id, session.connection.id(), now_millis());
    }

    pub async fn run_simulation(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let outbound = {
                let mut state = self.state.lock().await;
                state.tick()
            };
            deliver(outbound);
        }
    }

    pub async fn run_reaper(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let reaped = {
                let mut state = self.state.lock().await;
                state.reap_idle(now_millis())
            };
            if !reaped.is_empty() {
                tracing::info!(count = reaped.len(), "idle players removed from rooms");
            }
        }
    }

    #[cfg(test)]
    async fn tick_now(&self) {
        let outbound = self.state.lock().await.tick();
        deliver(outbound);
    }
}

fn deliver(outbound: Vec<Outbound>) {
    for item in outbound {
        item.deliver();
    }
}
