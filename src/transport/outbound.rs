use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close,
}

/// Cloneable write side of one websocket connection.
///
/// The handler task owns the socket sink; everyone else (the simulation loop,
/// a reconnect evicting a stale socket) only pushes into this queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: UnboundedSender<Outgoing>,
}

impl ConnectionHandle {
    pub fn channel() -> (Self, UnboundedReceiver<Outgoing>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            sender,
        };
        (handle, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn same_as(&self, other: &ConnectionHandle) -> bool {
        self.id == other.id
    }

    /// Returns false when the writer task is gone.
    pub fn send_text(&self, payload: String) -> bool {
        self.sender.send(Outgoing::Text(payload)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.sender.send(Outgoing::Close);
    }
}
