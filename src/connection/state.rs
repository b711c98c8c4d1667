// src/connection/state.rs

//! The connection lifecycle state machine.

use crate::core::SessionError;
use strum_macros::Display;
use tokio::sync::watch;

/// Lifecycle of a connection. Transitions only ever move one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Created,
    Handshaking,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// The only state reachable from `self`, or `None` once closed.
    pub fn successor(self) -> Option<ConnectionState> {
        match self {
            ConnectionState::Created => Some(ConnectionState::Handshaking),
            ConnectionState::Handshaking => Some(ConnectionState::Open),
            ConnectionState::Open => Some(ConnectionState::Closing),
            ConnectionState::Closing => Some(ConnectionState::Closed),
            ConnectionState::Closed => None,
        }
    }

    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        self.successor() == Some(next)
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

/// Holds the current state in a `watch` channel so transitions are atomic and
/// listeners can await them.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            tx: watch::Sender::new(ConnectionState::Created),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Moves to `next`, failing if it is not the immediate successor.
    pub(crate) fn advance(&self, next: ConnectionState) -> Result<(), SessionError> {
        let mut current = ConnectionState::Created;
        let moved = self.tx.send_if_modified(|state| {
            current = *state;
            if state.can_advance_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else {
            Err(SessionError::InvalidState(format!(
                "cannot move from {current} to {next}"
            )))
        }
    }

    /// Moves from `from` to its successor only if `from` is the current state.
    /// Exactly one of several racing callers wins.
    pub(crate) fn try_advance_from(&self, from: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| match state.successor() {
            Some(next) if *state == from => {
                *state = next;
                true
            }
            _ => false,
        })
    }
}

/// Resolves once the connection is no longer `Open`, or its state is gone.
pub(crate) async fn left_open(state_rx: &mut watch::Receiver<ConnectionState>) {
    let _ = state_rx.wait_for(|s| !s.is_open()).await;
}
