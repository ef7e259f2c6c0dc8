//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connected, greeting not yet read
    Initial,

    /// SSLRequest sent, TLS handshake in progress
    NegotiatingTls,

    /// HandshakeResponse sent, plugin exchange in progress
    Authenticating,

    /// Authenticated and idle
    Ready,

    /// Command sent, awaiting response
    CommandInProgress,

    /// Closed
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Initial, NegotiatingTls)
                | (NegotiatingTls, Authenticating)
                | (Authenticating, Ready)
                | (Ready, CommandInProgress)
                | (CommandInProgress, Ready)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::NegotiatingTls => write!(f, "negotiating_tls"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Ready => write!(f, "ready"),
            Self::CommandInProgress => write!(f, "command_in_progress"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
