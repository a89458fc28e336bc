//! Per-connection state machine.
//!
//! `Connecting → Authenticated → Active → Closed`. Any open state may move
//! to `Closed`; nothing leaves `Closed`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use chatis_core::error::AppError;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport open, identity not yet verified.
    Connecting = 0,
    /// Identity verified, not yet registered with the router.
    Authenticated = 1,
    /// Registered and receiving routed events.
    Active = 2,
    /// Terminal.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticated,
            2 => Self::Active,
            _ => Self::Closed,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated)
                | (Self::Authenticated, Self::Active)
                | (Self::Connecting | Self::Authenticated | Self::Active, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Atomic holder of a [`ConnectionState`].
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    /// Start in `Connecting`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    /// Current state.
    pub fn current(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next`, failing if the transition is not legal from the current state.
    pub fn advance(&self, next: ConnectionState) -> Result<(), AppError> {
        let mut current = self.current();
        loop {
            if !current.can_transition_to(next) {
                return Err(AppError::protocol(format!(
                    "Illegal connection transition {current} -> {next}"
                )));
            }
            match self.state.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = ConnectionState::from_u8(actual),
            }
        }
    }

    /// Move to `Closed`. Returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        self.state.swap(ConnectionState::Closed as u8, Ordering::AcqRel)
            != ConnectionState::Closed as u8
    }

    /// Whether the state is `Closed`.
    pub fn is_closed(&self) -> bool {
        self.current() == ConnectionState::Closed
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
