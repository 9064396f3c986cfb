//! Connection state for the link.
//!
//! Exactly one [`ConnectionState`] is current at any instant. `Connecting`
//! is shared by both roles: the host is listening, the client is dialing.
//! Only one of the two can be active, so the overlap is unambiguous.

use std::fmt;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Listening for a peer (host) or dialing one (client).
    Connecting,
    /// A peer is connected and a session is running.
    Connected,
}

impl ConnectionState {
    /// Whether a session is live.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Whether the transition `self -> next` is part of the lifecycle.
    ///
    /// Any state may fall back to `Disconnected`, and a restart may move
    /// straight from `Connected` to `Connecting` or replace one attempt with
    /// another.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (_, Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, Connected) | (Disconnected, Connected) => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Which side of the link this end is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted the connection; listens again after losing it.
    Host,
    /// Initiated the connection; must be restarted explicitly.
    Client,
}

impl Role {
    /// Whether this is the accepting side.
    pub fn is_host(self) -> bool {
        self == Self::Host
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Client => "client",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::default().is_connected());
    }

    #[test]
    fn test_lifecycle_transitions() {
        use ConnectionState::*;

        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Connecting));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(Role::Host.to_string(), "host");
        assert!(Role::Host.is_host());
        assert!(!Role::Client.is_host());
    }
}
