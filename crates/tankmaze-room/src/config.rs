//! Registry configuration and the room state machine's states.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Limits applied by the [`RoomManager`](crate::RoomManager).
///
/// Everything defaults to "off": the relay assumes cooperative clients
/// unless an operator opts in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of live rooms. `None` means bounded only by the
    /// code space (9000 four-digit codes).
    pub max_rooms: Option<usize>,
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
///            start (host, guest ready)
///   Lobby ─────────────────────────────→ Active
///     ↑                                    │
///     └──── restart / player departure ────┘
/// ```
///
/// - **Lobby**: players negotiate readiness; the host uploads the maze.
/// - **Active**: a round is running and gameplay telemetry is relayed.
///
/// Win and result notifications are broadcasts inside `Active`, not
/// states of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomState {
    #[default]
    Lobby,
    Active,
}

impl RoomState {
    /// Returns `true` while a round is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::Active => write!(f, "Active"),
        }
    }
}
