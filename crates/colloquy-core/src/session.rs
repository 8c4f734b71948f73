//! Discussion sessions, participation, and presence.
//!
//! A session belongs to a group; only group members may create or join one.
//! Participation is a durable fact ("this user joined this session");
//! presence is a lossy side table with a last-seen timestamp, pruned by a
//! housekeeping task and never consulted for authorization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  Active,
  Completed,
  Cancelled,
}

impl SessionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "active" => Some(Self::Active),
      "completed" => Some(Self::Completed),
      "cancelled" => Some(Self::Cancelled),
      _ => None,
    }
  }

  /// Completed and cancelled sessions are terminal for message posting.
  pub fn accepts_messages(self) -> bool { matches!(self, Self::Active) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id: Uuid,
  pub group_id:   Uuid,
  pub title:      String,
  pub status:     SessionStatus,
  pub created_by: Uuid,
  pub started_at: DateTime<Utc>,
  pub ended_at:   Option<DateTime<Utc>>,
}

// ─── Participation ───────────────────────────────────────────────────────────

/// Marks a user as having joined a session's live context. Distinct from
/// group membership: the membership is the prerequisite, this is the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParticipant {
  pub session_id: Uuid,
  pub user_id:    Uuid,
  pub joined_at:  DateTime<Utc>,
}

// ─── Presence ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
  Online,
  Offline,
}

impl PresenceStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Online => "online",
      Self::Offline => "offline",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "online" => Some(Self::Online),
      "offline" => Some(Self::Offline),
      _ => None,
    }
  }
}

/// A row in the presence side table, keyed by (session, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
  pub session_id:   Uuid,
  pub user_id:      Uuid,
  pub status:       PresenceStatus,
  pub last_seen_at: DateTime<Utc>,
}
