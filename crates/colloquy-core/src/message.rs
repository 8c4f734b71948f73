//! Chat messages and the sender-attribution contract.
//!
//! Messages do not reference users directly. They reference the membership
//! row for (session's group, sender), which carries the role context at time
//! of sending. Attribution is immutable after creation; edits touch content
//! only. Authorship kind (user / assistant / system) is carried by
//! [`MessageType`] — the single source of truth — with the reserved
//! assistant identity existing only so the membership indirection holds for
//! AI-authored content too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Message type ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
  #[default]
  User,
  Assistant,
  System,
}

impl MessageType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Assistant => "assistant",
      Self::System => "system",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "user" => Some(Self::User),
      "assistant" => Some(Self::Assistant),
      "system" => Some(Self::System),
      _ => None,
    }
  }
}

// ─── Enrollment policy ───────────────────────────────────────────────────────

/// What happens when a user without a group membership posts to a session.
///
/// The store applies exactly one policy to every send path. `AutoEnroll`
/// silently grants group access as a side effect of sending, so it is
/// opt-in and every enrollment it performs is logged.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPolicy {
  /// Posting requires an existing membership; otherwise `Forbidden`.
  #[default]
  ExplicitJoin,
  /// A member-role membership is created on the fly before sending.
  AutoEnroll,
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub message_id:    Uuid,
  pub session_id:    Uuid,
  /// The membership row that owns this message. A weak reference: the
  /// membership may be deleted later (user left the group) without
  /// disturbing history.
  pub membership_id: Uuid,
  pub message_type:  MessageType,
  pub content:       String,
  pub sent_at:       DateTime<Utc>,
  pub edited_at:     Option<DateTime<Utc>>,
  /// Weak nullable back-reference to another message; id lookup only, no
  /// ownership, never enforced as a foreign-key chain.
  pub reply_to:      Option<Uuid>,
}

/// Input to [`crate::store::MessageStore::post_message`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
  pub content:      String,
  #[serde(default)]
  pub message_type: MessageType,
  pub reply_to:     Option<Uuid>,
}

/// A message with its sender resolved read-side for display — a join at
/// query time, never stored redundantly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
  pub message:             Message,
  /// `None` when the sender's membership row no longer exists.
  pub sender_user_id:      Option<Uuid>,
  pub sender_display_name: Option<String>,
}
