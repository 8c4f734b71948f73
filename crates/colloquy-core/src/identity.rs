//! User identity — the leaf dependency of everything else.
//!
//! Users are created by the external auth provider's sync feed and are never
//! deleted destructively; deactivation is a soft flag. One reserved identity
//! exists for the assistant so that message attribution via membership holds
//! for AI-authored content too (authorship itself is carried by the message
//! type, not by this identity — see [`crate::message::MessageType`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed UUID of the reserved assistant identity, seeded at schema init.
pub const ASSISTANT_USER_ID: Uuid =
  Uuid::from_u128(0x00000000_0000_4000_8000_000000000a51);

/// A durable user record, synced from the external auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  pub email:        String,
  pub display_name: String,
  pub is_active:    bool,
  pub created_at:   DateTime<Utc>,
}

impl User {
  pub fn is_assistant(&self) -> bool { self.user_id == ASSISTANT_USER_ID }
}

/// Input to [`crate::store::IdentityStore::sync_user`]. The id comes from the
/// auth provider; `created_at` is set by the store on first sight.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub user_id:      Uuid,
  pub email:        String,
  pub display_name: String,
}
