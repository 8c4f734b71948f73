//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. List fields (authors,
//! tags, vector ids) are stored as compact JSON arrays. UUIDs are stored as
//! hyphenated lowercase strings. Decode failures mean a corrupt row and
//! surface as [`Error::Storage`].

use chrono::{DateTime, Utc};
use colloquy_core::{
  Error, Result,
  group::{Group, Member, Membership, Role},
  identity::User,
  invite::InviteCode,
  message::{Message, MessageType, MessageView},
  rag::{Paper, RagDocument, RagStatus, SessionRagStatus},
  session::{Session, SessionStatus},
};
use uuid::Uuid;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| Error::Storage(format!("bad uuid {s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Storage(format!("bad timestamp {s:?}: {e}")))
}

pub fn encode_list(items: &[String]) -> String {
  serde_json::to_string(items).unwrap_or_else(|_| "[]".to_owned())
}

pub fn decode_list(s: &str) -> Result<Vec<String>> {
  serde_json::from_str(s)
    .map_err(|e| Error::Storage(format!("bad json list {s:?}: {e}")))
}

fn decode_session_status(s: &str) -> Result<SessionStatus> {
  SessionStatus::parse(s)
    .ok_or_else(|| Error::Storage(format!("bad session status {s:?}")))
}

fn decode_message_type(s: &str) -> Result<MessageType> {
  MessageType::parse(s)
    .ok_or_else(|| Error::Storage(format!("bad message type {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:      String,
  pub email:        String,
  pub display_name: String,
  pub is_active:    bool,
  pub created_at:   String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:      decode_uuid(&self.user_id)?,
      email:        self.email,
      display_name: self.display_name,
      is_active:    self.is_active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawGroup {
  pub group_id:    String,
  pub name:        String,
  pub description: Option<String>,
  pub is_public:   bool,
  pub invite_code: String,
  pub created_by:  String,
  pub created_at:  String,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:    decode_uuid(&self.group_id)?,
      name:        self.name,
      description: self.description,
      is_public:   self.is_public,
      invite_code: InviteCode::parse(&self.invite_code)
        .map_err(|e| Error::Storage(format!("bad invite code in row: {e}")))?,
      created_by:  decode_uuid(&self.created_by)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawMembership {
  pub membership_id: String,
  pub group_id:      String,
  pub user_id:       String,
  pub role:          String,
  pub joined_at:     String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      membership_id: decode_uuid(&self.membership_id)?,
      group_id:      decode_uuid(&self.group_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      role:          Role::parse(&self.role)
        .map_err(|_| Error::Storage(format!("bad role {:?}", self.role)))?,
      joined_at:     decode_dt(&self.joined_at)?,
    })
  }
}

/// A `memberships` row joined with its `users` row.
pub struct RawMember {
  pub membership:   RawMembership,
  pub email:        String,
  pub display_name: String,
  pub is_active:    bool,
}

impl RawMember {
  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      membership:   self.membership.into_membership()?,
      email:        self.email,
      display_name: self.display_name,
      is_active:    self.is_active,
    })
  }
}

pub struct RawSession {
  pub session_id: String,
  pub group_id:   String,
  pub title:      String,
  pub status:     String,
  pub created_by: String,
  pub started_at: String,
  pub ended_at:   Option<String>,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id: decode_uuid(&self.session_id)?,
      group_id:   decode_uuid(&self.group_id)?,
      title:      self.title,
      status:     decode_session_status(&self.status)?,
      created_by: decode_uuid(&self.created_by)?,
      started_at: decode_dt(&self.started_at)?,
      ended_at:   self.ended_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawMessage {
  pub message_id:    String,
  pub session_id:    String,
  pub membership_id: String,
  pub message_type:  String,
  pub content:       String,
  pub sent_at:       String,
  pub edited_at:     Option<String>,
  pub reply_to:      Option<String>,
}

impl RawMessage {
  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:    decode_uuid(&self.message_id)?,
      session_id:    decode_uuid(&self.session_id)?,
      membership_id: decode_uuid(&self.membership_id)?,
      message_type:  decode_message_type(&self.message_type)?,
      content:       self.content,
      sent_at:       decode_dt(&self.sent_at)?,
      edited_at:     self.edited_at.as_deref().map(decode_dt).transpose()?,
      reply_to:      self.reply_to.as_deref().map(decode_uuid).transpose()?,
    })
  }
}

/// A `messages` row LEFT JOINed through `memberships` to `users`; the
/// sender columns are absent when the membership row has been deleted.
pub struct RawMessageView {
  pub message:             RawMessage,
  pub sender_user_id:      Option<String>,
  pub sender_display_name: Option<String>,
}

impl RawMessageView {
  pub fn into_view(self) -> Result<MessageView> {
    Ok(MessageView {
      message:             self.message.into_message()?,
      sender_user_id:      self
        .sender_user_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      sender_display_name: self.sender_display_name,
    })
  }
}

pub struct RawPaper {
  pub paper_id:   String,
  pub title:      String,
  pub authors:    String,
  pub doi:        Option<String>,
  pub tags:       String,
  pub created_at: String,
}

impl RawPaper {
  pub fn into_paper(self) -> Result<Paper> {
    Ok(Paper {
      paper_id:   decode_uuid(&self.paper_id)?,
      title:      self.title,
      authors:    decode_list(&self.authors)?,
      doi:        self.doi,
      tags:       decode_list(&self.tags)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRagDocument {
  pub paper_id:     String,
  pub status:       String,
  pub chunk_count:  Option<u32>,
  pub vector_ids:   String,
  pub last_error:   Option<String>,
  pub submitted_at: String,
  pub processed_at: Option<String>,
}

impl RawRagDocument {
  pub fn into_document(self) -> Result<RagDocument> {
    Ok(RagDocument {
      paper_id:     decode_uuid(&self.paper_id)?,
      status:       RagStatus::parse(&self.status)
        .map_err(|_| Error::Storage(format!("bad rag status {:?}", self.status)))?,
      chunk_count:  self.chunk_count,
      vector_ids:   decode_list(&self.vector_ids)?,
      last_error:   self.last_error,
      submitted_at: decode_dt(&self.submitted_at)?,
      processed_at: self.processed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawSessionRagStatus {
  pub session_id:       String,
  pub is_enabled:       bool,
  pub enabled_by:       Option<String>,
  pub enabled_at:       Option<String>,
  pub disabled_at:      Option<String>,
  pub total_papers:     u32,
  pub processed_papers: u32,
}

impl RawSessionRagStatus {
  pub fn into_status(self) -> Result<SessionRagStatus> {
    Ok(SessionRagStatus {
      session_id:       decode_uuid(&self.session_id)?,
      is_enabled:       self.is_enabled,
      enabled_by:       self.enabled_by.as_deref().map(decode_uuid).transpose()?,
      enabled_at:       self.enabled_at.as_deref().map(decode_dt).transpose()?,
      disabled_at:      self.disabled_at.as_deref().map(decode_dt).transpose()?,
      total_papers:     self.total_papers,
      processed_papers: self.processed_papers,
    })
  }
}
