//! Error types for `colloquy-core`.
//!
//! Every operation in this subsystem fails with one of four client-visible
//! kinds — not-found, conflict, forbidden, validation — plus a storage kind
//! for backend faults. Backends fold their driver errors into
//! [`Error::Storage`]; a raw database error never crosses a trait boundary.

use thiserror::Error;
use uuid::Uuid;

use crate::group::Role;
use crate::rag::RagStatus;

/// The client-facing classification of an [`Error`].
///
/// In an HTTP binding these map to 404 / 409 / 403 / 400 / 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Forbidden,
  Validation,
  Storage,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── NotFound ──────────────────────────────────────────────────────────
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("group not found: {0}")]
  GroupNotFound(Uuid),

  #[error("no group matches invite code {0:?}")]
  InviteCodeNotFound(String),

  #[error("user {user} has no membership in group {group}")]
  MembershipNotFound { group: Uuid, user: Uuid },

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("paper not found: {0}")]
  PaperNotFound(Uuid),

  #[error("paper {paper} is not linked to session {session}")]
  PaperNotLinked { session: Uuid, paper: Uuid },

  #[error("paper {0} was never submitted for indexing")]
  RagDocumentNotFound(Uuid),

  // ── Conflict ──────────────────────────────────────────────────────────
  #[error("user {user} is already a member of group {group}")]
  AlreadyMember { group: Uuid, user: Uuid },

  #[error("cannot demote or remove the sole admin of group {0}")]
  SoleAdmin(Uuid),

  #[error("paper {paper} is already linked to session {session}")]
  PaperAlreadyLinked { session: Uuid, paper: Uuid },

  #[error("session {0} is closed for posting")]
  SessionClosed(Uuid),

  #[error("rag document cannot move from {from} to {to}")]
  InvalidRagTransition { from: RagStatus, to: RagStatus },

  #[error("invite code generation exhausted after {0} attempts")]
  InviteCodeExhausted(u32),

  // ── Forbidden ─────────────────────────────────────────────────────────
  #[error("user {user} is not a member of group {group}")]
  NotAMember { group: Uuid, user: Uuid },

  #[error("role {actor} may not perform this operation")]
  InsufficientRole { actor: Role },

  // ── Validation ────────────────────────────────────────────────────────
  #[error("message content must not be empty")]
  EmptyContent,

  #[error("invalid invite code: {0}")]
  InvalidInviteCode(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown rag status: {0:?}")]
  UnknownRagStatus(String),

  #[error("invalid rag payload: {0}")]
  InvalidRagPayload(String),

  // ── Storage ───────────────────────────────────────────────────────────
  /// A backend fault the caller cannot act on (driver error, corrupt row).
  #[error("storage error: {0}")]
  Storage(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::UserNotFound(_)
      | Self::GroupNotFound(_)
      | Self::InviteCodeNotFound(_)
      | Self::MembershipNotFound { .. }
      | Self::SessionNotFound(_)
      | Self::MessageNotFound(_)
      | Self::PaperNotFound(_)
      | Self::PaperNotLinked { .. }
      | Self::RagDocumentNotFound(_) => ErrorKind::NotFound,

      Self::AlreadyMember { .. }
      | Self::SoleAdmin(_)
      | Self::PaperAlreadyLinked { .. }
      | Self::SessionClosed(_)
      | Self::InvalidRagTransition { .. }
      | Self::InviteCodeExhausted(_) => ErrorKind::Conflict,

      Self::NotAMember { .. } | Self::InsufficientRole { .. } => {
        ErrorKind::Forbidden
      }

      Self::EmptyContent
      | Self::InvalidInviteCode(_)
      | Self::UnknownRole(_)
      | Self::UnknownRagStatus(_)
      | Self::InvalidRagPayload(_) => ErrorKind::Validation,

      Self::Storage(_) => ErrorKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
