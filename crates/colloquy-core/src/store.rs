//! Store traits — one per subsystem component — and supporting types.
//!
//! The traits are implemented by storage backends (e.g.
//! `colloquy-store-sqlite`). Higher layers (`colloquy-api`,
//! `colloquy-server`) depend on these abstractions, not on any concrete
//! backend.
//!
//! Every method is one atomic operation: a backend must execute each call
//! as a single short-lived transaction, so that the invariants spelled out
//! per method (sole-admin guard, duplicate-membership rejection, cached
//! RAG counts) hold under concurrent callers without client coordination.
//! Uniqueness invariants are enforced by storage constraints, never by
//! check-then-insert.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::Duration;
use uuid::Uuid;

use crate::{
  Result,
  group::{Group, Member, Membership, NewGroup, Role},
  identity::{NewUser, User},
  invite::InviteCode,
  message::{Message, MessageView, NewMessage},
  rag::{NewPaper, Paper, RagDocument, RagUpdate, SessionRagStatus},
  session::Session,
};

// ─── IdentityStore ───────────────────────────────────────────────────────────

/// Durable user records; leaf dependency for everything else.
///
/// Users arrive via the external auth provider's sync feed and are never
/// deleted destructively — deactivation is a soft flag.
pub trait IdentityStore: Send + Sync {
  /// Upsert a user by id. On re-sync the email and display name are
  /// refreshed and a deactivated user is reactivated.
  fn sync_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  /// Soft-deactivate a user. Fails `NotFound` if the user does not exist.
  fn deactivate_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<User>> + Send + '_;
}

// ─── GroupStore ──────────────────────────────────────────────────────────────

/// Group creation, membership rows, and role transitions.
///
/// Invariants:
/// - invite codes are globally unique among groups;
/// - a user appears at most once per group;
/// - every group with at least one member has at least one admin
///   (the "sole admin" guard), counted inside the write transaction.
pub trait GroupStore: Send + Sync {
  /// Allocate a group with a fresh invite code and an admin membership for
  /// the creator, in one transaction. Fails `NotFound` if the creator does
  /// not exist or is deactivated; fails with an exhaustion conflict if no
  /// unique code could be generated within the bounded retry budget.
  fn create_group(
    &self,
    creator: Uuid,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group>> + Send + '_;

  fn get_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Group>>> + Send + '_;

  /// Resolve an invite code to its group. Only the current code resolves;
  /// regenerated-away codes do not.
  fn get_group_by_code(
    &self,
    code: InviteCode,
  ) -> impl Future<Output = Result<Option<Group>>> + Send + '_;

  /// Join a group by invite code with role=member.
  ///
  /// Fails `NotFound` for an unknown code and `Conflict` if the user
  /// already holds a membership. Duplicate-safe under concurrent calls:
  /// the second caller observes the uniqueness constraint, not a second
  /// row.
  fn join_by_invite_code(
    &self,
    code: InviteCode,
    user: Uuid,
  ) -> impl Future<Output = Result<Membership>> + Send + '_;

  /// Change a member's role.
  ///
  /// Authorization per [`Role::may_assign`]; demoting the group's only
  /// admin fails `Conflict`, with the admin count taken in the same
  /// transaction as the write.
  fn update_role(
    &self,
    actor: Uuid,
    group: Uuid,
    target: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<Membership>> + Send + '_;

  /// Leave a group. Fails `Conflict` if the user is the sole admin.
  fn leave_group(
    &self,
    user: Uuid,
    group: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Remove a member. Authorization per [`Role::may_remove`]; the
  /// sole-admin guard still applies when the target is the only admin.
  fn remove_member(
    &self,
    actor: Uuid,
    group: Uuid,
    target: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Replace the group's invite code with a fresh unique one. Admin only.
  fn regenerate_invite_code(
    &self,
    group: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<InviteCode>> + Send + '_;

  /// List memberships joined with their users.
  fn list_members(
    &self,
    group: Uuid,
  ) -> impl Future<Output = Result<Vec<Member>>> + Send + '_;

  /// The membership for (group, user), if any. Read-side helper.
  fn get_membership(
    &self,
    group: Uuid,
    user: Uuid,
  ) -> impl Future<Output = Result<Option<Membership>>> + Send + '_;
}

// ─── SessionStore ────────────────────────────────────────────────────────────

/// Session creation, participation, and presence bookkeeping.
pub trait SessionStore: Send + Sync {
  /// Create a session in a group. Fails `Forbidden` unless the creator
  /// holds a membership; the creator is auto-added as a participant.
  fn create_session(
    &self,
    group: Uuid,
    creator: Uuid,
    title: String,
  ) -> impl Future<Output = Result<Session>> + Send + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>>> + Send + '_;

  /// Join a session's live context. Fails `Forbidden` unless the user is a
  /// member of the owning group; re-joining is a no-op.
  fn join_session(
    &self,
    session: Uuid,
    user: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Mark a session completed and stamp `ended_at`. Terminal for message
  /// posting. Idempotent on an already-completed session.
  fn end_session(
    &self,
    session: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<Session>> + Send + '_;

  /// Users currently marked online in the presence side table.
  fn list_online_participants(
    &self,
    session: Uuid,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  /// Delete presence rows older than `retention`. Pure housekeeping; the
  /// return value is the number of rows removed.
  fn prune_presence(
    &self,
    retention: Duration,
  ) -> impl Future<Output = Result<usize>> + Send + '_;
}

// ─── MessageStore ────────────────────────────────────────────────────────────

/// Message posting with membership-based sender attribution.
pub trait MessageStore: Send + Sync {
  /// Post a message to a session.
  ///
  /// Validates non-empty content, rejects closed sessions with `Conflict`,
  /// resolves the sender membership per the backend's configured
  /// [`crate::message::EnrollmentPolicy`], inserts the message, and marks
  /// the sender's presence online. Assistant-typed messages attribute to
  /// the reserved assistant identity regardless of `actor`.
  fn post_message(
    &self,
    session: Uuid,
    actor: Uuid,
    input: NewMessage,
  ) -> impl Future<Output = Result<MessageView>> + Send + '_;

  /// Update content and stamp `edited_at`. Sender attribution never
  /// changes.
  fn edit_message(
    &self,
    message: Uuid,
    new_content: String,
  ) -> impl Future<Output = Result<Message>> + Send + '_;

  /// All messages in a session, oldest first, with display names resolved
  /// read-side.
  fn list_messages(
    &self,
    session: Uuid,
  ) -> impl Future<Output = Result<Vec<MessageView>>> + Send + '_;
}

// ─── RagStore ────────────────────────────────────────────────────────────────

/// Papers, the per-paper indexing state machine, and the per-session
/// rollup cache.
pub trait RagStore: Send + Sync {
  fn create_paper(
    &self,
    input: NewPaper,
  ) -> impl Future<Output = Result<Paper>> + Send + '_;

  fn get_paper(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Paper>>> + Send + '_;

  /// Link a paper to a session. Fails `Conflict` on re-link. Recomputes
  /// the session's cached RAG counts in the same transaction.
  fn attach_paper(
    &self,
    session: Uuid,
    paper: Uuid,
    added_by: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Unlink a paper from a session; recomputes cached counts in the same
  /// transaction. Fails `NotFound` if the link does not exist.
  fn detach_paper(
    &self,
    session: Uuid,
    paper: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Submit (or re-submit) a paper for indexing: upsert-and-reset the
  /// document record to `pending`. The only path that leaves a terminal
  /// status.
  fn submit_paper(
    &self,
    paper: Uuid,
  ) -> impl Future<Output = Result<RagDocument>> + Send + '_;

  /// Apply a worker status report. Same-state updates are idempotent;
  /// backward transitions fail `Conflict`; `completed` always sets
  /// `processed_at`. Cached counts of every session linking the paper are
  /// recomputed in the same transaction.
  fn update_rag_status(
    &self,
    paper: Uuid,
    update: RagUpdate,
  ) -> impl Future<Output = Result<RagDocument>> + Send + '_;

  fn get_rag_document(
    &self,
    paper: Uuid,
  ) -> impl Future<Output = Result<Option<RagDocument>>> + Send + '_;

  /// Upsert the session's status row with enabled=true and counts
  /// recomputed at the moment of the call, in one transaction.
  fn enable_session_rag(
    &self,
    session: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<SessionRagStatus>> + Send + '_;

  /// Set enabled=false and `disabled_at`; counts keep their last-known
  /// snapshot values.
  fn disable_session_rag(
    &self,
    session: Uuid,
  ) -> impl Future<Output = Result<SessionRagStatus>> + Send + '_;

  /// The cached status row, if the session has one. A convenience cache —
  /// use [`RagStore::session_rag_counts`] for always-fresh numbers.
  fn get_session_rag_status(
    &self,
    session: Uuid,
  ) -> impl Future<Output = Result<Option<SessionRagStatus>>> + Send + '_;

  /// Live `(total, processed)` paper counts derived by joining the
  /// session's papers against their documents. The source of truth.
  fn session_rag_counts(
    &self,
    session: Uuid,
  ) -> impl Future<Output = Result<(u32, u32)>> + Send + '_;
}

// ─── PlatformStore ───────────────────────────────────────────────────────────

/// The full data layer: everything the API surface needs, in one bound.
pub trait PlatformStore:
  IdentityStore + GroupStore + SessionStore + MessageStore + RagStore
{
}

impl<T> PlatformStore for T where
  T: IdentityStore + GroupStore + SessionStore + MessageStore + RagStore
{
}
