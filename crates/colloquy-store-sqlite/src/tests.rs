//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Duration;
use colloquy_core::{
  Error,
  group::{NewGroup, Role},
  identity::{ASSISTANT_USER_ID, NewUser},
  invite::InviteCode,
  message::{EnrollmentPolicy, MessageType, NewMessage},
  rag::{NewPaper, RagStatus, RagUpdate},
  store::{GroupStore, IdentityStore, MessageStore, RagStore, SessionStore},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> Uuid {
  let id = Uuid::new_v4();
  s.sync_user(NewUser {
    user_id:      id,
    email:        format!("{name}@example.com"),
    display_name: name.to_owned(),
  })
  .await
  .unwrap();
  id
}

fn new_group(name: &str) -> NewGroup {
  NewGroup {
    name:        name.to_owned(),
    description: None,
    is_public:   false,
  }
}

fn text(content: &str) -> NewMessage {
  NewMessage {
    content:      content.to_owned(),
    message_type: MessageType::User,
    reply_to:     None,
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_user_upserts_and_reactivates() {
  let s = store().await;
  let id = user(&s, "alice").await;

  s.deactivate_user(id).await.unwrap();
  let fetched = s.get_user(id).await.unwrap().unwrap();
  assert!(!fetched.is_active);

  // Re-sync refreshes fields and reactivates.
  s.sync_user(NewUser {
    user_id:      id,
    email:        "alice@new.example.com".into(),
    display_name: "Alice L.".into(),
  })
  .await
  .unwrap();

  let fetched = s.get_user(id).await.unwrap().unwrap();
  assert!(fetched.is_active);
  assert_eq!(fetched.email, "alice@new.example.com");
  assert_eq!(fetched.display_name, "Alice L.");
}

#[tokio::test]
async fn deactivate_unknown_user_errors() {
  let s = store().await;
  let err = s.deactivate_user(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn assistant_identity_is_seeded() {
  let s = store().await;
  let assistant = s.get_user(ASSISTANT_USER_ID).await.unwrap().unwrap();
  assert!(assistant.is_assistant());
  assert!(assistant.is_active);
}

// ─── Groups and invite codes ─────────────────────────────────────────────────

#[tokio::test]
async fn create_group_makes_creator_admin() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("reading circle")).await.unwrap();
  assert_eq!(group.created_by, alice);

  let membership = s
    .get_membership(group.group_id, alice)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(membership.role, Role::Admin);
}

#[tokio::test]
async fn invite_codes_are_distinct_across_groups() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let mut codes = std::collections::HashSet::new();
  for i in 0..20 {
    let group = s
      .create_group(alice, new_group(&format!("group {i}")))
      .await
      .unwrap();
    assert!(codes.insert(group.invite_code.to_string()));
  }
}

#[tokio::test]
async fn join_by_invite_code_grants_member_role() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let membership = s
    .join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  assert_eq!(membership.group_id, group.group_id);
  assert_eq!(membership.user_id, bob);
  assert_eq!(membership.role, Role::Member);
}

#[tokio::test]
async fn join_twice_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  let err = s
    .join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyMember { .. }));

  // Exactly one membership row survives.
  let members = s.list_members(group.group_id).await.unwrap();
  assert_eq!(
    members
      .iter()
      .filter(|m| m.membership.user_id == bob)
      .count(),
    1
  );
}

#[tokio::test]
async fn unknown_invite_code_is_not_found() {
  let s = store().await;
  let bob = user(&s, "bob").await;

  let code = InviteCode::parse("ZZZZ9999").unwrap();
  let err = s.join_by_invite_code(code, bob).await.unwrap_err();
  assert!(matches!(err, Error::InviteCodeNotFound(_)));
}

#[tokio::test]
async fn regenerated_code_resolves_and_old_one_stops() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let old_code = group.invite_code.clone();

  let new_code = s
    .regenerate_invite_code(group.group_id, alice)
    .await
    .unwrap();
  assert_ne!(old_code, new_code);

  assert!(s.get_group_by_code(old_code).await.unwrap().is_none());
  let resolved = s.get_group_by_code(new_code).await.unwrap().unwrap();
  assert_eq!(resolved.group_id, group.group_id);
}

#[tokio::test]
async fn non_admin_cannot_regenerate_code() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  let err = s
    .regenerate_invite_code(group.group_id, bob)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InsufficientRole { .. }));
}

// ─── Roles and the sole-admin guard ──────────────────────────────────────────

#[tokio::test]
async fn admin_promotes_and_demotes() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  let m = s
    .update_role(alice, group.group_id, bob, Role::Mentor)
    .await
    .unwrap();
  assert_eq!(m.role, Role::Mentor);

  let m = s
    .update_role(alice, group.group_id, bob, Role::Member)
    .await
    .unwrap();
  assert_eq!(m.role, Role::Member);
}

#[tokio::test]
async fn mentor_cannot_grant_admin() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  s.join_by_invite_code(group.invite_code.clone(), carol)
    .await
    .unwrap();
  s.update_role(alice, group.group_id, bob, Role::Mentor)
    .await
    .unwrap();

  let err = s
    .update_role(bob, group.group_id, carol, Role::Admin)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InsufficientRole { actor: Role::Mentor }));
}

#[tokio::test]
async fn demoting_the_sole_admin_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  let err = s
    .update_role(alice, group.group_id, alice, Role::Member)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SoleAdmin(_)));
}

#[tokio::test]
async fn sole_admin_cannot_leave_while_members_remain() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();

  let err = s.leave_group(alice, group.group_id).await.unwrap_err();
  assert!(matches!(err, Error::SoleAdmin(_)));

  // Once a second admin exists the original may leave.
  s.update_role(alice, group.group_id, bob, Role::Admin)
    .await
    .unwrap();
  s.leave_group(alice, group.group_id).await.unwrap();
  assert!(
    s.get_membership(group.group_id, alice)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn sole_admin_cannot_leave_even_as_last_member() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("solo")).await.unwrap();
  let err = s.leave_group(alice, group.group_id).await.unwrap_err();
  assert!(matches!(err, Error::SoleAdmin(_)));

  let members = s.list_members(group.group_id).await.unwrap();
  assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn demoting_sole_admin_as_last_member_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  s.update_role(alice, group.group_id, bob, Role::Admin)
    .await
    .unwrap();
  s.leave_group(alice, group.group_id).await.unwrap();

  // bob is now the only member and the only admin; self-demotion would
  // leave a non-empty group without an admin.
  let err = s
    .update_role(bob, group.group_id, bob, Role::Member)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SoleAdmin(_)));

  let m = s
    .get_membership(group.group_id, bob)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(m.role, Role::Admin);
}

#[tokio::test]
async fn removing_the_sole_admin_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  s.join_by_invite_code(group.invite_code.clone(), carol)
    .await
    .unwrap();
  s.update_role(alice, group.group_id, bob, Role::Admin)
    .await
    .unwrap();
  s.update_role(alice, group.group_id, bob, Role::Member)
    .await
    .unwrap();

  // alice is sole admin again; even she cannot remove herself.
  let err = s
    .remove_member(alice, group.group_id, alice)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SoleAdmin(_)));
}

#[tokio::test]
async fn mentor_removes_member_but_not_admin() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  s.join_by_invite_code(group.invite_code.clone(), carol)
    .await
    .unwrap();
  s.update_role(alice, group.group_id, bob, Role::Mentor)
    .await
    .unwrap();

  s.remove_member(bob, group.group_id, carol).await.unwrap();
  assert!(
    s.get_membership(group.group_id, carol)
      .await
      .unwrap()
      .is_none()
  );

  let err = s
    .remove_member(bob, group.group_id, alice)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InsufficientRole { .. }));
}

// ─── Sessions and presence ───────────────────────────────────────────────────

#[tokio::test]
async fn create_session_requires_membership() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let mallory = user(&s, "mallory").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();

  let err = s
    .create_session(group.group_id, mallory, "sneaky".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotAMember { .. }));

  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  assert_eq!(session.group_id, group.group_id);
  assert!(session.status.accepts_messages());
}

#[tokio::test]
async fn join_session_is_idempotent_and_marks_online() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  s.join_session(session.session_id, bob).await.unwrap();
  s.join_session(session.session_id, bob).await.unwrap();

  let online = s
    .list_online_participants(session.session_id)
    .await
    .unwrap();
  assert_eq!(online.len(), 1);
  assert_eq!(online[0].user_id, bob);
}

#[tokio::test]
async fn end_session_is_idempotent() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let ended = s.end_session(session.session_id, alice).await.unwrap();
  assert!(!ended.status.accepts_messages());
  let first_ended_at = ended.ended_at.unwrap();

  let again = s.end_session(session.session_id, alice).await.unwrap();
  assert_eq!(again.ended_at, Some(first_ended_at));
}

#[tokio::test]
async fn prune_presence_removes_stale_rows() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  s.join_session(session.session_id, alice).await.unwrap();

  // A generous retention keeps the fresh row.
  let removed = s.prune_presence(Duration::hours(1)).await.unwrap();
  assert_eq!(removed, 0);

  // Zero retention treats everything as stale.
  let removed = s.prune_presence(Duration::zero()).await.unwrap();
  assert_eq!(removed, 1);
  assert!(
    s.list_online_participants(session.session_id)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Message attribution ─────────────────────────────────────────────────────

#[tokio::test]
async fn post_attributes_through_membership() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let view = s
    .post_message(session.session_id, alice, text("hello"))
    .await
    .unwrap();

  assert_eq!(view.sender_user_id, Some(alice));
  assert_eq!(view.sender_display_name.as_deref(), Some("alice"));
  assert_eq!(view.message.message_type, MessageType::User);

  let membership = s
    .get_membership(group.group_id, alice)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(view.message.membership_id, membership.membership_id);
}

#[tokio::test]
async fn assistant_message_attributes_to_reserved_identity() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let view = s
    .post_message(session.session_id, alice, NewMessage {
      content:      "summary of the discussion".into(),
      message_type: MessageType::Assistant,
      reply_to:     None,
    })
    .await
    .unwrap();

  assert_eq!(view.message.message_type, MessageType::Assistant);
  assert_eq!(view.sender_user_id, Some(ASSISTANT_USER_ID));
}

#[tokio::test]
async fn non_member_post_is_forbidden_under_explicit_join() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let mallory = user(&s, "mallory").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let err = s
    .post_message(session.session_id, mallory, text("let me in"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotAMember { .. }));
  assert!(
    s.get_membership(group.group_id, mallory)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn auto_enroll_creates_membership_on_post() {
  let s = store()
    .await
    .with_enrollment_policy(EnrollmentPolicy::AutoEnroll);
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let view = s
    .post_message(session.session_id, bob, text("hi all"))
    .await
    .unwrap();
  assert_eq!(view.sender_user_id, Some(bob));

  let membership = s
    .get_membership(group.group_id, bob)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(membership.role, Role::Member);
  assert_eq!(view.message.membership_id, membership.membership_id);
}

#[tokio::test]
async fn auto_enroll_rejects_unknown_user_with_not_found() {
  let s = store()
    .await
    .with_enrollment_policy(EnrollmentPolicy::AutoEnroll);
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  // An id that was never synced must surface as a typed not-found, not a
  // constraint failure from the membership insert.
  let err = s
    .post_message(session.session_id, Uuid::new_v4(), text("who am I"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn empty_content_rejected() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let err = s
    .post_message(session.session_id, alice, text("   "))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmptyContent));
}

#[tokio::test]
async fn post_to_completed_session_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  s.end_session(session.session_id, alice).await.unwrap();

  let err = s
    .post_message(session.session_id, alice, text("too late"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionClosed(_)));
}

#[tokio::test]
async fn edit_changes_content_but_never_attribution() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  let view = s
    .post_message(session.session_id, alice, text("frist"))
    .await
    .unwrap();
  assert!(view.message.edited_at.is_none());

  let edited = s
    .edit_message(view.message.message_id, "first".into())
    .await
    .unwrap();
  assert_eq!(edited.content, "first");
  assert!(edited.edited_at.is_some());
  assert_eq!(edited.membership_id, view.message.membership_id);
}

#[tokio::test]
async fn history_survives_sender_leaving() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  s.join_by_invite_code(group.invite_code.clone(), bob)
    .await
    .unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  s.post_message(session.session_id, bob, text("I was here"))
    .await
    .unwrap();
  s.leave_group(bob, group.group_id).await.unwrap();

  // The message remains; the sender resolves to nothing.
  let messages = s.list_messages(session.session_id).await.unwrap();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].message.content, "I was here");
  assert!(messages[0].sender_user_id.is_none());
  assert!(messages[0].sender_display_name.is_none());
}

#[tokio::test]
async fn list_messages_oldest_first() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();

  for content in ["one", "two", "three"] {
    s.post_message(session.session_id, alice, text(content))
      .await
      .unwrap();
  }

  let messages = s.list_messages(session.session_id).await.unwrap();
  let contents: Vec<_> = messages
    .iter()
    .map(|m| m.message.content.as_str())
    .collect();
  assert_eq!(contents, ["one", "two", "three"]);
}

// ─── RAG state machine ───────────────────────────────────────────────────────

fn completed_update() -> RagUpdate {
  RagUpdate {
    status:      RagStatus::Completed,
    chunk_count: Some(42),
    vector_ids:  vec!["v1".into(), "v2".into()],
    error:       None,
  }
}

async fn paper(s: &SqliteStore, title: &str) -> Uuid {
  s.create_paper(NewPaper {
    title:   title.to_owned(),
    authors: vec!["A. Researcher".into()],
    doi:     None,
    tags:    vec![],
  })
  .await
  .unwrap()
  .paper_id
}

#[tokio::test]
async fn submit_creates_pending_document() {
  let s = store().await;
  let p = paper(&s, "Attention Is All You Need").await;

  let doc = s.submit_paper(p).await.unwrap();
  assert_eq!(doc.status, RagStatus::Pending);
  assert!(doc.chunk_count.is_none());
  assert!(doc.vector_ids.is_empty());
  assert!(doc.processed_at.is_none());
}

#[tokio::test]
async fn forward_transitions_record_payloads() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();

  let doc = s
    .update_rag_status(p, RagUpdate {
      status:      RagStatus::Processing,
      chunk_count: None,
      vector_ids:  vec![],
      error:       None,
    })
    .await
    .unwrap();
  assert_eq!(doc.status, RagStatus::Processing);

  let doc = s.update_rag_status(p, completed_update()).await.unwrap();
  assert_eq!(doc.status, RagStatus::Completed);
  assert_eq!(doc.chunk_count, Some(42));
  assert_eq!(doc.vector_ids, ["v1", "v2"]);
  assert!(doc.processed_at.is_some());
}

#[tokio::test]
async fn skipping_processing_is_allowed() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();

  let doc = s.update_rag_status(p, completed_update()).await.unwrap();
  assert_eq!(doc.status, RagStatus::Completed);
}

#[tokio::test]
async fn backward_transition_is_a_conflict() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();
  s.update_rag_status(p, completed_update()).await.unwrap();

  let err = s
    .update_rag_status(p, RagUpdate {
      status:      RagStatus::Processing,
      chunk_count: None,
      vector_ids:  vec![],
      error:       None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidRagTransition {
    from: RagStatus::Completed,
    to:   RagStatus::Processing,
  }));
}

#[tokio::test]
async fn same_state_update_is_idempotent() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();
  s.update_rag_status(p, completed_update()).await.unwrap();

  // A worker retrying its final report must not error.
  let doc = s.update_rag_status(p, completed_update()).await.unwrap();
  assert_eq!(doc.status, RagStatus::Completed);
}

#[tokio::test]
async fn failed_records_error_without_processed_at() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();

  let doc = s
    .update_rag_status(p, RagUpdate {
      status:      RagStatus::Failed,
      chunk_count: None,
      vector_ids:  vec![],
      error:       Some("pdf extraction failed".into()),
    })
    .await
    .unwrap();
  assert_eq!(doc.status, RagStatus::Failed);
  assert_eq!(doc.last_error.as_deref(), Some("pdf extraction failed"));
  assert!(doc.processed_at.is_none());
}

#[tokio::test]
async fn resubmission_resets_terminal_document() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();
  s.update_rag_status(p, RagUpdate {
    status:      RagStatus::Failed,
    chunk_count: None,
    vector_ids:  vec![],
    error:       Some("boom".into()),
  })
  .await
  .unwrap();

  let doc = s.submit_paper(p).await.unwrap();
  assert_eq!(doc.status, RagStatus::Pending);
  assert!(doc.last_error.is_none());
  assert!(doc.processed_at.is_none());
}

#[tokio::test]
async fn update_without_submission_is_not_found() {
  let s = store().await;
  let p = paper(&s, "paper").await;

  let err = s
    .update_rag_status(p, completed_update())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RagDocumentNotFound(_)));
}

#[tokio::test]
async fn completed_update_without_payload_is_invalid() {
  let s = store().await;
  let p = paper(&s, "paper").await;
  s.submit_paper(p).await.unwrap();

  let err = s
    .update_rag_status(p, RagUpdate {
      status:      RagStatus::Completed,
      chunk_count: None,
      vector_ids:  vec![],
      error:       None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidRagPayload(_)));
}

// ─── RAG session rollup ──────────────────────────────────────────────────────

#[tokio::test]
async fn attach_twice_is_a_conflict() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  let p = paper(&s, "paper").await;

  s.attach_paper(session.session_id, p, alice).await.unwrap();
  let err = s
    .attach_paper(session.session_id, p, alice)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PaperAlreadyLinked { .. }));
}

#[tokio::test]
async fn detach_of_unlinked_paper_is_not_found() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  let p = paper(&s, "paper").await;

  // The paper exists; the link does not.
  let err = s
    .detach_paper(session.session_id, p)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PaperNotLinked { .. }));
}

#[tokio::test]
async fn cached_counts_track_the_derived_join() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let session = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap();
  let sid = session.session_id;

  s.enable_session_rag(sid, alice).await.unwrap();

  let p1 = paper(&s, "paper one").await;
  let p2 = paper(&s, "paper two").await;
  s.attach_paper(sid, p1, alice).await.unwrap();
  s.attach_paper(sid, p2, alice).await.unwrap();

  let status = s.get_session_rag_status(sid).await.unwrap().unwrap();
  assert_eq!((status.total_papers, status.processed_papers), (2, 0));
  assert_eq!(s.session_rag_counts(sid).await.unwrap(), (2, 0));

  // Completing one paper bumps the processed count everywhere.
  s.submit_paper(p1).await.unwrap();
  s.update_rag_status(p1, completed_update()).await.unwrap();

  let status = s.get_session_rag_status(sid).await.unwrap().unwrap();
  assert_eq!((status.total_papers, status.processed_papers), (2, 1));
  assert_eq!(s.session_rag_counts(sid).await.unwrap(), (2, 1));

  // Detaching the completed paper drops both counts.
  s.detach_paper(sid, p1).await.unwrap();
  let status = s.get_session_rag_status(sid).await.unwrap().unwrap();
  assert_eq!((status.total_papers, status.processed_papers), (1, 0));
  assert_eq!(s.session_rag_counts(sid).await.unwrap(), (1, 0));
}

#[tokio::test]
async fn status_update_refreshes_every_linked_session() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let s1 = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap()
    .session_id;
  let s2 = s
    .create_session(group.group_id, alice, "week 2".into())
    .await
    .unwrap()
    .session_id;

  s.enable_session_rag(s1, alice).await.unwrap();
  s.enable_session_rag(s2, alice).await.unwrap();

  let p = paper(&s, "shared paper").await;
  s.attach_paper(s1, p, alice).await.unwrap();
  s.attach_paper(s2, p, alice).await.unwrap();

  s.submit_paper(p).await.unwrap();
  s.update_rag_status(p, completed_update()).await.unwrap();

  for sid in [s1, s2] {
    let status = s.get_session_rag_status(sid).await.unwrap().unwrap();
    assert_eq!((status.total_papers, status.processed_papers), (1, 1));
  }
}

#[tokio::test]
async fn disable_keeps_snapshot_counts() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let group = s.create_group(alice, new_group("circle")).await.unwrap();
  let sid = s
    .create_session(group.group_id, alice, "week 1".into())
    .await
    .unwrap()
    .session_id;

  s.enable_session_rag(sid, alice).await.unwrap();
  let p = paper(&s, "paper").await;
  s.attach_paper(sid, p, alice).await.unwrap();

  let status = s.disable_session_rag(sid).await.unwrap();
  assert!(!status.is_enabled);
  assert!(status.disabled_at.is_some());
  assert_eq!(status.total_papers, 1);

  // Re-enabling recomputes from the live join.
  let status = s.enable_session_rag(sid, alice).await.unwrap();
  assert!(status.is_enabled);
  assert!(status.disabled_at.is_none());
  assert_eq!(status.total_papers, 1);
}

#[tokio::test]
async fn enable_unknown_session_is_not_found() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let err = s
    .enable_session_rag(Uuid::new_v4(), alice)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}
