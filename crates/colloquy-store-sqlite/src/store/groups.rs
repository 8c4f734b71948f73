//! [`GroupStore`] impl — group creation, invite codes, membership rows,
//! and the role-transition guards.
//!
//! The sole-admin guard always counts admins inside the same transaction
//! as the write, so two concurrent demotions cannot both observe "not the
//! only admin". Duplicate joins are rejected by the UNIQUE(group_id,
//! user_id) constraint, not by a prior existence check.

use chrono::Utc;
use colloquy_core::{
  Error, Result,
  group::{Group, Member, Membership, NewGroup, Role},
  invite::{InviteCode, MAX_GENERATION_ATTEMPTS},
  store::GroupStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use super::{SqliteStore, corrupt, is_unique_violation, storage};
use crate::encode::{RawGroup, RawMember, RawMembership, encode_dt, encode_uuid};

// ─── In-closure row readers ──────────────────────────────────────────────────

fn read_group_where(
  conn: &rusqlite::Connection,
  where_clause: &str,
  param: &str,
) -> rusqlite::Result<Option<RawGroup>> {
  conn
    .query_row(
      &format!(
        "SELECT group_id, name, description, is_public, invite_code,
                created_by, created_at
         FROM groups WHERE {where_clause}"
      ),
      rusqlite::params![param],
      |row| {
        Ok(RawGroup {
          group_id:    row.get(0)?,
          name:        row.get(1)?,
          description: row.get(2)?,
          is_public:   row.get(3)?,
          invite_code: row.get(4)?,
          created_by:  row.get(5)?,
          created_at:  row.get(6)?,
        })
      },
    )
    .optional()
}

pub(super) fn read_membership(
  conn: &rusqlite::Connection,
  group_str: &str,
  user_str: &str,
) -> rusqlite::Result<Option<RawMembership>> {
  conn
    .query_row(
      "SELECT membership_id, group_id, user_id, role, joined_at
       FROM memberships WHERE group_id = ?1 AND user_id = ?2",
      rusqlite::params![group_str, user_str],
      |row| {
        Ok(RawMembership {
          membership_id: row.get(0)?,
          group_id:      row.get(1)?,
          user_id:       row.get(2)?,
          role:          row.get(3)?,
          joined_at:     row.get(4)?,
        })
      },
    )
    .optional()
}

pub(super) fn user_is_active(
  conn: &rusqlite::Connection,
  user_str: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT is_active FROM users WHERE user_id = ?1",
        rusqlite::params![user_str],
        |row| row.get::<_, bool>(0),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn role_col(s: &str) -> std::result::Result<Role, tokio_rusqlite::Error> {
  Role::parse(s).map_err(|_| corrupt(format!("bad role column {s:?}")))
}

fn admin_count(
  conn: &rusqlite::Connection,
  group_str: &str,
) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM memberships WHERE group_id = ?1 AND role = 'admin'",
    rusqlite::params![group_str],
    |row| row.get(0),
  )
}

/// Would deleting or demoting this admin strand the group without one?
///
/// Categorical: the sole admin can never be demoted, removed, or allowed
/// to leave, even as the last remaining member.
fn strands_group(
  conn: &rusqlite::Connection,
  group_str: &str,
) -> rusqlite::Result<bool> {
  Ok(admin_count(conn, group_str)? <= 1)
}

// ─── Closure outcomes ────────────────────────────────────────────────────────

enum CreateOutcome {
  Created(RawGroup, RawMembership),
  CreatorMissing,
  CodeCollision,
}

enum JoinOutcome {
  Joined(RawMembership),
  CodeNotFound,
  UserMissing,
  AlreadyMember { group: String },
}

enum RoleOutcome {
  Updated(RawMembership),
  GroupMissing,
  ActorNotMember,
  TargetNotMember,
  Forbidden { actor: Role },
  SoleAdmin,
}

enum RemoveOutcome {
  Removed,
  GroupMissing,
  ActorNotMember,
  TargetNotMember,
  Forbidden { actor: Role },
  SoleAdmin,
}

enum RegenOutcome {
  Regenerated,
  GroupMissing,
  ActorNotMember,
  Forbidden { actor: Role },
  CodeCollision,
}

// ─── GroupStore impl ─────────────────────────────────────────────────────────

impl GroupStore for SqliteStore {
  async fn create_group(&self, creator: Uuid, input: NewGroup) -> Result<Group> {
    // Bounded generate-insert-retry: the UNIQUE constraint on invite_code
    // is the real uniqueness check; a collision just means try again.
    for _ in 0..MAX_GENERATION_ATTEMPTS {
      let code = InviteCode::generate();
      let group_str = encode_uuid(Uuid::new_v4());
      let membership_str = encode_uuid(Uuid::new_v4());
      let creator_str = encode_uuid(creator);
      let now_str = encode_dt(Utc::now());
      let code_str = code.as_str().to_owned();
      let name = input.name.clone();
      let description = input.description.clone();
      let is_public = input.is_public;

      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          if !user_is_active(&tx, &creator_str)? {
            return Ok(CreateOutcome::CreatorMissing);
          }
          match tx.execute(
            "INSERT INTO groups
               (group_id, name, description, is_public, invite_code,
                created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
              group_str, name, description, is_public, code_str,
              creator_str, now_str,
            ],
          ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
              return Ok(CreateOutcome::CodeCollision);
            }
            Err(e) => return Err(e.into()),
          }
          // The creator always starts as admin.
          tx.execute(
            "INSERT INTO memberships
               (membership_id, group_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, 'admin', ?4)",
            rusqlite::params![membership_str, group_str, creator_str, now_str],
          )?;
          let group = read_group_where(&tx, "group_id = ?1", &group_str)?;
          let membership = read_membership(&tx, &group_str, &creator_str)?;
          tx.commit()?;
          match (group, membership) {
            (Some(g), Some(m)) => Ok(CreateOutcome::Created(g, m)),
            _ => Err(rusqlite::Error::QueryReturnedNoRows.into()),
          }
        })
        .await
        .map_err(storage)?;

      match outcome {
        CreateOutcome::Created(raw, _) => return raw.into_group(),
        CreateOutcome::CreatorMissing => return Err(Error::UserNotFound(creator)),
        CreateOutcome::CodeCollision => continue,
      }
    }
    Err(Error::InviteCodeExhausted(MAX_GENERATION_ATTEMPTS))
  }

  async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_group_where(conn, "group_id = ?1", &id_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn get_group_by_code(&self, code: InviteCode) -> Result<Option<Group>> {
    let code_str = code.as_str().to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(read_group_where(conn, "invite_code = ?1", &code_str)?)
      })
      .await
      .map_err(storage)?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn join_by_invite_code(
    &self,
    code: InviteCode,
    user: Uuid,
  ) -> Result<Membership> {
    let code_str = code.as_str().to_owned();
    let code_display = code_str.clone();
    let user_str = encode_uuid(user);
    let membership_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(group) = read_group_where(&tx, "invite_code = ?1", &code_str)?
        else {
          return Ok(JoinOutcome::CodeNotFound);
        };
        if !user_is_active(&tx, &user_str)? {
          return Ok(JoinOutcome::UserMissing);
        }
        match tx.execute(
          "INSERT INTO memberships
             (membership_id, group_id, user_id, role, joined_at)
           VALUES (?1, ?2, ?3, 'member', ?4)",
          rusqlite::params![membership_str, group.group_id, user_str, now_str],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(JoinOutcome::AlreadyMember { group: group.group_id });
          }
          Err(e) => return Err(e.into()),
        }
        let membership = read_membership(&tx, &group.group_id, &user_str)?;
        tx.commit()?;
        membership
          .map(JoinOutcome::Joined)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      JoinOutcome::Joined(raw) => raw.into_membership(),
      JoinOutcome::CodeNotFound => Err(Error::InviteCodeNotFound(code_display)),
      JoinOutcome::UserMissing => Err(Error::UserNotFound(user)),
      JoinOutcome::AlreadyMember { group } => Err(Error::AlreadyMember {
        group: crate::encode::decode_uuid(&group)?,
        user,
      }),
    }
  }

  async fn update_role(
    &self,
    actor: Uuid,
    group: Uuid,
    target: Uuid,
    role: Role,
  ) -> Result<Membership> {
    let group_str = encode_uuid(group);
    let actor_str = encode_uuid(actor);
    let target_str = encode_uuid(target);
    let role_str = role.as_str();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if read_group_where(&tx, "group_id = ?1", &group_str)?.is_none() {
          return Ok(RoleOutcome::GroupMissing);
        }
        let Some(actor_row) = read_membership(&tx, &group_str, &actor_str)?
        else {
          return Ok(RoleOutcome::ActorNotMember);
        };
        let actor_role = role_col(&actor_row.role)?;
        let Some(target_row) = read_membership(&tx, &group_str, &target_str)?
        else {
          return Ok(RoleOutcome::TargetNotMember);
        };
        let current = role_col(&target_row.role)?;
        if !Role::may_assign(actor_role, current, role) {
          return Ok(RoleOutcome::Forbidden { actor: actor_role });
        }
        // Demoting an admin: count admins now, in this transaction.
        if current == Role::Admin
          && role != Role::Admin
          && strands_group(&tx, &group_str)?
        {
          return Ok(RoleOutcome::SoleAdmin);
        }
        tx.execute(
          "UPDATE memberships SET role = ?1
           WHERE group_id = ?2 AND user_id = ?3",
          rusqlite::params![role_str, group_str, target_str],
        )?;
        let updated = read_membership(&tx, &group_str, &target_str)?;
        tx.commit()?;
        updated
          .map(RoleOutcome::Updated)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      RoleOutcome::Updated(raw) => raw.into_membership(),
      RoleOutcome::GroupMissing => Err(Error::GroupNotFound(group)),
      RoleOutcome::ActorNotMember => {
        Err(Error::NotAMember { group, user: actor })
      }
      RoleOutcome::TargetNotMember => {
        Err(Error::MembershipNotFound { group, user: target })
      }
      RoleOutcome::Forbidden { actor } => {
        Err(Error::InsufficientRole { actor })
      }
      RoleOutcome::SoleAdmin => Err(Error::SoleAdmin(group)),
    }
  }

  async fn leave_group(&self, user: Uuid, group: Uuid) -> Result<()> {
    let group_str = encode_uuid(group);
    let user_str = encode_uuid(user);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(row) = read_membership(&tx, &group_str, &user_str)? else {
          return Ok(RemoveOutcome::TargetNotMember);
        };
        if row.role == "admin" && strands_group(&tx, &group_str)? {
          return Ok(RemoveOutcome::SoleAdmin);
        }
        tx.execute(
          "DELETE FROM memberships WHERE group_id = ?1 AND user_id = ?2",
          rusqlite::params![group_str, user_str],
        )?;
        tx.commit()?;
        Ok(RemoveOutcome::Removed)
      })
      .await
      .map_err(storage)?;

    match outcome {
      RemoveOutcome::Removed => Ok(()),
      RemoveOutcome::SoleAdmin => Err(Error::SoleAdmin(group)),
      RemoveOutcome::TargetNotMember => {
        Err(Error::MembershipNotFound { group, user })
      }
      // leave_group has no separate actor; the remaining arms cannot occur.
      _ => Err(Error::Storage("unexpected leave outcome".into())),
    }
  }

  async fn remove_member(
    &self,
    actor: Uuid,
    group: Uuid,
    target: Uuid,
  ) -> Result<()> {
    let group_str = encode_uuid(group);
    let actor_str = encode_uuid(actor);
    let target_str = encode_uuid(target);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if read_group_where(&tx, "group_id = ?1", &group_str)?.is_none() {
          return Ok(RemoveOutcome::GroupMissing);
        }
        let Some(actor_row) = read_membership(&tx, &group_str, &actor_str)?
        else {
          return Ok(RemoveOutcome::ActorNotMember);
        };
        let actor_role = role_col(&actor_row.role)?;
        let Some(target_row) = read_membership(&tx, &group_str, &target_str)?
        else {
          return Ok(RemoveOutcome::TargetNotMember);
        };
        let target_role = role_col(&target_row.role)?;
        if !Role::may_remove(actor_role, target_role) {
          return Ok(RemoveOutcome::Forbidden { actor: actor_role });
        }
        if target_role == Role::Admin && strands_group(&tx, &group_str)? {
          return Ok(RemoveOutcome::SoleAdmin);
        }
        tx.execute(
          "DELETE FROM memberships WHERE group_id = ?1 AND user_id = ?2",
          rusqlite::params![group_str, target_str],
        )?;
        tx.commit()?;
        Ok(RemoveOutcome::Removed)
      })
      .await
      .map_err(storage)?;

    match outcome {
      RemoveOutcome::Removed => Ok(()),
      RemoveOutcome::GroupMissing => Err(Error::GroupNotFound(group)),
      RemoveOutcome::ActorNotMember => {
        Err(Error::NotAMember { group, user: actor })
      }
      RemoveOutcome::TargetNotMember => {
        Err(Error::MembershipNotFound { group, user: target })
      }
      RemoveOutcome::Forbidden { actor } => {
        Err(Error::InsufficientRole { actor })
      }
      RemoveOutcome::SoleAdmin => Err(Error::SoleAdmin(group)),
    }
  }

  async fn regenerate_invite_code(
    &self,
    group: Uuid,
    actor: Uuid,
  ) -> Result<InviteCode> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
      let code = InviteCode::generate();
      let code_str = code.as_str().to_owned();
      let group_str = encode_uuid(group);
      let actor_str = encode_uuid(actor);

      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          if read_group_where(&tx, "group_id = ?1", &group_str)?.is_none() {
            return Ok(RegenOutcome::GroupMissing);
          }
          let Some(actor_row) = read_membership(&tx, &group_str, &actor_str)?
          else {
            return Ok(RegenOutcome::ActorNotMember);
          };
          let actor_role = role_col(&actor_row.role)?;
          if actor_role != Role::Admin {
            return Ok(RegenOutcome::Forbidden { actor: actor_role });
          }
          // The old code stops resolving the instant this commits.
          match tx.execute(
            "UPDATE groups SET invite_code = ?1 WHERE group_id = ?2",
            rusqlite::params![code_str, group_str],
          ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
              return Ok(RegenOutcome::CodeCollision);
            }
            Err(e) => return Err(e.into()),
          }
          tx.commit()?;
          Ok(RegenOutcome::Regenerated)
        })
        .await
        .map_err(storage)?;

      match outcome {
        RegenOutcome::Regenerated => return Ok(code),
        RegenOutcome::GroupMissing => return Err(Error::GroupNotFound(group)),
        RegenOutcome::ActorNotMember => {
          return Err(Error::NotAMember { group, user: actor });
        }
        RegenOutcome::Forbidden { actor } => {
          return Err(Error::InsufficientRole { actor });
        }
        RegenOutcome::CodeCollision => continue,
      }
    }
    Err(Error::InviteCodeExhausted(MAX_GENERATION_ATTEMPTS))
  }

  async fn list_members(&self, group: Uuid) -> Result<Vec<Member>> {
    let group_str = encode_uuid(group);
    let raws: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.membership_id, m.group_id, m.user_id, m.role, m.joined_at,
                  u.email, u.display_name, u.is_active
           FROM memberships m
           JOIN users u ON u.user_id = m.user_id
           WHERE m.group_id = ?1
           ORDER BY m.joined_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str], |row| {
            Ok(RawMember {
              membership:   RawMembership {
                membership_id: row.get(0)?,
                group_id:      row.get(1)?,
                user_id:       row.get(2)?,
                role:          row.get(3)?,
                joined_at:     row.get(4)?,
              },
              email:        row.get(5)?,
              display_name: row.get(6)?,
              is_active:    row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(storage)?;

    raws.into_iter().map(RawMember::into_member).collect()
  }

  async fn get_membership(
    &self,
    group: Uuid,
    user: Uuid,
  ) -> Result<Option<Membership>> {
    let group_str = encode_uuid(group);
    let user_str = encode_uuid(user);
    let raw = self
      .conn
      .call(move |conn| Ok(read_membership(conn, &group_str, &user_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawMembership::into_membership).transpose()
  }
}
