//! [`SessionStore`] impl — session lifecycle, participation, presence.

use chrono::{Duration, Utc};
use colloquy_core::{
  Error, Result,
  identity::User,
  session::Session,
  store::SessionStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use super::{SqliteStore, groups::read_membership, storage};
use crate::encode::{RawSession, RawUser, encode_dt, encode_uuid};

pub(super) fn read_session(
  conn: &rusqlite::Connection,
  session_str: &str,
) -> rusqlite::Result<Option<RawSession>> {
  conn
    .query_row(
      "SELECT session_id, group_id, title, status, created_by,
              started_at, ended_at
       FROM sessions WHERE session_id = ?1",
      rusqlite::params![session_str],
      |row| {
        Ok(RawSession {
          session_id: row.get(0)?,
          group_id:   row.get(1)?,
          title:      row.get(2)?,
          status:     row.get(3)?,
          created_by: row.get(4)?,
          started_at: row.get(5)?,
          ended_at:   row.get(6)?,
        })
      },
    )
    .optional()
}

/// Idempotent participant insert; the (session, user) primary key absorbs
/// re-joins.
pub(super) fn insert_participant(
  conn: &rusqlite::Connection,
  session_str: &str,
  user_str: &str,
  now_str: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO session_participants (session_id, user_id, joined_at)
     VALUES (?1, ?2, ?3)",
    rusqlite::params![session_str, user_str, now_str],
  )?;
  Ok(())
}

pub(super) fn mark_presence_online(
  conn: &rusqlite::Connection,
  session_str: &str,
  user_str: &str,
  now_str: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO session_presence (session_id, user_id, status, last_seen_at)
     VALUES (?1, ?2, 'online', ?3)
     ON CONFLICT (session_id, user_id) DO UPDATE SET
       status = 'online', last_seen_at = excluded.last_seen_at",
    rusqlite::params![session_str, user_str, now_str],
  )?;
  Ok(())
}

enum SessionOutcome<T> {
  Ok(T),
  /// The referenced group or session does not exist.
  Missing,
  NotAMember { group: String },
}

impl SessionStore for SqliteStore {
  async fn create_session(
    &self,
    group: Uuid,
    creator: Uuid,
    title: String,
  ) -> Result<Session> {
    let group_str = encode_uuid(group);
    let creator_str = encode_uuid(creator);
    let session_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let group_exists: bool = tx
          .query_row(
            "SELECT 1 FROM groups WHERE group_id = ?1",
            rusqlite::params![group_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !group_exists {
          return Ok(SessionOutcome::Missing);
        }
        if read_membership(&tx, &group_str, &creator_str)?.is_none() {
          return Ok(SessionOutcome::NotAMember { group: group_str });
        }
        tx.execute(
          "INSERT INTO sessions
             (session_id, group_id, title, status, created_by, started_at)
           VALUES (?1, ?2, ?3, 'active', ?4, ?5)",
          rusqlite::params![session_str, group_str, title, creator_str, now_str],
        )?;
        insert_participant(&tx, &session_str, &creator_str, &now_str)?;
        let session = read_session(&tx, &session_str)?;
        tx.commit()?;
        session
          .map(SessionOutcome::Ok)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      SessionOutcome::Ok(raw) => raw.into_session(),
      SessionOutcome::Missing => Err(Error::GroupNotFound(group)),
      SessionOutcome::NotAMember { .. } => {
        Err(Error::NotAMember { group, user: creator })
      }
    }
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_session(conn, &id_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn join_session(&self, session: Uuid, user: Uuid) -> Result<()> {
    let session_str = encode_uuid(session);
    let user_str = encode_uuid(user);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(sess) = read_session(&tx, &session_str)? else {
          return Ok(SessionOutcome::Missing);
        };
        if read_membership(&tx, &sess.group_id, &user_str)?.is_none() {
          return Ok(SessionOutcome::NotAMember { group: sess.group_id });
        }
        insert_participant(&tx, &session_str, &user_str, &now_str)?;
        mark_presence_online(&tx, &session_str, &user_str, &now_str)?;
        tx.commit()?;
        Ok(SessionOutcome::Ok(()))
      })
      .await
      .map_err(storage)?;

    match outcome {
      SessionOutcome::Ok(()) => Ok(()),
      SessionOutcome::Missing => Err(Error::SessionNotFound(session)),
      SessionOutcome::NotAMember { group } => Err(Error::NotAMember {
        group: crate::encode::decode_uuid(&group)?,
        user,
      }),
    }
  }

  async fn end_session(&self, session: Uuid, actor: Uuid) -> Result<Session> {
    let session_str = encode_uuid(session);
    let actor_str = encode_uuid(actor);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(sess) = read_session(&tx, &session_str)? else {
          return Ok(SessionOutcome::Missing);
        };
        if read_membership(&tx, &sess.group_id, &actor_str)?.is_none() {
          return Ok(SessionOutcome::NotAMember { group: sess.group_id });
        }
        // Idempotent: an already-ended session keeps its original ended_at.
        tx.execute(
          "UPDATE sessions SET status = 'completed', ended_at = ?1
           WHERE session_id = ?2 AND status = 'active'",
          rusqlite::params![now_str, session_str],
        )?;
        let updated = read_session(&tx, &session_str)?;
        tx.commit()?;
        updated
          .map(SessionOutcome::Ok)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      SessionOutcome::Ok(raw) => raw.into_session(),
      SessionOutcome::Missing => Err(Error::SessionNotFound(session)),
      SessionOutcome::NotAMember { group } => Err(Error::NotAMember {
        group: crate::encode::decode_uuid(&group)?,
        user: actor,
      }),
    }
  }

  async fn list_online_participants(&self, session: Uuid) -> Result<Vec<User>> {
    let session_str = encode_uuid(session);
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.email, u.display_name, u.is_active, u.created_at
           FROM session_presence p
           JOIN users u ON u.user_id = p.user_id
           WHERE p.session_id = ?1 AND p.status = 'online'
           ORDER BY p.last_seen_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![session_str], |row| {
            Ok(RawUser {
              user_id:      row.get(0)?,
              email:        row.get(1)?,
              display_name: row.get(2)?,
              is_active:    row.get(3)?,
              created_at:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(storage)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn prune_presence(&self, retention: Duration) -> Result<usize> {
    let cutoff_str = encode_dt(Utc::now() - retention);
    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM session_presence WHERE last_seen_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        Ok(n)
      })
      .await
      .map_err(storage)?;

    if removed > 0 {
      tracing::info!(removed, "pruned stale presence rows");
    }
    Ok(removed)
  }
}
