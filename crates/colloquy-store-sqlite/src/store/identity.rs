//! [`IdentityStore`] impl — the auth-sync upsert and soft deactivation.

use chrono::Utc;
use colloquy_core::{
  Error, Result,
  identity::{NewUser, User},
  store::IdentityStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::encode::{RawUser, encode_dt, encode_uuid};
use super::{SqliteStore, storage};

fn read_user(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      "SELECT user_id, email, display_name, is_active, created_at
       FROM users WHERE user_id = ?1",
      rusqlite::params![id_str],
      |row| {
        Ok(RawUser {
          user_id:      row.get(0)?,
          email:        row.get(1)?,
          display_name: row.get(2)?,
          is_active:    row.get(3)?,
          created_at:   row.get(4)?,
        })
      },
    )
    .optional()
}

impl IdentityStore for SqliteStore {
  async fn sync_user(&self, input: NewUser) -> Result<User> {
    let id_str = encode_uuid(input.user_id);
    let now_str = encode_dt(Utc::now());
    let email = input.email;
    let display_name = input.display_name;

    let raw = self
      .conn
      .call(move |conn| {
        // Upsert keyed on the auth provider's id; re-sync refreshes the
        // profile fields and reactivates.
        conn.execute(
          "INSERT INTO users (user_id, email, display_name, is_active, created_at)
           VALUES (?1, ?2, ?3, 1, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             email = excluded.email,
             display_name = excluded.display_name,
             is_active = 1",
          rusqlite::params![id_str, email, display_name, now_str],
        )?;
        let raw = read_user(conn, &id_str)?;
        Ok(raw)
      })
      .await
      .map_err(storage)?;

    raw
      .ok_or_else(|| Error::Storage("user vanished mid-sync".into()))?
      .into_user()
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_user(conn, &id_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn deactivate_user(&self, id: Uuid) -> Result<User> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE users SET is_active = 0 WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(read_user(conn, &id_str)?)
      })
      .await
      .map_err(storage)?;

    raw.ok_or(Error::UserNotFound(id))?.into_user()
  }
}
