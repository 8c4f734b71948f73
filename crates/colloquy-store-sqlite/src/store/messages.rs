//! [`MessageStore`] impl — posting with membership-based attribution.
//!
//! The sender membership is resolved (or, under `AutoEnroll`, created)
//! inside the same transaction that inserts the message, so a concurrent
//! leave/join cannot slip between resolution and insert.

use chrono::Utc;
use colloquy_core::{
  Error, Result,
  identity::ASSISTANT_USER_ID,
  message::{EnrollmentPolicy, Message, MessageType, MessageView, NewMessage},
  store::MessageStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use super::{
  SqliteStore, storage,
  groups::{read_membership, user_is_active},
  sessions::{mark_presence_online, read_session},
};
use crate::encode::{
  RawMessage, RawMessageView, encode_dt, encode_uuid,
};

const VIEW_COLUMNS: &str = "
  msg.message_id, msg.session_id, msg.membership_id, msg.message_type,
  msg.content, msg.sent_at, msg.edited_at, msg.reply_to,
  m.user_id AS sender_user_id,
  u.display_name AS sender_display_name";

fn view_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMessageView> {
  Ok(RawMessageView {
    message:             RawMessage {
      message_id:    row.get(0)?,
      session_id:    row.get(1)?,
      membership_id: row.get(2)?,
      message_type:  row.get(3)?,
      content:       row.get(4)?,
      sent_at:       row.get(5)?,
      edited_at:     row.get(6)?,
      reply_to:      row.get(7)?,
    },
    sender_user_id:      row.get(8)?,
    sender_display_name: row.get(9)?,
  })
}

fn read_message_view(
  conn: &rusqlite::Connection,
  message_str: &str,
) -> rusqlite::Result<Option<RawMessageView>> {
  conn
    .query_row(
      &format!(
        "SELECT {VIEW_COLUMNS}
         FROM messages msg
         LEFT JOIN memberships m ON m.membership_id = msg.membership_id
         LEFT JOIN users u ON u.user_id = m.user_id
         WHERE msg.message_id = ?1"
      ),
      rusqlite::params![message_str],
      view_from_row,
    )
    .optional()
}

enum PostOutcome {
  Posted { view: RawMessageView, auto_enrolled: bool },
  SessionMissing,
  SenderMissing,
  Closed,
  NotAMember { group: String },
}

enum EditOutcome {
  Edited(RawMessage),
  Missing,
}

impl MessageStore for SqliteStore {
  async fn post_message(
    &self,
    session: Uuid,
    actor: Uuid,
    input: NewMessage,
  ) -> Result<MessageView> {
    if input.content.trim().is_empty() {
      return Err(Error::EmptyContent);
    }

    // Assistant-typed messages attribute to the reserved identity; the
    // message_type column stays the single source of truth for authorship.
    let sender = if input.message_type == MessageType::Assistant {
      ASSISTANT_USER_ID
    } else {
      actor
    };

    let policy = self.policy;
    let session_str = encode_uuid(session);
    let sender_str = encode_uuid(sender);
    let message_str = encode_uuid(Uuid::new_v4());
    let membership_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(Utc::now());
    let message_type = input.message_type;
    let content = input.content;
    let reply_to_str = input.reply_to.map(encode_uuid);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(sess) = read_session(&tx, &session_str)? else {
          return Ok(PostOutcome::SessionMissing);
        };
        if sess.status != "active" {
          return Ok(PostOutcome::Closed);
        }

        let mut auto_enrolled = false;
        let membership_id =
          match read_membership(&tx, &sess.group_id, &sender_str)? {
            Some(row) => row.membership_id,
            None => {
              // The assistant enrolls outside the policy; users enroll
              // only when the store was opened with AutoEnroll.
              let may_enroll = message_type == MessageType::Assistant
                || policy == EnrollmentPolicy::AutoEnroll;
              if !may_enroll {
                return Ok(PostOutcome::NotAMember { group: sess.group_id });
              }
              if !user_is_active(&tx, &sender_str)? {
                return Ok(PostOutcome::SenderMissing);
              }
              tx.execute(
                "INSERT INTO memberships
                   (membership_id, group_id, user_id, role, joined_at)
                 VALUES (?1, ?2, ?3, 'member', ?4)",
                rusqlite::params![
                  membership_str, sess.group_id, sender_str, now_str,
                ],
              )?;
              auto_enrolled = message_type != MessageType::Assistant;
              membership_str.clone()
            }
          };

        tx.execute(
          "INSERT INTO messages
             (message_id, session_id, membership_id, message_type, content,
              sent_at, reply_to)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            message_str, session_str, membership_id,
            message_type.as_str(), content, now_str, reply_to_str,
          ],
        )?;

        if message_type != MessageType::Assistant {
          mark_presence_online(&tx, &session_str, &sender_str, &now_str)?;
        }

        let view = read_message_view(&tx, &message_str)?;
        tx.commit()?;
        view
          .map(|view| PostOutcome::Posted { view, auto_enrolled })
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      PostOutcome::Posted { view, auto_enrolled } => {
        if auto_enrolled {
          tracing::info!(
            user = %sender,
            session = %session,
            "auto-enrolled user into group on message send"
          );
        }
        view.into_view()
      }
      PostOutcome::SessionMissing => Err(Error::SessionNotFound(session)),
      PostOutcome::SenderMissing => Err(Error::UserNotFound(sender)),
      PostOutcome::Closed => Err(Error::SessionClosed(session)),
      PostOutcome::NotAMember { group } => Err(Error::NotAMember {
        group: crate::encode::decode_uuid(&group)?,
        user: sender,
      }),
    }
  }

  async fn edit_message(
    &self,
    message: Uuid,
    new_content: String,
  ) -> Result<Message> {
    if new_content.trim().is_empty() {
      return Err(Error::EmptyContent);
    }
    let message_str = encode_uuid(message);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE messages SET content = ?1, edited_at = ?2
           WHERE message_id = ?3",
          rusqlite::params![new_content, now_str, message_str],
        )?;
        if changed == 0 {
          return Ok(EditOutcome::Missing);
        }
        let raw = tx
          .query_row(
            "SELECT message_id, session_id, membership_id, message_type,
                    content, sent_at, edited_at, reply_to
             FROM messages WHERE message_id = ?1",
            rusqlite::params![message_str],
            |row| {
              Ok(RawMessage {
                message_id:    row.get(0)?,
                session_id:    row.get(1)?,
                membership_id: row.get(2)?,
                message_type:  row.get(3)?,
                content:       row.get(4)?,
                sent_at:       row.get(5)?,
                edited_at:     row.get(6)?,
                reply_to:      row.get(7)?,
              })
            },
          )
          .optional()?;
        tx.commit()?;
        raw
          .map(EditOutcome::Edited)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      EditOutcome::Edited(raw) => raw.into_message(),
      EditOutcome::Missing => Err(Error::MessageNotFound(message)),
    }
  }

  async fn list_messages(&self, session: Uuid) -> Result<Vec<MessageView>> {
    let session_str = encode_uuid(session);
    let raws: Vec<RawMessageView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VIEW_COLUMNS}
           FROM messages msg
           LEFT JOIN memberships m ON m.membership_id = msg.membership_id
           LEFT JOIN users u ON u.user_id = m.user_id
           WHERE msg.session_id = ?1
           ORDER BY msg.sent_at ASC, msg.message_id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![session_str], view_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(storage)?;

    raws.into_iter().map(RawMessageView::into_view).collect()
  }
}
