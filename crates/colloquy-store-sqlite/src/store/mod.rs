//! [`SqliteStore`] — shared plumbing for the per-component trait impls.
//!
//! All access goes through one `tokio_rusqlite` connection, so every
//! `conn.call` closure runs alone on the database thread; an explicit
//! transaction inside a closure is therefore both atomic and isolated from
//! every other store call. Closures report domain outcomes (not found,
//! conflict, ...) as plain enum values and the async side maps them to
//! errors — `tokio_rusqlite::Error` stays reserved for real driver faults.

mod groups;
mod identity;
mod messages;
mod rag;
mod sessions;

use std::path::Path;

use chrono::Utc;
use colloquy_core::{
  Error, Result,
  identity::ASSISTANT_USER_ID,
  message::EnrollmentPolicy,
};

use crate::schema::SCHEMA;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Colloquy data layer backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: EnrollmentPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(storage)?;
    let store = Self { conn, policy: EnrollmentPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(storage)?;
    let store = Self { conn, policy: EnrollmentPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Set the enrollment policy applied by
  /// [`colloquy_core::store::MessageStore::post_message`].
  pub fn with_enrollment_policy(mut self, policy: EnrollmentPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn enrollment_policy(&self) -> EnrollmentPolicy { self.policy }

  async fn init_schema(&self) -> Result<()> {
    let assistant_id = crate::encode::encode_uuid(ASSISTANT_USER_ID);
    let now = crate::encode::encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(SCHEMA)?;
        // Seed the reserved assistant identity so attribution-via-membership
        // holds for assistant-authored messages.
        conn.execute(
          "INSERT OR IGNORE INTO users (user_id, email, display_name, is_active, created_at)
           VALUES (?1, 'assistant@colloquy.internal', 'Assistant', 1, ?2)",
          rusqlite::params![assistant_id, now],
        )?;
        Ok(())
      })
      .await
      .map_err(storage)
  }
}

// ─── Helpers shared by the trait impls ───────────────────────────────────────

/// Fold a driver error into the domain's storage kind. Raw driver errors
/// never cross the trait boundary.
pub(crate) fn storage(e: tokio_rusqlite::Error) -> Error {
  Error::Storage(e.to_string())
}

/// A corrupt-row fault raised from inside a `conn.call` closure.
pub(crate) fn corrupt(msg: String) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(msg.into())
}

/// True when an INSERT bounced off a UNIQUE or PRIMARY KEY constraint —
/// the signal that a concurrent writer got there first.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(info, _)
      if info.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// Recompute the cached RAG counts for one session, inside the caller's
/// transaction. A no-op when the session has no status row.
pub(crate) fn recompute_rag_counts(
  conn: &rusqlite::Connection,
  session_id: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE session_rag_status SET
       total_papers = (
         SELECT COUNT(*) FROM session_papers sp
         WHERE sp.session_id = session_rag_status.session_id
       ),
       processed_papers = (
         SELECT COUNT(*) FROM session_papers sp
         JOIN rag_documents rd ON rd.paper_id = sp.paper_id
         WHERE sp.session_id = session_rag_status.session_id
           AND rd.status = 'completed'
       )
     WHERE session_id = ?1",
    rusqlite::params![session_id],
  )?;
  Ok(())
}
