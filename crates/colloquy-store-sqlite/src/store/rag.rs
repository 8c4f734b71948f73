//! [`RagStore`] impl — papers, the per-paper indexing state machine, and
//! the cached per-session rollup.
//!
//! Every write that can change a session's paper counts (attach, detach,
//! worker status report, enable) recomputes the cached row inside its own
//! transaction, so the cache never drifts further than a single in-flight
//! write from the derived join.

use chrono::Utc;
use colloquy_core::{
  Error, Result,
  rag::{NewPaper, Paper, RagDocument, RagStatus, RagUpdate, SessionRagStatus},
  store::RagStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use super::{
  SqliteStore, corrupt, is_unique_violation, recompute_rag_counts, storage,
};
use crate::encode::{
  RawPaper, RawRagDocument, RawSessionRagStatus, encode_dt, encode_list,
  encode_uuid,
};

// ─── In-closure row readers ──────────────────────────────────────────────────

fn read_paper(
  conn: &rusqlite::Connection,
  paper_str: &str,
) -> rusqlite::Result<Option<RawPaper>> {
  conn
    .query_row(
      "SELECT paper_id, title, authors, doi, tags, created_at
       FROM papers WHERE paper_id = ?1",
      rusqlite::params![paper_str],
      |row| {
        Ok(RawPaper {
          paper_id:   row.get(0)?,
          title:      row.get(1)?,
          authors:    row.get(2)?,
          doi:        row.get(3)?,
          tags:       row.get(4)?,
          created_at: row.get(5)?,
        })
      },
    )
    .optional()
}

fn read_document(
  conn: &rusqlite::Connection,
  paper_str: &str,
) -> rusqlite::Result<Option<RawRagDocument>> {
  conn
    .query_row(
      "SELECT paper_id, status, chunk_count, vector_ids, last_error,
              submitted_at, processed_at
       FROM rag_documents WHERE paper_id = ?1",
      rusqlite::params![paper_str],
      |row| {
        Ok(RawRagDocument {
          paper_id:     row.get(0)?,
          status:       row.get(1)?,
          chunk_count:  row.get(2)?,
          vector_ids:   row.get(3)?,
          last_error:   row.get(4)?,
          submitted_at: row.get(5)?,
          processed_at: row.get(6)?,
        })
      },
    )
    .optional()
}

fn read_status_row(
  conn: &rusqlite::Connection,
  session_str: &str,
) -> rusqlite::Result<Option<RawSessionRagStatus>> {
  conn
    .query_row(
      "SELECT session_id, is_enabled, enabled_by, enabled_at, disabled_at,
              total_papers, processed_papers
       FROM session_rag_status WHERE session_id = ?1",
      rusqlite::params![session_str],
      |row| {
        Ok(RawSessionRagStatus {
          session_id:       row.get(0)?,
          is_enabled:       row.get(1)?,
          enabled_by:       row.get(2)?,
          enabled_at:       row.get(3)?,
          disabled_at:      row.get(4)?,
          total_papers:     row.get(5)?,
          processed_papers: row.get(6)?,
        })
      },
    )
    .optional()
}

fn session_exists(
  conn: &rusqlite::Connection,
  session_str: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sessions WHERE session_id = ?1",
        rusqlite::params![session_str],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn status_col(
  s: &str,
) -> std::result::Result<RagStatus, tokio_rusqlite::Error> {
  RagStatus::parse(s).map_err(|_| corrupt(format!("bad rag status {s:?}")))
}

// ─── Closure outcomes ────────────────────────────────────────────────────────

enum LinkOutcome {
  Linked,
  SessionMissing,
  PaperMissing,
  UserMissing,
  AlreadyLinked,
}

enum UnlinkOutcome {
  Unlinked,
  LinkMissing,
}

enum UpdateOutcome {
  Updated(RawRagDocument),
  DocumentMissing,
  BadTransition { from: RagStatus },
}

enum StatusOutcome {
  Ok(RawSessionRagStatus),
  SessionMissing,
}

// ─── RagStore impl ───────────────────────────────────────────────────────────

impl RagStore for SqliteStore {
  async fn create_paper(&self, input: NewPaper) -> Result<Paper> {
    let paper_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(Utc::now());
    let authors_str = encode_list(&input.authors);
    let tags_str = encode_list(&input.tags);
    let title = input.title;
    let doi = input.doi;

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO papers (paper_id, title, authors, doi, tags, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![paper_str, title, authors_str, doi, tags_str, now_str],
        )?;
        read_paper(conn, &paper_str)?
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    raw.into_paper()
  }

  async fn get_paper(&self, id: Uuid) -> Result<Option<Paper>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_paper(conn, &id_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawPaper::into_paper).transpose()
  }

  async fn attach_paper(
    &self,
    session: Uuid,
    paper: Uuid,
    added_by: Uuid,
  ) -> Result<()> {
    let session_str = encode_uuid(session);
    let paper_str = encode_uuid(paper);
    let user_str = encode_uuid(added_by);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !session_exists(&tx, &session_str)? {
          return Ok(LinkOutcome::SessionMissing);
        }
        if read_paper(&tx, &paper_str)?.is_none() {
          return Ok(LinkOutcome::PaperMissing);
        }
        if !super::groups::user_is_active(&tx, &user_str)? {
          return Ok(LinkOutcome::UserMissing);
        }
        match tx.execute(
          "INSERT INTO session_papers (session_id, paper_id, added_by, added_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![session_str, paper_str, user_str, now_str],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(LinkOutcome::AlreadyLinked);
          }
          Err(e) => return Err(e.into()),
        }
        recompute_rag_counts(&tx, &session_str)?;
        tx.commit()?;
        Ok(LinkOutcome::Linked)
      })
      .await
      .map_err(storage)?;

    match outcome {
      LinkOutcome::Linked => Ok(()),
      LinkOutcome::SessionMissing => Err(Error::SessionNotFound(session)),
      LinkOutcome::PaperMissing => Err(Error::PaperNotFound(paper)),
      LinkOutcome::UserMissing => Err(Error::UserNotFound(added_by)),
      LinkOutcome::AlreadyLinked => {
        Err(Error::PaperAlreadyLinked { session, paper })
      }
    }
  }

  async fn detach_paper(&self, session: Uuid, paper: Uuid) -> Result<()> {
    let session_str = encode_uuid(session);
    let paper_str = encode_uuid(paper);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM session_papers WHERE session_id = ?1 AND paper_id = ?2",
          rusqlite::params![session_str, paper_str],
        )?;
        if removed == 0 {
          return Ok(UnlinkOutcome::LinkMissing);
        }
        recompute_rag_counts(&tx, &session_str)?;
        tx.commit()?;
        Ok(UnlinkOutcome::Unlinked)
      })
      .await
      .map_err(storage)?;

    match outcome {
      UnlinkOutcome::Unlinked => Ok(()),
      UnlinkOutcome::LinkMissing => {
        Err(Error::PaperNotLinked { session, paper })
      }
    }
  }

  async fn submit_paper(&self, paper: Uuid) -> Result<RagDocument> {
    let paper_str = encode_uuid(paper);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if read_paper(&tx, &paper_str)?.is_none() {
          return Ok(None);
        }
        // Upsert-and-reset: re-submission is the one path that leaves a
        // terminal status, and it starts the machine over from pending.
        tx.execute(
          "INSERT INTO rag_documents
             (paper_id, status, chunk_count, vector_ids, last_error,
              submitted_at, processed_at)
           VALUES (?1, 'pending', NULL, '[]', NULL, ?2, NULL)
           ON CONFLICT (paper_id) DO UPDATE SET
             status = 'pending', chunk_count = NULL, vector_ids = '[]',
             last_error = NULL, submitted_at = excluded.submitted_at,
             processed_at = NULL",
          rusqlite::params![paper_str, now_str],
        )?;
        // Resetting a completed document lowers processed counts.
        recompute_counts_for_paper(&tx, &paper_str)?;
        let doc = read_document(&tx, &paper_str)?;
        tx.commit()?;
        Ok(doc)
      })
      .await
      .map_err(storage)?;

    outcome
      .ok_or(Error::PaperNotFound(paper))?
      .into_document()
  }

  async fn update_rag_status(
    &self,
    paper: Uuid,
    update: RagUpdate,
  ) -> Result<RagDocument> {
    update.validate()?;

    let paper_str = encode_uuid(paper);
    let now_str = encode_dt(Utc::now());
    let next = update.status;
    let chunk_count = update.chunk_count;
    let vector_ids_str = encode_list(&update.vector_ids);
    let error_msg = update.error;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = read_document(&tx, &paper_str)? else {
          return Ok(UpdateOutcome::DocumentMissing);
        };
        let from = status_col(&current.status)?;
        if !from.can_transition_to(next) {
          return Ok(UpdateOutcome::BadTransition { from });
        }
        match next {
          RagStatus::Completed => {
            tx.execute(
              "UPDATE rag_documents SET
                 status = 'completed', chunk_count = ?1, vector_ids = ?2,
                 last_error = NULL, processed_at = ?3
               WHERE paper_id = ?4",
              rusqlite::params![chunk_count, vector_ids_str, now_str, paper_str],
            )?;
          }
          RagStatus::Failed => {
            tx.execute(
              "UPDATE rag_documents SET
                 status = 'failed', last_error = ?1, processed_at = NULL
               WHERE paper_id = ?2",
              rusqlite::params![error_msg, paper_str],
            )?;
          }
          RagStatus::Pending | RagStatus::Processing => {
            tx.execute(
              "UPDATE rag_documents SET status = ?1 WHERE paper_id = ?2",
              rusqlite::params![next.as_str(), paper_str],
            )?;
          }
        }
        recompute_counts_for_paper(&tx, &paper_str)?;
        let doc = read_document(&tx, &paper_str)?;
        tx.commit()?;
        doc
          .map(UpdateOutcome::Updated)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      UpdateOutcome::Updated(raw) => raw.into_document(),
      UpdateOutcome::DocumentMissing => Err(Error::RagDocumentNotFound(paper)),
      UpdateOutcome::BadTransition { from } => {
        Err(Error::InvalidRagTransition { from, to: next })
      }
    }
  }

  async fn get_rag_document(&self, paper: Uuid) -> Result<Option<RagDocument>> {
    let paper_str = encode_uuid(paper);
    let raw = self
      .conn
      .call(move |conn| Ok(read_document(conn, &paper_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawRagDocument::into_document).transpose()
  }

  async fn enable_session_rag(
    &self,
    session: Uuid,
    actor: Uuid,
  ) -> Result<SessionRagStatus> {
    let session_str = encode_uuid(session);
    let actor_str = encode_uuid(actor);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !session_exists(&tx, &session_str)? {
          return Ok(StatusOutcome::SessionMissing);
        }
        tx.execute(
          "INSERT INTO session_rag_status
             (session_id, is_enabled, enabled_by, enabled_at, disabled_at)
           VALUES (?1, 1, ?2, ?3, NULL)
           ON CONFLICT (session_id) DO UPDATE SET
             is_enabled = 1, enabled_by = excluded.enabled_by,
             enabled_at = excluded.enabled_at, disabled_at = NULL",
          rusqlite::params![session_str, actor_str, now_str],
        )?;
        // Counts are recomputed at the moment of the call, in the same
        // transaction as the upsert.
        recompute_rag_counts(&tx, &session_str)?;
        let row = read_status_row(&tx, &session_str)?;
        tx.commit()?;
        row
          .map(StatusOutcome::Ok)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      StatusOutcome::Ok(raw) => raw.into_status(),
      StatusOutcome::SessionMissing => Err(Error::SessionNotFound(session)),
    }
  }

  async fn disable_session_rag(&self, session: Uuid) -> Result<SessionRagStatus> {
    let session_str = encode_uuid(session);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !session_exists(&tx, &session_str)? {
          return Ok(StatusOutcome::SessionMissing);
        }
        // Counts deliberately keep their last-known snapshot values.
        tx.execute(
          "INSERT INTO session_rag_status
             (session_id, is_enabled, disabled_at)
           VALUES (?1, 0, ?2)
           ON CONFLICT (session_id) DO UPDATE SET
             is_enabled = 0, disabled_at = excluded.disabled_at",
          rusqlite::params![session_str, now_str],
        )?;
        let row = read_status_row(&tx, &session_str)?;
        tx.commit()?;
        row
          .map(StatusOutcome::Ok)
          .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await
      .map_err(storage)?;

    match outcome {
      StatusOutcome::Ok(raw) => raw.into_status(),
      StatusOutcome::SessionMissing => Err(Error::SessionNotFound(session)),
    }
  }

  async fn get_session_rag_status(
    &self,
    session: Uuid,
  ) -> Result<Option<SessionRagStatus>> {
    let session_str = encode_uuid(session);
    let raw = self
      .conn
      .call(move |conn| Ok(read_status_row(conn, &session_str)?))
      .await
      .map_err(storage)?;
    raw.map(RawSessionRagStatus::into_status).transpose()
  }

  async fn session_rag_counts(&self, session: Uuid) -> Result<(u32, u32)> {
    let session_str = encode_uuid(session);
    self
      .conn
      .call(move |conn| {
        let counts = conn.query_row(
          "SELECT
             COUNT(*),
             COUNT(CASE WHEN rd.status = 'completed' THEN 1 END)
           FROM session_papers sp
           LEFT JOIN rag_documents rd ON rd.paper_id = sp.paper_id
           WHERE sp.session_id = ?1",
          rusqlite::params![session_str],
          |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
        )?;
        Ok(counts)
      })
      .await
      .map_err(storage)
  }
}

/// Refresh the cached counts of every session this paper is linked to,
/// inside the caller's transaction.
fn recompute_counts_for_paper(
  conn: &rusqlite::Connection,
  paper_str: &str,
) -> rusqlite::Result<()> {
  let sessions: Vec<String> = {
    let mut stmt = conn.prepare(
      "SELECT session_id FROM session_papers WHERE paper_id = ?1",
    )?;
    stmt
      .query_map(rusqlite::params![paper_str], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  for session_str in &sessions {
    recompute_rag_counts(conn, session_str)?;
  }
  Ok(())
}
