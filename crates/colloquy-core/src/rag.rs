//! Papers, the per-paper indexing state machine, and the per-session rollup.
//!
//! A paper submitted for indexing gets exactly one `RagDocument` whose
//! status only moves forward: `pending → processing → {completed, failed}`.
//! Forward jumps are allowed (a worker may never report `processing`);
//! backward transitions are conflicts; same-state updates are idempotent.
//! Re-submission is the single reset path and re-creates the document as
//! `pending` (upsert-and-reset).
//!
//! The session-level status row caches paper counts for convenience. The
//! derived join over `SessionPaper → RagDocument` stays the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Paper ───────────────────────────────────────────────────────────────────

/// A research paper; independent of any group or session, linked to
/// sessions many-to-many. Bibliographic metadata is deliberately minimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
  pub paper_id:   Uuid,
  pub title:      String,
  pub authors:    Vec<String>,
  pub doi:        Option<String>,
  pub tags:       Vec<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RagStore::create_paper`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPaper {
  pub title:   String,
  #[serde(default)]
  pub authors: Vec<String>,
  pub doi:     Option<String>,
  #[serde(default)]
  pub tags:    Vec<String>,
}

/// A (session × paper) link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPaper {
  pub session_id: Uuid,
  pub paper_id:   Uuid,
  pub added_by:   Uuid,
  pub added_at:   DateTime<Utc>,
}

// ─── Processing status ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl RagStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Processing => "processing",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "processing" => Ok(Self::Processing),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      other => Err(Error::UnknownRagStatus(other.to_owned())),
    }
  }

  fn order(self) -> u8 {
    match self {
      Self::Pending => 0,
      Self::Processing => 1,
      // Terminal states share a rank; neither leads to the other.
      Self::Completed | Self::Failed => 2,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }

  /// Same-state updates are idempotent; otherwise only forward moves into
  /// a non-terminal-from-terminal position are allowed.
  pub fn can_transition_to(self, next: RagStatus) -> bool {
    if self == next {
      return true;
    }
    if self.is_terminal() {
      return false;
    }
    next.order() > self.order()
  }
}

impl std::fmt::Display for RagStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── RagDocument ─────────────────────────────────────────────────────────────

/// The per-paper indexing record; unique per paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDocument {
  pub paper_id:     Uuid,
  pub status:       RagStatus,
  pub chunk_count:  Option<u32>,
  pub vector_ids:   Vec<String>,
  pub last_error:   Option<String>,
  pub submitted_at: DateTime<Utc>,
  /// Set exactly when the document reaches `completed`; never set by
  /// `failed`.
  pub processed_at: Option<DateTime<Utc>>,
}

/// A status report from the external indexing worker.
#[derive(Debug, Clone, Deserialize)]
pub struct RagUpdate {
  pub status:      RagStatus,
  pub chunk_count: Option<u32>,
  #[serde(default)]
  pub vector_ids:  Vec<String>,
  pub error:       Option<String>,
}

impl RagUpdate {
  /// Payload shape must match the target status: `completed` carries the
  /// chunk count and vector ids, `failed` carries an error, and neither
  /// payload may ride along with the other statuses.
  pub fn validate(&self) -> Result<()> {
    match self.status {
      RagStatus::Completed => {
        if self.chunk_count.is_none() {
          return Err(Error::InvalidRagPayload(
            "completed update requires chunk_count".into(),
          ));
        }
        if self.vector_ids.is_empty() {
          return Err(Error::InvalidRagPayload(
            "completed update requires vector_ids".into(),
          ));
        }
        Ok(())
      }
      RagStatus::Failed => {
        if self.error.is_none() {
          return Err(Error::InvalidRagPayload(
            "failed update requires an error message".into(),
          ));
        }
        Ok(())
      }
      RagStatus::Pending | RagStatus::Processing => {
        if self.error.is_some() {
          return Err(Error::InvalidRagPayload(format!(
            "{} update must not carry an error",
            self.status
          )));
        }
        Ok(())
      }
    }
  }
}

// ─── Session rollup ──────────────────────────────────────────────────────────

/// The cached per-session RAG status row. Counts are recomputed inside
/// every write transaction that can change them; `get`-side callers who
/// need always-fresh numbers should use the derived counts instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRagStatus {
  pub session_id:       Uuid,
  pub is_enabled:       bool,
  pub enabled_by:       Option<Uuid>,
  pub enabled_at:       Option<DateTime<Utc>>,
  pub disabled_at:      Option<DateTime<Utc>>,
  /// Snapshot counts; after `disable` they keep their last-known values.
  pub total_papers:     u32,
  pub processed_papers: u32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_transitions_allowed() {
    use RagStatus::*;
    assert!(Pending.can_transition_to(Processing));
    assert!(Pending.can_transition_to(Completed));
    assert!(Pending.can_transition_to(Failed));
    assert!(Processing.can_transition_to(Completed));
    assert!(Processing.can_transition_to(Failed));
  }

  #[test]
  fn terminal_states_are_sticky() {
    use RagStatus::*;
    for terminal in [Completed, Failed] {
      assert!(terminal.can_transition_to(terminal));
      assert!(!terminal.can_transition_to(Pending));
      assert!(!terminal.can_transition_to(Processing));
    }
    assert!(!Completed.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Completed));
  }

  #[test]
  fn backward_transitions_rejected() {
    use RagStatus::*;
    assert!(!Processing.can_transition_to(Pending));
    assert!(Processing.can_transition_to(Processing));
  }

  #[test]
  fn completed_update_requires_payload() {
    let update = RagUpdate {
      status:      RagStatus::Completed,
      chunk_count: None,
      vector_ids:  vec![],
      error:       None,
    };
    assert!(update.validate().is_err());

    let update = RagUpdate {
      status:      RagStatus::Completed,
      chunk_count: Some(12),
      vector_ids:  vec!["v1".into()],
      error:       None,
    };
    assert!(update.validate().is_ok());
  }

  #[test]
  fn failed_update_requires_error() {
    let update = RagUpdate {
      status:      RagStatus::Failed,
      chunk_count: None,
      vector_ids:  vec![],
      error:       None,
    };
    assert!(update.validate().is_err());
  }

  #[test]
  fn processing_update_must_not_carry_error() {
    let update = RagUpdate {
      status:      RagStatus::Processing,
      chunk_count: None,
      vector_ids:  vec![],
      error:       Some("boom".into()),
    };
    assert!(update.validate().is_err());
  }
}
