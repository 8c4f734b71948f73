//! Handlers for papers and the RAG pipeline.
//!
//! `PUT /papers/:id/rag/status` is the worker-facing route: the external
//! indexing service reports progress through it and the state machine in
//! the store rejects anything out of order.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  Error,
  rag::{NewPaper, Paper, RagDocument, RagUpdate, SessionRagStatus},
  store::RagStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Papers ──────────────────────────────────────────────────────────────────

/// `POST /papers`
pub async fn create_paper<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewPaper>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RagStore,
{
  let paper = store.create_paper(body).await?;
  Ok((StatusCode::CREATED, Json(paper)))
}

/// `GET /papers/:id`
pub async fn get_paper<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Paper>, ApiError>
where
  S: RagStore,
{
  let paper = store
    .get_paper(id)
    .await?
    .ok_or(Error::PaperNotFound(id))?;
  Ok(Json(paper))
}

#[derive(Debug, Deserialize)]
pub struct AttachBody {
  pub paper_id: Uuid,
  pub added_by: Uuid,
}

/// `POST /sessions/:id/papers`
pub async fn attach_paper<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
  Json(body): Json<AttachBody>,
) -> Result<StatusCode, ApiError>
where
  S: RagStore,
{
  store
    .attach_paper(session, body.paper_id, body.added_by)
    .await?;
  Ok(StatusCode::CREATED)
}

/// `DELETE /sessions/:id/papers/:paper`
pub async fn detach_paper<S>(
  State(store): State<Arc<S>>,
  Path((session, paper)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: RagStore,
{
  store.detach_paper(session, paper).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Per-paper pipeline ──────────────────────────────────────────────────────

/// `POST /papers/:id/rag/submit` — submit or re-submit for indexing.
pub async fn submit<S>(
  State(store): State<Arc<S>>,
  Path(paper): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RagStore,
{
  let doc = store.submit_paper(paper).await?;
  Ok((StatusCode::ACCEPTED, Json(doc)))
}

/// `PUT /papers/:id/rag/status` — body: a [`RagUpdate`].
pub async fn update_status<S>(
  State(store): State<Arc<S>>,
  Path(paper): Path<Uuid>,
  Json(body): Json<RagUpdate>,
) -> Result<Json<RagDocument>, ApiError>
where
  S: RagStore,
{
  Ok(Json(store.update_rag_status(paper, body).await?))
}

/// `GET /papers/:id/rag`
pub async fn get_document<S>(
  State(store): State<Arc<S>>,
  Path(paper): Path<Uuid>,
) -> Result<Json<RagDocument>, ApiError>
where
  S: RagStore,
{
  let doc = store
    .get_rag_document(paper)
    .await?
    .ok_or(Error::RagDocumentNotFound(paper))?;
  Ok(Json(doc))
}

// ─── Per-session rollup ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EnableBody {
  pub actor: Uuid,
}

/// `POST /sessions/:id/rag/enable`
pub async fn enable<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
  Json(body): Json<EnableBody>,
) -> Result<Json<SessionRagStatus>, ApiError>
where
  S: RagStore,
{
  Ok(Json(store.enable_session_rag(session, body.actor).await?))
}

/// `POST /sessions/:id/rag/disable`
pub async fn disable<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
) -> Result<Json<SessionRagStatus>, ApiError>
where
  S: RagStore,
{
  Ok(Json(store.disable_session_rag(session).await?))
}

/// `GET /sessions/:id/rag` — the cached rollup row.
pub async fn status<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
) -> Result<Json<SessionRagStatus>, ApiError>
where
  S: RagStore,
{
  let status = store
    .get_session_rag_status(session)
    .await?
    .ok_or(Error::SessionNotFound(session))?;
  Ok(Json(status))
}
