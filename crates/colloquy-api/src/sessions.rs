//! Handlers for `/sessions` endpoints (lifecycle and presence; messages
//! and RAG live in their own modules).

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  Error,
  identity::User,
  session::Session,
  store::SessionStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub creator: Uuid,
  pub title:   String,
}

/// `POST /groups/:id/sessions`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(group): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SessionStore,
{
  let session = store.create_session(group, body.creator, body.title).await?;
  Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /sessions/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError>
where
  S: SessionStore,
{
  let session = store
    .get_session(id)
    .await?
    .ok_or(Error::SessionNotFound(id))?;
  Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct ActorBody {
  pub user: Uuid,
}

/// `POST /sessions/:id/join` — idempotent; re-joining refreshes presence.
pub async fn join<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<StatusCode, ApiError>
where
  S: SessionStore,
{
  store.join_session(session, body.user).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /sessions/:id/end` — idempotent; terminal for posting.
pub async fn end<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<Session>, ApiError>
where
  S: SessionStore,
{
  Ok(Json(store.end_session(session, body.user).await?))
}

/// `GET /sessions/:id/participants` — currently-online users only.
pub async fn online_participants<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SessionStore,
{
  Ok(Json(store.list_online_participants(session).await?))
}
