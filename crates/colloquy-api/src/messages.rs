//! Handlers for message posting, editing, and history.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  message::{Message, MessageView, NewMessage},
  store::MessageStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PostBody {
  pub actor:   Uuid,
  #[serde(flatten)]
  pub message: NewMessage,
}

/// `POST /sessions/:id/messages`
pub async fn post<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
  Json(body): Json<PostBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessageStore,
{
  let view = store.post_message(session, body.actor, body.message).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /sessions/:id/messages` — oldest first, senders resolved.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(session): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, ApiError>
where
  S: MessageStore,
{
  Ok(Json(store.list_messages(session).await?))
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub content: String,
}

/// `PATCH /messages/:id` — content only; attribution never changes.
pub async fn edit<S>(
  State(store): State<Arc<S>>,
  Path(message): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  Ok(Json(store.edit_message(message, body.content).await?))
}
