//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users/sync` | Upsert from the auth provider's sync feed |
//! | `GET`  | `/users/:id` | 404 if not found |
//! | `DELETE` | `/users/:id` | Soft deactivation |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  Error,
  identity::{NewUser, User},
  store::IdentityStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /users/sync` — body: a [`NewUser`].
pub async fn sync<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IdentityStore,
{
  let user = store.sync_user(body).await?;
  Ok((StatusCode::OK, Json(user)))
}

/// `GET /users/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: IdentityStore,
{
  let user = store
    .get_user(id)
    .await?
    .ok_or(Error::UserNotFound(id))?;
  Ok(Json(user))
}

/// `DELETE /users/:id` — soft deactivation; the record survives.
pub async fn deactivate<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: IdentityStore,
{
  Ok(Json(store.deactivate_user(id).await?))
}
