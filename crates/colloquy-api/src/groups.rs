//! Handlers for `/groups` endpoints.
//!
//! Actor identity is an explicit request field on every mutating route;
//! nothing here is ambient.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/groups` | Body carries the creator |
//! | `GET`  | `/groups/:id` | 404 if not found |
//! | `GET`  | `/groups/:id/members` | |
//! | `POST` | `/groups/join` | Body: `{"code":"...","user":"..."}` |
//! | `PUT`  | `/groups/:id/members/:user/role` | Admin-gated per role rules |
//! | `DELETE` | `/groups/:id/members/:user` | `?actor=` — self means leave |
//! | `POST` | `/groups/:id/invite-code` | Regenerate; admin only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  Error,
  group::{Group, Member, Membership, NewGroup, Role},
  invite::InviteCode,
  store::GroupStore,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Create / get ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub creator: Uuid,
  #[serde(flatten)]
  pub group:   NewGroup,
}

/// `POST /groups`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GroupStore,
{
  let group = store.create_group(body.creator, body.group).await?;
  Ok((StatusCode::CREATED, Json(group)))
}

/// `GET /groups/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Group>, ApiError>
where
  S: GroupStore,
{
  let group = store
    .get_group(id)
    .await?
    .ok_or(Error::GroupNotFound(id))?;
  Ok(Json(group))
}

/// `GET /groups/:id/members`
pub async fn list_members<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Member>>, ApiError>
where
  S: GroupStore,
{
  Ok(Json(store.list_members(id).await?))
}

// ─── Join ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JoinBody {
  pub code: InviteCode,
  pub user: Uuid,
}

/// `POST /groups/join` — the invite code is the lookup key; the group id
/// never appears in the request.
pub async fn join<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<JoinBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GroupStore,
{
  let membership = store.join_by_invite_code(body.code, body.user).await?;
  Ok((StatusCode::CREATED, Json(membership)))
}

// ─── Role changes / removal ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub actor: Uuid,
  pub role:  Role,
}

/// `PUT /groups/:id/members/:user/role`
pub async fn update_role<S>(
  State(store): State<Arc<S>>,
  Path((group, user)): Path<(Uuid, Uuid)>,
  Json(body): Json<RoleBody>,
) -> Result<Json<Membership>, ApiError>
where
  S: GroupStore,
{
  let membership = store
    .update_role(body.actor, group, user, body.role)
    .await?;
  Ok(Json(membership))
}

#[derive(Debug, Deserialize)]
pub struct RemoveParams {
  pub actor: Uuid,
}

/// `DELETE /groups/:id/members/:user?actor=<id>` — removing yourself is a
/// leave, anything else goes through the removal authorization rules.
pub async fn remove_member<S>(
  State(store): State<Arc<S>>,
  Path((group, user)): Path<(Uuid, Uuid)>,
  Query(params): Query<RemoveParams>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
{
  if params.actor == user {
    store.leave_group(user, group).await?;
  } else {
    store.remove_member(params.actor, group, user).await?;
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Invite code regeneration ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegenerateBody {
  pub actor: Uuid,
}

/// `POST /groups/:id/invite-code`
pub async fn regenerate_code<S>(
  State(store): State<Arc<S>>,
  Path(group): Path<Uuid>,
  Json(body): Json<RegenerateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GroupStore,
{
  let code = store.regenerate_invite_code(group, body.actor).await?;
  Ok(Json(json!({ "invite_code": code })))
}
