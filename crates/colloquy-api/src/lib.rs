//! JSON REST API for Colloquy.
//!
//! Exposes an axum [`Router`] backed by any
//! [`colloquy_core::store::PlatformStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility; actor identity is an explicit
//! field on every mutating request.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", colloquy_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod groups;
pub mod messages;
pub mod rag;
pub mod sessions;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post, put},
};
use colloquy_core::store::PlatformStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: PlatformStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Users
    .route("/users/sync", post(users::sync::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>).delete(users::deactivate::<S>),
    )
    // Groups and membership
    .route("/groups", post(groups::create::<S>))
    .route("/groups/join", post(groups::join::<S>))
    .route("/groups/{id}", get(groups::get_one::<S>))
    .route("/groups/{id}/members", get(groups::list_members::<S>))
    .route(
      "/groups/{id}/members/{user}/role",
      put(groups::update_role::<S>),
    )
    .route(
      "/groups/{id}/members/{user}",
      delete(groups::remove_member::<S>),
    )
    .route("/groups/{id}/invite-code", post(groups::regenerate_code::<S>))
    .route("/groups/{id}/sessions", post(sessions::create::<S>))
    // Sessions and presence
    .route("/sessions/{id}", get(sessions::get_one::<S>))
    .route("/sessions/{id}/join", post(sessions::join::<S>))
    .route("/sessions/{id}/end", post(sessions::end::<S>))
    .route(
      "/sessions/{id}/participants",
      get(sessions::online_participants::<S>),
    )
    // Messages
    .route(
      "/sessions/{id}/messages",
      get(messages::list::<S>).post(messages::post::<S>),
    )
    .route("/messages/{id}", patch(messages::edit::<S>))
    // Papers and RAG
    .route("/papers", post(rag::create_paper::<S>))
    .route("/papers/{id}", get(rag::get_paper::<S>))
    .route("/sessions/{id}/papers", post(rag::attach_paper::<S>))
    .route(
      "/sessions/{id}/papers/{paper}",
      delete(rag::detach_paper::<S>),
    )
    .route("/papers/{id}/rag/submit", post(rag::submit::<S>))
    .route("/papers/{id}/rag/status", put(rag::update_status::<S>))
    .route("/papers/{id}/rag", get(rag::get_document::<S>))
    .route("/sessions/{id}/rag/enable", post(rag::enable::<S>))
    .route("/sessions/{id}/rag/disable", post(rag::disable::<S>))
    .route("/sessions/{id}/rag", get(rag::status::<S>))
    .with_state(store)
}
