//! # haven_api
//!
//! HTTP API library for Haven: router, handlers, middleware chain, and the
//! services orchestrating `haven_core`.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};

use haven_core::auth::throttle::LoginThrottle;
use haven_core::auth::tokens::TokenService;
use haven_core::events::EventBus;
use haven_core::store::{CodeStore, OrgStore, UserStore};

use crate::config::ApiConfig;
use crate::handlers::{auth, orgs, users};
use crate::services::mail::Mailer;

/// Shared application state passed to all handlers.
///
/// Everything is an explicitly constructed, injected instance; the process
/// entry point owns the init/teardown lifecycle.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub users: Arc<dyn UserStore>,
    pub codes: Arc<dyn CodeStore>,
    pub orgs: Arc<dyn OrgStore>,
    pub tokens: Arc<TokenService>,
    pub throttle: Arc<LoginThrottle>,
    pub mailer: Arc<dyn Mailer>,
    pub events: Arc<EventBus>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/auth/csrf", get(auth::csrf_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/verify/{token_id}", post(auth::verify_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route(
            "/auth/forgot-password/{id}",
            get(auth::reset_lookup_handler).post(auth::reset_password_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/logout/all", post(auth::logout_all_handler))
        .route("/auth/logout/{id}", post(auth::logout_device_handler))
        .route("/auth/verify/regenerate", put(auth::regenerate_handler))
        .route("/auth/sessions", get(auth::sessions_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // Ownership-gated: a user may only read their own record (Admin passes).
    let user_scoped = Router::new()
        .route("/users/{id}", get(users::get_user_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize::own_user,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // Role-gated admin surface.
    let admin = Router::new()
        .route("/admin/users", get(users::list_users_handler))
        .layer(axum::middleware::from_fn(
            middleware::authorize::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // Organization surface: reads require a verified organization; the
    // member list additionally requires an admin/owner membership.
    let org_read = Router::new()
        .route("/organizations/{id}", get(orgs::get_org_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize::verified_org,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));
    let org_manage = Router::new()
        .route("/organizations/{id}/members", get(orgs::org_members_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize::org_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(user_scoped)
        .merge(admin)
        .merge(org_read)
        .merge(org_manage)
        .layer(axum::middleware::from_fn(middleware::csrf::verify_csrf))
        .layer(cors)
        .with_state(state)
}
