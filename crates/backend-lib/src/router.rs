// ============================
// crates/backend-lib/src/router.rs
// ============================
use crate::handlers::{auth, health, users};
use crate::{middleware, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/forgot", post(auth::forgot_password))
        .route("/reset", get(auth::check_reset_token).post(auth::reset_password));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .route("/api/users", get(users::list_users))
        .route("/api/users/search", get(users::search_users))
        .route("/api/users/email/{email}", get(users::get_user_by_email))
        .route("/api/users/role/{role}", get(users::get_users_by_role))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/users/{id}/password", put(users::change_password))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
