pub mod auth;
pub mod colleges;
pub mod error;
pub mod favorites;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use campus_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

/// Run a blocking DB call off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> campus_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

/// Every HTTP route of the API. The realtime endpoint is mounted by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/user-info/{user_id}", get(users::user_info))
        .route("/users/users-list", get(users::users_list))
        .route("/users/student-list", get(users::student_list))
        .route("/users/staff-list", get(users::staff_list))
        .route("/users/student/{user_id}", get(users::student_details))
        .route("/users/olympic-sports", get(users::olympic_sports))
        .route(
            "/users/create-favorite/{user_id}/{college_id}",
            post(favorites::create_favorite),
        )
        .route(
            "/users/remove-favorite/{user_id}/{college_id}",
            post(favorites::remove_favorite),
        )
        .route("/users/favorites/{user_id}", get(favorites::list_favorites))
        .route(
            "/users/rate-college/{college_id}/{user_id}",
            post(favorites::rate_college),
        )
        .route(
            "/users/fetch-college-rating/{college_id}/{user_id}",
            get(favorites::fetch_college_rating),
        )
        .route("/colleges/data", get(colleges::college_data))
        .route("/colleges/colleges/{id}", get(colleges::college_name))
        .route("/colleges/details/{id}", get(colleges::college_details))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/update-student/{user_id}", post(users::update_student))
        .route(
            "/users/update-staff/{staff_id}/{college_id}",
            post(users::update_staff),
        )
        .route("/users/remove/{user_id}", post(users::remove_user))
        .route("/colleges/create", post(colleges::create_college))
        .route("/colleges/update", post(colleges::update_college))
        .route("/colleges/remove/{id}", post(colleges::remove_college))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
