use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;

use campus_db::models::NewUser;
use campus_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, StatusMessage};
use campus_types::models::{UserType, is_olympic_sport};

use crate::error::{ApiError, ApiResult};
use crate::users::user_profile;
use crate::{AppState, run_db};

const USERNAME_TAKEN: &str = "Username already exists. Please choose a different username.";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_type: UserType = req
        .user_type
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid user type"))?;

    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::bad_request("Username must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let olympic_sport = req.olympic_sport.filter(|s| !s.is_empty());
    if let Some(sport) = &olympic_sport {
        if !is_olympic_sport(sport) {
            return Err(ApiError::bad_request(format!("Unknown olympic sport '{}'", sport)));
        }
    }

    let username = req.username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(USERNAME_TAKEN));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?
        .to_string();

    let username = req.username.clone();
    let result = run_db(&state, move |db| {
        db.create_user(&NewUser {
            username: &username,
            email: &req.email,
            password_hash: &password_hash,
            first_name: &req.first_name,
            last_name: &req.last_name,
            user_type: user_type.as_str(),
            avatar: req.image.as_deref(),
            olympic_sport: olympic_sport.as_deref(),
        })
    })
    .await;

    let user_id = match result {
        Ok(id) => id,
        // Lost a race with a concurrent registration
        Err(ApiError::Store(e)) if e.is_unique_violation() => {
            return Err(ApiError::bad_request(USERNAME_TAKEN));
        }
        Err(e) => return Err(e),
    };

    info!("Registered {} user {} ({})", user_type, req.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(StatusMessage::new("User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(invalid)?;

    // Verify password
    {
        let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
            ApiError::Internal(format!("corrupt password hash for {}: {}", user.id, e))
        })?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| invalid())?;
    }

    let profile = user_profile(user)?;
    let token = create_token(&state.jwt_secret, &profile.username, profile.user_id, profile.user_type)
        .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))?;

    Ok(Json(LoginResponse {
        user: profile,
        token,
    }))
}

pub fn create_token(
    secret: &str,
    username: &str,
    user_id: i64,
    user_type: UserType,
) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        user_type,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
