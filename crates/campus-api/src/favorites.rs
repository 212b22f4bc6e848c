use axum::{
    Json,
    extract::{Path, State},
};

use campus_types::api::{
    FavoriteCollege, RateCollegeRequest, StatusMessage, UserRating, UserRatingResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, run_db};

/// Favorite a college. Adding an existing favorite is not an error.
pub async fn create_favorite(
    State(state): State<AppState>,
    Path((user_id, college_id)): Path<(i64, i64)>,
) -> ApiResult<Json<StatusMessage>> {
    if run_db(&state, move |db| db.get_college(college_id)).await?.is_none() {
        return Err(ApiError::not_found(format!("no college with id: {}", college_id)));
    }

    let added = match run_db(&state, move |db| db.add_favorite(user_id, college_id)).await {
        Ok(added) => added,
        Err(ApiError::Store(e)) if e.is_foreign_key_violation() => {
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => return Err(e),
    };

    Ok(Json(StatusMessage::new(if added {
        "favorite added successfully"
    } else {
        "already favorited"
    })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Path((user_id, college_id)): Path<(i64, i64)>,
) -> ApiResult<Json<StatusMessage>> {
    let removed = run_db(&state, move |db| db.remove_favorite(user_id, college_id)).await?;
    Ok(Json(StatusMessage::new(if removed {
        "favorite removed"
    } else {
        "no such favorite to remove"
    })))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<FavoriteCollege>>> {
    let rows = run_db(&state, move |db| db.list_favorites(user_id)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| FavoriteCollege {
                college_id: row.college_id,
                college_name: row.college_name,
                image: row.image,
                date_added: row.date_added,
            })
            .collect(),
    ))
}

/// Insert or replace the user's rating for a college.
pub async fn rate_college(
    State(state): State<AppState>,
    Path((college_id, user_id)): Path<(i64, i64)>,
    Json(req): Json<RateCollegeRequest>,
) -> ApiResult<Json<StatusMessage>> {
    if !(0.0..=5.0).contains(&req.rating) {
        return Err(ApiError::bad_request("Rating must be between 0 and 5"));
    }

    match run_db(&state, move |db| db.upsert_rating(college_id, user_id, req.rating)).await {
        Ok(()) => Ok(Json(StatusMessage::new("Rating submitted successfully"))),
        Err(ApiError::Store(e)) if e.is_foreign_key_violation() => {
            Err(ApiError::not_found("College or user not found"))
        }
        Err(e) => Err(e),
    }
}

pub async fn fetch_college_rating(
    State(state): State<AppState>,
    Path((college_id, user_id)): Path<(i64, i64)>,
) -> ApiResult<Json<UserRatingResponse>> {
    let rating = run_db(&state, move |db| db.get_rating(college_id, user_id)).await?;
    Ok(Json(UserRatingResponse {
        user_rating: rating.map_or_else(UserRating::unrated, UserRating::Rated),
    }))
}
