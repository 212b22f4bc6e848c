use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use campus_db::models::UserRow;
use campus_types::api::{
    Claims, StaffSummary, StatusMessage, StudentDetails, StudentDetailsResponse, StudentSummary,
    UpdateStudentRequest, UserProfile, UserSummary,
};
use campus_types::models::{OLYMPIC_SPORTS, UserType, is_olympic_medal, is_olympic_sport};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_role;
use crate::{AppState, run_db};

pub(crate) fn user_type_of(row: &UserRow) -> ApiResult<UserType> {
    row.user_type.parse().map_err(|e| {
        ApiError::Internal(format!("user {} has {}", row.id, e))
    })
}

pub(crate) fn user_profile(row: UserRow) -> ApiResult<UserProfile> {
    let user_type = user_type_of(&row)?;
    Ok(UserProfile {
        user_id: row.id,
        username: row.username,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        user_type,
        avatar: row.avatar,
        college_id: row.college_id,
        olympic_sport: row.olympic_sport,
        olympic_medal: row.olympic_medal,
    })
}

fn olympic_sport_names() -> Vec<String> {
    OLYMPIC_SPORTS.iter().map(|s| s.to_string()).collect()
}

pub async fn user_info(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let row = run_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user_profile(row)?))
}

pub async fn users_list(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let rows = run_db(&state, |db| db.list_users()).await?;
    let users = rows
        .into_iter()
        .map(|row| {
            Ok(UserSummary {
                user_type: user_type_of(&row)?,
                user_id: row.id,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(users))
}

pub async fn student_list(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentSummary>>> {
    let rows = run_db(&state, |db| db.list_users_of_type(UserType::Student.as_str())).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| StudentSummary {
                user_id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                college_id: row.college_id,
                olympic_sport: row.olympic_sport,
                olympic_medal: row.olympic_medal,
            })
            .collect(),
    ))
}

pub async fn staff_list(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffSummary>>> {
    let rows = run_db(&state, |db| db.list_users_of_type(UserType::Staff.as_str())).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| StaffSummary {
                user_id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                college_id: row.college_id,
            })
            .collect(),
    ))
}

pub async fn student_details(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<StudentDetailsResponse>> {
    let row = run_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .filter(|row| row.user_type == UserType::Student.as_str())
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(Json(StudentDetailsResponse {
        student_details: StudentDetails {
            first_name: row.first_name,
            last_name: row.last_name,
            username: row.username,
            email: row.email,
            college_id: row.college_id,
            olympic_sport: row.olympic_sport.unwrap_or_default(),
            olympic_medal: row.olympic_medal.unwrap_or_default(),
        },
        olympic_sports: olympic_sport_names(),
    }))
}

pub async fn olympic_sports() -> Json<Vec<String>> {
    Json(olympic_sport_names())
}

/// Staff or admin: change a student's sport and/or medal. Fields left empty
/// keep their stored value.
pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateStudentRequest>,
) -> ApiResult<Json<StatusMessage>> {
    require_role(&claims, &[UserType::Staff, UserType::Admin])?;

    let sport = req.olympic_sport.filter(|s| !s.is_empty());
    let medal = req.olympic_medal.filter(|s| !s.is_empty());
    if sport.is_none() && medal.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    if let Some(sport) = &sport {
        if !is_olympic_sport(sport) {
            return Err(ApiError::bad_request(format!("Unknown olympic sport '{}'", sport)));
        }
    }
    if let Some(medal) = &medal {
        if !is_olympic_medal(medal) {
            return Err(ApiError::bad_request(format!("Unknown olympic medal '{}'", medal)));
        }
    }

    let changed = run_db(&state, move |db| {
        db.update_student(student_id, sport.as_deref(), medal.as_deref())
    })
    .await?;
    if changed == 0 {
        return Err(ApiError::not_found("Student not found"));
    }

    info!("{} updated student {}", claims.username, student_id);
    Ok(Json(StatusMessage::new("Student details updated successfully")))
}

/// Admin: assign a staff member to a college.
pub async fn update_staff(
    State(state): State<AppState>,
    Path((staff_id, college_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StatusMessage>> {
    require_role(&claims, &[UserType::Admin])?;

    let changed = match run_db(&state, move |db| db.update_staff_college(staff_id, college_id)).await {
        Ok(changed) => changed,
        Err(ApiError::Store(e)) if e.is_foreign_key_violation() => {
            return Err(ApiError::not_found(format!("no college with id: {}", college_id)));
        }
        Err(e) => return Err(e),
    };
    if changed == 0 {
        return Err(ApiError::not_found("Staff member not found"));
    }

    Ok(Json(StatusMessage::new("staff's details updated successfully")))
}

/// Admin: delete a user along with their ratings, favorites and received messages.
pub async fn remove_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StatusMessage>> {
    require_role(&claims, &[UserType::Admin])?;

    if !run_db(&state, move |db| db.delete_user(user_id)).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!("{} removed user {}", claims.username, user_id);
    Ok(Json(StatusMessage::new("user removed successfully")))
}
