use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use campus_db::models::{CollegeFields, CollegeFilter, CollegeRow};
use campus_types::api::{
    Claims, CollegeDetails, CollegeNameResponse, CollegeQuery, CollegeRequest, RatedCollege,
    StatusMessage,
};
use campus_types::models::UserType;

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_role;
use crate::{AppState, run_db};

const DUPLICATE_COLLEGE: &str = "Some field is already held uniquely in the database";

fn details_from_row(row: CollegeRow) -> CollegeDetails {
    CollegeDetails {
        college_id: row.id,
        college_name: row.name,
        olympic_sport: row.olympic_sport,
        location: row.location,
        address: row.address,
        founding_year: row.founding_year,
        image: row.image,
        phone_number: row.phone_number,
        email: row.email,
        college_website: row.website,
        cost_details: row.cost_details,
        admissions: row.admissions,
    }
}

fn college_fields(req: CollegeRequest) -> ApiResult<CollegeFields> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("College name is required"));
    }
    Ok(CollegeFields {
        name,
        olympic_sport: req.sport,
        location: req.location,
        address: req.address,
        founding_year: req.year,
        image: req.image,
        phone_number: req.phone,
        email: req.email,
        website: req.website,
        cost_details: req.cost,
    })
}

fn map_unique(e: ApiError) -> ApiError {
    match e {
        ApiError::Store(e) if e.is_unique_violation() => ApiError::Conflict(DUPLICATE_COLLEGE.into()),
        e => e,
    }
}

/// Colleges with their average rating, highest first unless `sortOrder=asc`.
/// An unknown `filter` returns every college.
pub async fn college_data(
    State(state): State<AppState>,
    Query(query): Query<CollegeQuery>,
) -> ApiResult<Json<Vec<RatedCollege>>> {
    let filter = query
        .filter
        .as_deref()
        .and_then(CollegeFilter::parse)
        .map(|f| (f, query.input.unwrap_or_default()));
    let descending = query.sort_order.as_deref() != Some("asc");

    let rows = run_db(&state, move |db| {
        db.search_colleges(filter.as_ref().map(|(f, input)| (*f, input.as_str())), descending)
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(row, average_rating)| RatedCollege {
                college: details_from_row(row),
                average_rating,
            })
            .collect(),
    ))
}

/// Name of a college, empty when there is no such college.
pub async fn college_name(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CollegeNameResponse>> {
    let row = run_db(&state, move |db| db.get_college(id)).await?;
    Ok(Json(CollegeNameResponse {
        college_name: row.map(|r| r.name).unwrap_or_default(),
    }))
}

pub async fn college_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CollegeDetails>> {
    let row = run_db(&state, move |db| db.get_college(id))
        .await?
        .ok_or_else(|| ApiError::not_found("College not found"))?;
    Ok(Json(details_from_row(row)))
}

pub async fn create_college(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CollegeRequest>,
) -> ApiResult<impl IntoResponse> {
    require_role(&claims, &[UserType::Admin])?;
    let fields = college_fields(req)?;

    let id = run_db(&state, move |db| db.create_college(&fields))
        .await
        .map_err(map_unique)?;

    info!("{} created college {}", claims.username, id);
    Ok((
        StatusCode::CREATED,
        Json(StatusMessage::new("college created successfully")),
    ))
}

pub async fn update_college(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CollegeRequest>,
) -> ApiResult<Json<StatusMessage>> {
    require_role(&claims, &[UserType::Admin])?;
    let id = req
        .id
        .ok_or_else(|| ApiError::bad_request("College id is required"))?;
    let fields = college_fields(req)?;

    let updated = run_db(&state, move |db| db.update_college(id, &fields))
        .await
        .map_err(map_unique)?;
    if !updated {
        return Err(ApiError::not_found("College not found"));
    }

    Ok(Json(StatusMessage::new("college updated successfully")))
}

pub async fn remove_college(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StatusMessage>> {
    require_role(&claims, &[UserType::Admin])?;

    if !run_db(&state, move |db| db.delete_college(id)).await? {
        return Err(ApiError::not_found("College not found"));
    }

    info!("{} removed college {}", claims.username, id);
    Ok(Json(StatusMessage::new("college removed successfully")))
}
