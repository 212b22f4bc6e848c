use serde::{Deserialize, Serialize};

use crate::models::UserType;

// -- JWT Claims --

/// Claims carried by the bearer token issued at login. `sub` is the user id
/// in decimal form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub user_type: UserType,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub user_type: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub olympic_sport: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub avatar: Option<String>,
    pub college_id: Option<i64>,
    pub olympic_sport: Option<String>,
    pub olympic_medal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: i64,
    pub username: String,
    pub user_type: UserType,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub college_id: Option<i64>,
    pub olympic_sport: Option<String>,
    pub olympic_medal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSummary {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub college_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetails {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub college_id: Option<i64>,
    /// Empty when unset.
    pub olympic_sport: String,
    pub olympic_medal: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetailsResponse {
    pub student_details: StudentDetails,
    pub olympic_sports: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    #[serde(default)]
    pub olympic_sport: Option<String>,
    #[serde(default)]
    pub olympic_medal: Option<String>,
}

// -- Favorites & ratings --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteCollege {
    pub college_id: i64,
    pub college_name: String,
    pub image: Option<String>,
    pub date_added: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateCollegeRequest {
    pub rating: f64,
}

/// Either a numeric rating or the literal `"No Rating"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRating {
    Rated(f64),
    Unrated(String),
}

impl UserRating {
    pub fn unrated() -> Self {
        Self::Unrated("No Rating".to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRatingResponse {
    pub user_rating: UserRating,
}

// -- Colleges --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeQuery {
    pub filter: Option<String>,
    pub input: Option<String>,
    pub sort_order: Option<String>,
}

/// Body of `/colleges/create` and `/colleges/update`. `id` is only read by update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollegeRequest {
    pub id: Option<i64>,
    pub name: String,
    pub sport: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub year: Option<i64>,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub cost: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeDetails {
    pub college_id: i64,
    pub college_name: String,
    pub olympic_sport: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub founding_year: Option<i64>,
    pub image: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub college_website: Option<String>,
    pub cost_details: Option<String>,
    pub admissions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedCollege {
    #[serde(flatten)]
    pub college: CollegeDetails,
    pub average_rating: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeNameResponse {
    pub college_name: String,
}
