//! Database row types — these map directly to SQLite rows.
//! Distinct from campus-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub avatar: Option<String>,
    pub olympic_sport: Option<String>,
    pub olympic_medal: Option<String>,
    pub college_id: Option<i64>,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_type: &'a str,
    pub avatar: Option<&'a str>,
    pub olympic_sport: Option<&'a str>,
}

/// A message as seen from one user's history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub sender_name: String,
    pub receiver_name: String,
    pub is_receiver: bool,
}

#[derive(Debug, Clone)]
pub struct CollegeRow {
    pub id: i64,
    pub name: String,
    pub olympic_sport: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub founding_year: Option<i64>,
    pub image: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub cost_details: Option<String>,
    pub admissions: String,
}

/// Writable college columns.
#[derive(Debug, Clone, Default)]
pub struct CollegeFields {
    pub name: String,
    pub olympic_sport: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub founding_year: Option<i64>,
    pub image: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub cost_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollegeFilter {
    Name,
    State,
    Sport,
}

impl CollegeFilter {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "state" => Some(Self::State),
            "sport" => Some(Self::Sport),
            _ => None,
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Name => "c.name",
            Self::State => "c.location",
            Self::Sport => "c.olympic_sport",
        }
    }
}

pub struct FavoriteRow {
    pub college_id: i64,
    pub college_name: String,
    pub image: Option<String>,
    pub date_added: String,
}
