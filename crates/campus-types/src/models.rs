use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sports a student may list and a college may be known for.
pub const OLYMPIC_SPORTS: &[&str] = &[
    "Archery",
    "Athletics",
    "Badminton",
    "Basketball",
    "Boxing",
    "Cycling",
    "Diving",
    "Fencing",
    "Gymnastics",
    "Rowing",
    "Soccer",
    "Swimming",
    "Tennis",
    "Volleyball",
    "Water Polo",
    "Wrestling",
];

pub const OLYMPIC_MEDALS: &[&str] = &["Gold", "Silver", "Bronze"];

pub fn is_olympic_sport(name: &str) -> bool {
    OLYMPIC_SPORTS.contains(&name)
}

pub fn is_olympic_medal(name: &str) -> bool {
    OLYMPIC_MEDALS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Staff,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUserType(pub String);

impl fmt::Display for UnknownUserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown user type '{}'", self.0)
    }
}

impl std::error::Error for UnknownUserType {}

impl FromStr for UserType {
    type Err = UnknownUserType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownUserType(other.to_string())),
        }
    }
}
