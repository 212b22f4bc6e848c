use crate::models::{CollegeFields, CollegeFilter, CollegeRow, FavoriteRow, NewUser, UserRow};
use crate::{Database, OptionalExt, Result};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, user_type, \
     avatar, olympic_sport, olympic_medal, college_id";

const COLLEGE_COLUMNS: &str = "c.id, c.name, c.olympic_sport, c.location, c.address, \
     c.founding_year, c.image, c.phone_number, c.email, c.website, c.cost_details, c.admissions";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users
                    (username, email, password, first_name, last_name, user_type, avatar, olympic_sport)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.user_type,
                    user.avatar,
                    user.olympic_sport,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], user_from_row).optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, None))
    }

    pub fn list_users_of_type(&self, user_type: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, Some(user_type)))
    }

    /// Set a student's sport and/or medal; `None` keeps the stored value.
    /// Returns the number of rows changed.
    pub fn update_student(
        &self,
        student_id: i64,
        olympic_sport: Option<&str>,
        olympic_medal: Option<&str>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET olympic_sport = COALESCE(?1, olympic_sport),
                     olympic_medal = COALESCE(?2, olympic_medal)
                 WHERE id = ?3 AND user_type = 'student'",
                rusqlite::params![olympic_sport, olympic_medal, student_id],
            )?;
            Ok(changed)
        })
    }

    pub fn update_staff_college(&self, staff_id: i64, college_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET college_id = ?1 WHERE id = ?2 AND user_type = 'staff'",
                rusqlite::params![college_id, staff_id],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? == 1))
    }

    // -- Colleges --

    pub fn create_college(&self, college: &CollegeFields) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO colleges
                    (name, olympic_sport, location, address, founding_year, image,
                     phone_number, email, website, cost_details, admissions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, '')",
                rusqlite::params![
                    college.name,
                    college.olympic_sport,
                    college.location,
                    college.address,
                    college.founding_year,
                    college.image,
                    college.phone_number,
                    college.email,
                    college.website,
                    college.cost_details,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_college(&self, id: i64, college: &CollegeFields) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE colleges
                 SET name = ?1, olympic_sport = ?2, location = ?3, address = ?4,
                     founding_year = ?5, image = ?6, phone_number = ?7, email = ?8,
                     website = ?9, cost_details = ?10
                 WHERE id = ?11",
                rusqlite::params![
                    college.name,
                    college.olympic_sport,
                    college.location,
                    college.address,
                    college.founding_year,
                    college.image,
                    college.phone_number,
                    college.email,
                    college.website,
                    college.cost_details,
                    id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_college(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM colleges WHERE id = ?1", [id])? == 1))
    }

    pub fn get_college(&self, id: i64) -> Result<Option<CollegeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {COLLEGE_COLUMNS} FROM colleges c WHERE c.id = ?1");
            conn.query_row(&sql, [id], college_from_row).optional()
        })
    }

    /// Colleges with their average rating (0 when unrated), optionally
    /// filtered by a substring match on one column, sorted by rating.
    pub fn search_colleges(
        &self,
        filter: Option<(CollegeFilter, &str)>,
        descending: bool,
    ) -> Result<Vec<(CollegeRow, f64)>> {
        self.with_conn(|conn| query_colleges(conn, filter, descending))
    }

    // -- Ratings --

    pub fn upsert_rating(&self, college_id: i64, user_id: i64, rating: f64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO college_ratings (college_id, user_id, rating) VALUES (?1, ?2, ?3)
                 ON CONFLICT (college_id, user_id) DO UPDATE SET rating = excluded.rating",
                rusqlite::params![college_id, user_id, rating],
            )?;
            Ok(())
        })
    }

    pub fn get_rating(&self, college_id: i64, user_id: i64) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT rating FROM college_ratings WHERE college_id = ?1 AND user_id = ?2",
                [college_id, user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Favorites --

    /// Returns false when the college was already a favorite.
    pub fn add_favorite(&self, user_id: i64, college_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO favorite_colleges (user_id, college_id) VALUES (?1, ?2)",
                [user_id, college_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_favorite(&self, user_id: i64, college_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM favorite_colleges WHERE user_id = ?1 AND college_id = ?2",
                [user_id, college_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<FavoriteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.image, f.date_added
                 FROM favorite_colleges f
                 INNER JOIN colleges c ON c.id = f.college_id
                 WHERE f.user_id = ?1
                 ORDER BY f.date_added ASC, c.id ASC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FavoriteRow {
                        college_id: row.get(0)?,
                        college_name: row.get(1)?,
                        image: row.get(2)?,
                        date_added: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_users(conn: &Connection, user_type: Option<&str>) -> Result<Vec<UserRow>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE ?1 IS NULL OR user_type = ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_type], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_colleges(
    conn: &Connection,
    filter: Option<(CollegeFilter, &str)>,
    descending: bool,
) -> Result<Vec<(CollegeRow, f64)>> {
    // Column names come from CollegeFilter, never from the request
    let condition = match filter {
        Some((f, _)) => format!("WHERE {} LIKE ?1 ESCAPE '\\'", f.column()),
        None => String::from("WHERE ?1 IS NULL"),
    };
    let direction = if descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT {COLLEGE_COLUMNS}, COALESCE(AVG(cr.rating), 0.0) AS average_rating
         FROM colleges c
         LEFT JOIN college_ratings cr ON cr.college_id = c.id
         {condition}
         GROUP BY c.id
         ORDER BY average_rating {direction}, c.id ASC"
    );

    let pattern = filter.map(|(_, input)| format!("%{}%", escape_like(input)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([pattern], |row| Ok((college_from_row(row)?, row.get(12)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        user_type: row.get(6)?,
        avatar: row.get(7)?,
        olympic_sport: row.get(8)?,
        olympic_medal: row.get(9)?,
        college_id: row.get(10)?,
    })
}

fn college_from_row(row: &Row<'_>) -> rusqlite::Result<CollegeRow> {
    Ok(CollegeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        olympic_sport: row.get(2)?,
        location: row.get(3)?,
        address: row.get(4)?,
        founding_year: row.get(5)?,
        image: row.get(6)?,
        phone_number: row.get(7)?,
        email: row.get(8)?,
        website: row.get(9)?,
        cost_details: row.get(10)?,
        admissions: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_user(db: &Database, username: &str, user_type: &str) -> i64 {
        db.create_user(&NewUser {
            username,
            email: "someone@example.com",
            password_hash: "hash",
            first_name: "First",
            last_name: "Last",
            user_type,
            avatar: None,
            olympic_sport: None,
        })
        .unwrap()
    }

    fn add_college(db: &Database, name: &str, location: &str) -> i64 {
        db.create_college(&CollegeFields {
            name: name.to_string(),
            location: Some(location.to_string()),
            olympic_sport: Some("Rowing".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn duplicate_username_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "alice", "student");
        let err = db
            .create_user(&NewUser {
                username: "alice",
                email: "other@example.com",
                password_hash: "hash",
                first_name: "A",
                last_name: "B",
                user_type: "staff",
                avatar: None,
                olympic_sport: None,
            })
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn list_users_filters_by_type() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "s1", "student");
        add_user(&db, "t1", "staff");
        add_user(&db, "s2", "student");

        assert_eq!(db.list_users().unwrap().len(), 3);
        let students: Vec<String> = db
            .list_users_of_type("student")
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(students, vec!["s1", "s2"]);
    }

    #[test]
    fn update_student_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let student = add_user(&db, "s1", "student");
        let staff = add_user(&db, "t1", "staff");

        assert_eq!(db.update_student(student, Some("Diving"), None).unwrap(), 1);
        assert_eq!(db.update_student(student, None, Some("Gold")).unwrap(), 1);
        let row = db.get_user_by_id(student).unwrap().unwrap();
        assert_eq!(row.olympic_sport.as_deref(), Some("Diving"));
        assert_eq!(row.olympic_medal.as_deref(), Some("Gold"));

        // Only students are updated
        assert_eq!(db.update_student(staff, Some("Diving"), None).unwrap(), 0);
    }

    #[test]
    fn ratings_upsert_and_average() {
        let db = Database::open_in_memory().unwrap();
        let u1 = add_user(&db, "u1", "student");
        let u2 = add_user(&db, "u2", "student");
        let high = add_college(&db, "High College", "Oregon");
        let low = add_college(&db, "Low College", "Ohio");
        let unrated = add_college(&db, "Quiet College", "Maine");

        db.upsert_rating(high, u1, 2.0).unwrap();
        db.upsert_rating(high, u1, 5.0).unwrap();
        db.upsert_rating(high, u2, 4.0).unwrap();
        db.upsert_rating(low, u1, 1.0).unwrap();
        assert_eq!(db.get_rating(high, u1).unwrap(), Some(5.0));
        assert_eq!(db.get_rating(unrated, u1).unwrap(), None);

        let desc = db.search_colleges(None, true).unwrap();
        let ids: Vec<i64> = desc.iter().map(|(c, _)| c.id).collect();
        assert_eq!(ids, vec![high, low, unrated]);
        assert_eq!(desc[0].1, 4.5);
        assert_eq!(desc[2].1, 0.0);

        let asc = db.search_colleges(None, false).unwrap();
        assert_eq!(asc[0].0.id, unrated);
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let user = add_user(&db, "u1", "student");
        let college = add_college(&db, "High College", "Oregon");
        assert!(db.upsert_rating(college, user, 7.5).is_err());
    }

    #[test]
    fn search_filter_binds_input() {
        let db = Database::open_in_memory().unwrap();
        add_college(&db, "North State", "Oregon");
        add_college(&db, "South State", "Texas");

        let found = db
            .search_colleges(Some((CollegeFilter::State, "ore")), true)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.name, "North State");

        let injected = db
            .search_colleges(Some((CollegeFilter::Name, "' OR '1'='1")), true)
            .unwrap();
        assert!(injected.is_empty());

        let wildcard = db
            .search_colleges(Some((CollegeFilter::Name, "%")), true)
            .unwrap();
        assert!(wildcard.is_empty());
    }

    #[test]
    fn favorites_are_idempotent_and_cascade() {
        let db = Database::open_in_memory().unwrap();
        let user = add_user(&db, "u1", "student");
        let college = add_college(&db, "High College", "Oregon");

        assert!(db.add_favorite(user, college).unwrap());
        assert!(!db.add_favorite(user, college).unwrap());
        let favorites = db.list_favorites(user).unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].college_name, "High College");

        assert!(db.delete_college(college).unwrap());
        assert!(db.list_favorites(user).unwrap().is_empty());
        assert!(!db.remove_favorite(user, college).unwrap());
    }

    #[test]
    fn favorite_for_missing_user_is_a_foreign_key_violation() {
        let db = Database::open_in_memory().unwrap();
        let college = add_college(&db, "High College", "Oregon");
        let err = db.add_favorite(999, college).unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[test]
    fn deleting_a_college_unassigns_staff() {
        let db = Database::open_in_memory().unwrap();
        let staff = add_user(&db, "t1", "staff");
        let college = add_college(&db, "High College", "Oregon");

        assert_eq!(db.update_staff_college(staff, college).unwrap(), 1);
        assert_eq!(db.get_user_by_id(staff).unwrap().unwrap().college_id, Some(college));

        db.delete_college(college).unwrap();
        assert_eq!(db.get_user_by_id(staff).unwrap().unwrap().college_id, None);
    }
}
