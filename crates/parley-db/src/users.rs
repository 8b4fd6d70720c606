use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::models::{USER_COLUMNS, UserRow, user_from_row};
use crate::{ChatError, Database, Result, new_id, now};

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 16;

impl Database {
    /// Session login: returns the user with this name, creating it on first use.
    pub fn create_or_get_user(&self, name: &str) -> Result<UserRow> {
        let name = validate_username(name)?;
        self.with_tx(|conn| {
            if let Some(existing) = query_user_by_name(conn, name)? {
                return Ok(existing);
            }

            let user = UserRow {
                id: new_id(),
                name: name.to_string(),
                photo_url: None,
                created_at: now(),
            };
            conn.execute(
                "INSERT INTO users (id, name, photo_url, created_at) VALUES (?1, ?2, NULL, ?3)",
                params![user.id, user.name, user.created_at],
            )?;
            info!("Created user {} ({})", user.name, user.id);
            Ok(user)
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_name(conn, name))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.name"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user_name(&self, user_id: &str, new_name: &str) -> Result<()> {
        let new_name = validate_username(new_name)?;
        self.with_tx(|conn| {
            require_user(conn, user_id)?;
            if let Some(holder) = query_user_by_name(conn, new_name)? {
                if holder.id == user_id {
                    return Ok(());
                }
                return Err(ChatError::Conflict(format!("username {new_name} is taken")));
            }
            conn.execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![new_name, user_id],
            )?;
            info!("User {} renamed to {}", user_id, new_name);
            Ok(())
        })
    }

    pub fn update_user_photo(&self, user_id: &str, photo_url: &str) -> Result<()> {
        if photo_url.trim().is_empty() {
            return Err(ChatError::InvalidArgument("photo url is empty".into()));
        }
        self.with_tx(|conn| {
            let updated = conn.execute(
                "UPDATE users SET photo_url = ?1 WHERE id = ?2",
                params![photo_url, user_id],
            )?;
            if updated == 0 {
                return Err(ChatError::NotFound(format!("user {user_id}")));
            }
            Ok(())
        })
    }
}

fn validate_username(name: &str) -> Result<&str> {
    let name = name.trim();
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(ChatError::InvalidArgument(format!(
            "username must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_user_by_name(conn: &Connection, name: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.name = ?1"),
            [name],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn require_user(conn: &Connection, id: &str) -> Result<UserRow> {
    query_user_by_id(conn, id)?.ok_or_else(|| ChatError::NotFound(format!("user {id}")))
}

#[cfg(test)]
mod tests {
    use crate::ChatError;
    use crate::test_support::db;

    #[test]
    fn login_reuses_existing_user() {
        let db = db();
        let first = db.create_or_get_user("alice").unwrap();
        let second = db.create_or_get_user("alice").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn rejects_short_names() {
        let db = db();
        assert!(matches!(
            db.create_or_get_user("al"),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rename_checks_uniqueness() {
        let db = db();
        let alice = db.create_or_get_user("alice").unwrap();
        db.create_or_get_user("bob").unwrap();

        assert!(matches!(
            db.update_user_name(&alice.id, "bob"),
            Err(ChatError::Conflict(_))
        ));

        db.update_user_name(&alice.id, "alicia").unwrap();
        let renamed = db.get_user(&alice.id).unwrap().unwrap();
        assert_eq!(renamed.name, "alicia");
        assert!(db.get_user_by_name("alice").unwrap().is_none());
    }

    #[test]
    fn photo_update_requires_existing_user() {
        let db = db();
        assert!(matches!(
            db.update_user_photo("ghost", "/uploads/a.png"),
            Err(ChatError::NotFound(_))
        ));

        let alice = db.create_or_get_user("alice").unwrap();
        db.update_user_photo(&alice.id, "/uploads/a.png").unwrap();
        let loaded = db.get_user(&alice.id).unwrap().unwrap();
        assert_eq!(loaded.photo_url.as_deref(), Some("/uploads/a.png"));
    }
}
