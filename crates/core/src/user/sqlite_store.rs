//! SQLite-backed user store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Duration;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::password::{hash_password, verify_password};
use super::{CreateUserRequest, UpdateUserRequest, User, UserError, UserRole, UserStore};
use crate::db;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// SQLite-backed user store.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new(path: &Path) -> Result<Self, UserError> {
        let conn = db::open_connection(path).map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, UserError> {
        let conn = db::open_in_memory().map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), UserError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(database_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, UserError> {
        self.conn
            .lock()
            .map_err(|_| UserError::Database("user store lock poisoned".to_string()))
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let role_str: String = row.get(4)?;
        let role = role_str
            .parse::<UserRole>()
            .map_err(|e| db::conversion_error(4, e))?;
        let created_at_str: String = row.get(5)?;

        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role,
            created_at: db::parse_timestamp(5, &created_at_str)?,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<User>, UserError> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(database_error)
    }

    fn fetch_by_username(conn: &Connection, username: &str) -> Result<Option<User>, UserError> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
            params![username],
            Self::row_to_user,
        )
        .optional()
        .map_err(database_error)
    }
}

/// Clear `assigned_to` on every ticket held by `user_id`.
///
/// Each touched ticket gets a new revision and a later `updated_at`, the
/// same as any other ticket write.
fn unassign_tickets(conn: &Connection, user_id: i64) -> rusqlite::Result<usize> {
    let held: Vec<(String, String)> = {
        let mut stmt = conn.prepare("SELECT id, updated_at FROM tickets WHERE assigned_to = ?")?;
        let rows = stmt.query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for (ticket_id, updated_at) in &held {
        let previous = db::parse_timestamp(1, updated_at)?;
        let mut now = db::now();
        if now <= previous {
            now = previous + Duration::microseconds(1);
        }
        conn.execute(
            "UPDATE tickets SET assigned_to = NULL, revision = revision + 1, updated_at = ? WHERE id = ?",
            params![db::format_timestamp(&now), ticket_id],
        )?;
    }

    Ok(held.len())
}

fn database_error(e: rusqlite::Error) -> UserError {
    UserError::Database(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn hash(password: &str) -> Result<String, UserError> {
    if password.is_empty() {
        return Err(UserError::InvalidInput("password must not be empty".to_string()));
    }
    hash_password(password).map_err(|e| UserError::Hashing(e.to_string()))
}

impl UserStore for SqliteUserStore {
    fn create(&self, request: CreateUserRequest) -> Result<User, UserError> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(UserError::InvalidInput("username must not be empty".to_string()));
        }
        // Hash outside the lock, argon2 is slow on purpose
        let password_hash = hash(&request.password)?;
        let created_at = db::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                username,
                request.email.trim(),
                password_hash,
                request.role.as_str(),
                db::format_timestamp(&created_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                UserError::Conflict(username.clone())
            } else {
                database_error(e)
            }
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username,
            email: request.email.trim().to_string(),
            password_hash,
            role: request.role,
            created_at,
        })
    }

    fn get(&self, id: i64) -> Result<Option<User>, UserError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, UserError> {
        let conn = self.lock()?;
        Self::fetch_by_username(&conn, username)
    }

    fn list(&self) -> Result<Vec<User>, UserError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .map_err(database_error)?;
        let rows = stmt
            .query_map([], Self::row_to_user)
            .map_err(database_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(database_error)
    }

    fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, UserError> {
        let password_hash = request.password.as_deref().map(hash).transpose()?;

        let conn = self.lock()?;
        let current = Self::fetch(&conn, id)?.ok_or_else(|| UserError::NotFound(id.to_string()))?;

        let updated = User {
            email: request
                .email
                .map(|e| e.trim().to_string())
                .unwrap_or(current.email),
            role: request.role.unwrap_or(current.role),
            password_hash: password_hash.unwrap_or(current.password_hash),
            ..current
        };

        conn.execute(
            "UPDATE users SET email = ?, role = ?, password_hash = ? WHERE id = ?",
            params![
                updated.email,
                updated.role.as_str(),
                updated.password_hash,
                id
            ],
        )
        .map_err(database_error)?;

        Ok(updated)
    }

    fn delete(&self, id: i64) -> Result<usize, UserError> {
        let mut conn = self.lock()?;
        // Immediate: no ticket may be assigned to this user between the
        // unassign and the delete
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(database_error)?;

        let unassigned = if db::table_exists(&tx, "tickets").map_err(database_error)? {
            unassign_tickets(&tx, id).map_err(database_error)?
        } else {
            0
        };

        let deleted = tx
            .execute("DELETE FROM users WHERE id = ?", params![id])
            .map_err(database_error)?;
        if deleted == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }

        tx.commit().map_err(database_error)?;
        Ok(unassigned)
    }

    fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, UserError> {
        let user = {
            let conn = self.lock()?;
            Self::fetch_by_username(&conn, username)?
        };

        let Some(user) = user else {
            return Ok(None);
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "Stored password hash is unreadable");
                Ok(None)
            }
        }
    }
}
