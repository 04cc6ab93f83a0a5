//! SQLite-backed team store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{
    CreateMemberRequest, CreateTeamRequest, Member, MemberRole, Team, TeamError, TeamStore,
    UpdateMemberRequest, UpdateTeamRequest,
};
use crate::db;

/// SQLite-backed team store.
pub struct SqliteTeamStore {
    conn: Mutex<Connection>,
}

impl SqliteTeamStore {
    pub fn new(path: &Path) -> Result<Self, TeamError> {
        let conn = db::open_connection(path).map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, TeamError> {
        let conn = db::open_in_memory().map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TeamError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_team_members_team_id ON team_members(team_id);
            "#,
        )
        .map_err(database_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TeamError> {
        self.conn
            .lock()
            .map_err(|_| TeamError::Database("team store lock poisoned".to_string()))
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
        let created_at_str: String = row.get(3)?;
        Ok(Team {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: db::parse_timestamp(3, &created_at_str)?,
            members: Vec::new(),
        })
    }

    fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
        let role_str: String = row.get(4)?;
        Ok(Member {
            id: row.get(0)?,
            team_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            role: role_str
                .parse::<MemberRole>()
                .map_err(|e| db::conversion_error(4, e))?,
        })
    }

    fn fetch_team(conn: &Connection, id: i64) -> Result<Option<Team>, TeamError> {
        let team = conn
            .query_row(
                "SELECT id, name, description, created_at FROM teams WHERE id = ?",
                params![id],
                Self::row_to_team,
            )
            .optional()
            .map_err(database_error)?;

        match team {
            Some(mut team) => {
                team.members = Self::fetch_members(conn, id)?;
                Ok(Some(team))
            }
            None => Ok(None),
        }
    }

    fn fetch_members(conn: &Connection, team_id: i64) -> Result<Vec<Member>, TeamError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, team_id, name, email, role FROM team_members WHERE team_id = ? ORDER BY id",
            )
            .map_err(database_error)?;
        let rows = stmt
            .query_map(params![team_id], Self::row_to_member)
            .map_err(database_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(database_error)
    }

    fn fetch_member(
        conn: &Connection,
        team_id: i64,
        member_id: i64,
    ) -> Result<Member, TeamError> {
        conn.query_row(
            "SELECT id, team_id, name, email, role FROM team_members WHERE id = ? AND team_id = ?",
            params![member_id, team_id],
            Self::row_to_member,
        )
        .optional()
        .map_err(database_error)?
        .ok_or(TeamError::MemberNotFound { team_id, member_id })
    }

    fn team_exists(conn: &Connection, id: i64) -> Result<bool, TeamError> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?)",
            params![id],
            |row| row.get(0),
        )
        .map_err(database_error)
    }
}

fn database_error(e: rusqlite::Error) -> TeamError {
    TeamError::Database(e.to_string())
}

fn name_error(name: &str) -> impl FnOnce(rusqlite::Error) -> TeamError + '_ {
    move |e| match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            TeamError::Conflict(name.to_string())
        }
        other => database_error(other),
    }
}

fn required(field: &str, value: &str) -> Result<String, TeamError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TeamError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

impl TeamStore for SqliteTeamStore {
    fn create_team(&self, request: CreateTeamRequest) -> Result<Team, TeamError> {
        let name = required("name", &request.name)?;
        let created_at = db::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO teams (name, description, created_at) VALUES (?, ?, ?)",
            params![name, request.description, db::format_timestamp(&created_at)],
        )
        .map_err(name_error(&name))?;

        Ok(Team {
            id: conn.last_insert_rowid(),
            name,
            description: request.description,
            created_at,
            members: Vec::new(),
        })
    }

    fn get_team(&self, id: i64) -> Result<Option<Team>, TeamError> {
        let conn = self.lock()?;
        Self::fetch_team(&conn, id)
    }

    fn list_teams(&self) -> Result<Vec<Team>, TeamError> {
        let conn = self.lock()?;
        let mut teams = {
            let mut stmt = conn
                .prepare("SELECT id, name, description, created_at FROM teams ORDER BY name")
                .map_err(database_error)?;
            let rows = stmt
                .query_map([], Self::row_to_team)
                .map_err(database_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(database_error)?
        };

        for team in &mut teams {
            team.members = Self::fetch_members(&conn, team.id)?;
        }

        Ok(teams)
    }

    fn update_team(&self, id: i64, request: UpdateTeamRequest) -> Result<Team, TeamError> {
        let name = request
            .name
            .as_deref()
            .map(|n| required("name", n))
            .transpose()?;

        let conn = self.lock()?;
        let current = Self::fetch_team(&conn, id)?.ok_or(TeamError::TeamNotFound(id))?;

        let updated = Team {
            name: name.unwrap_or(current.name),
            description: request.description.unwrap_or(current.description),
            ..current
        };

        conn.execute(
            "UPDATE teams SET name = ?, description = ? WHERE id = ?",
            params![updated.name, updated.description, id],
        )
        .map_err(name_error(&updated.name))?;

        Ok(updated)
    }

    fn delete_team(&self, id: i64) -> Result<usize, TeamError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(database_error)?;

        let members: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM team_members WHERE team_id = ?",
                params![id],
                |row| row.get(0),
            )
            .map_err(database_error)?;

        // Members go with the team through ON DELETE CASCADE
        let deleted = tx
            .execute("DELETE FROM teams WHERE id = ?", params![id])
            .map_err(database_error)?;
        if deleted == 0 {
            return Err(TeamError::TeamNotFound(id));
        }

        tx.commit().map_err(database_error)?;
        Ok(members as usize)
    }

    fn add_member(&self, team_id: i64, request: CreateMemberRequest) -> Result<Member, TeamError> {
        let name = required("name", &request.name)?;
        let email = required("email", &request.email)?;

        let conn = self.lock()?;
        if !Self::team_exists(&conn, team_id)? {
            return Err(TeamError::TeamNotFound(team_id));
        }

        conn.execute(
            "INSERT INTO team_members (team_id, name, email, role) VALUES (?, ?, ?, ?)",
            params![team_id, name, email, request.role.as_str()],
        )
        .map_err(database_error)?;

        Ok(Member {
            id: conn.last_insert_rowid(),
            team_id,
            name,
            email,
            role: request.role,
        })
    }

    fn update_member(
        &self,
        team_id: i64,
        member_id: i64,
        request: UpdateMemberRequest,
    ) -> Result<Member, TeamError> {
        let name = request
            .name
            .as_deref()
            .map(|n| required("name", n))
            .transpose()?;
        let email = request
            .email
            .as_deref()
            .map(|e| required("email", e))
            .transpose()?;

        let conn = self.lock()?;
        if !Self::team_exists(&conn, team_id)? {
            return Err(TeamError::TeamNotFound(team_id));
        }
        let current = Self::fetch_member(&conn, team_id, member_id)?;

        let updated = Member {
            name: name.unwrap_or(current.name),
            email: email.unwrap_or(current.email),
            role: request.role.unwrap_or(current.role),
            ..current
        };

        conn.execute(
            "UPDATE team_members SET name = ?, email = ?, role = ? WHERE id = ?",
            params![updated.name, updated.email, updated.role.as_str(), member_id],
        )
        .map_err(database_error)?;

        Ok(updated)
    }

    fn remove_member(&self, team_id: i64, member_id: i64) -> Result<(), TeamError> {
        let conn = self.lock()?;
        if !Self::team_exists(&conn, team_id)? {
            return Err(TeamError::TeamNotFound(team_id));
        }

        let deleted = conn
            .execute(
                "DELETE FROM team_members WHERE id = ? AND team_id = ?",
                params![member_id, team_id],
            )
            .map_err(database_error)?;
        if deleted == 0 {
            return Err(TeamError::MemberNotFound { team_id, member_id });
        }
        Ok(())
    }
}
