//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Duration;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    sla, CreateTicketRequest, Priority, Ticket, TicketError, TicketFilter, TicketStats,
    TicketStatus, TicketStore, TicketUpdate,
};
use crate::db;

const TICKET_COLUMNS: &str = "id, title, description, priority, status, submitted_by, assigned_to, notes, related_incident, related_device, sla_hours, deadline, within_sla, completed_date, close_date, revision, created_at, updated_at";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = db::open_connection(path).map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = db::open_in_memory().map_err(database_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                submitted_by TEXT NOT NULL,
                assigned_to INTEGER,
                notes TEXT,
                related_incident TEXT,
                related_device TEXT,
                sla_hours INTEGER NOT NULL,
                deadline TEXT NOT NULL,
                within_sla INTEGER,
                completed_date TEXT,
                close_date TEXT,
                revision INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_priority ON tickets(priority);
            CREATE INDEX IF NOT EXISTS idx_tickets_submitted_by ON tickets(submitted_by);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at DESC, id);
            "#,
        )
        .map_err(database_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("ticket store lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.clone()));
        }

        if let Some(ref priority) = filter.priority {
            conditions.push("priority = ?");
            params.push(Box::new(priority.clone()));
        }

        if let Some(ref created_on) = filter.created_on {
            // Timestamps are stored as fixed-width RFC 3339, the date is the first 10 chars
            conditions.push("substr(created_at, 1, 10) = ?");
            params.push(Box::new(created_on.clone()));
        }

        if let Some(ref submitted_by) = filter.submitted_by {
            conditions.push("submitted_by = ?");
            params.push(Box::new(submitted_by.clone()));
        }

        if let Some(assigned_to) = filter.assigned_to {
            conditions.push("assigned_to = ?");
            params.push(Box::new(assigned_to));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let priority_str: String = row.get(3)?;
        let priority = priority_str
            .parse::<Priority>()
            .map_err(|e| db::conversion_error(3, e))?;

        let status_str: String = row.get(4)?;
        let status = status_str
            .parse::<TicketStatus>()
            .map_err(|e| db::conversion_error(4, e))?;

        let deadline_str: String = row.get(11)?;
        let created_at_str: String = row.get(16)?;
        let updated_at_str: String = row.get(17)?;

        Ok(Ticket {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority,
            status,
            submitted_by: row.get(5)?,
            assigned_to: row.get(6)?,
            notes: row.get(7)?,
            related_incident: row.get(8)?,
            related_device: row.get(9)?,
            sla_hours: row.get(10)?,
            deadline: db::parse_timestamp(11, &deadline_str)?,
            within_sla: row.get(12)?,
            completed_date: db::parse_optional_timestamp(13, row.get(13)?)?,
            close_date: db::parse_optional_timestamp(14, row.get(14)?)?,
            revision: row.get(15)?,
            created_at: db::parse_timestamp(16, &created_at_str)?,
            updated_at: db::parse_timestamp(17, &updated_at_str)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Ticket>, TicketError> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(database_error)
    }

    fn list_on(conn: &Connection, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let (where_clause, params) = Self::build_where_clause(filter);

        // id breaks created_at ties so pages never overlap
        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(database_error)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(database_error)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(database_error)
    }

    fn count_on(conn: &Connection, filter: &TicketFilter) -> Result<i64, TicketError> {
        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(database_error)
    }

    fn grouped_counts(
        conn: &Connection,
        column: &str,
    ) -> Result<Vec<(String, i64)>, TicketError> {
        let sql = format!("SELECT {0}, COUNT(*) FROM tickets GROUP BY {0}", column);
        let mut stmt = conn.prepare(&sql).map_err(database_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(database_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(database_error)
    }
}

/// Reject an assignee that has no row in `users`.
///
/// Skipped when the connection has no users table (a standalone ticket database).
fn check_assignee(conn: &Connection, user_id: Option<i64>) -> Result<(), TicketError> {
    let Some(user_id) = user_id else {
        return Ok(());
    };
    if !db::table_exists(conn, "users").map_err(database_error)? {
        return Ok(());
    }

    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(database_error)?;
    if exists {
        Ok(())
    } else {
        Err(TicketError::AssigneeNotFound(user_id))
    }
}

fn database_error(e: rusqlite::Error) -> TicketError {
    TicketError::Database(e.to_string())
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        // Immediate: the assignee check and the insert must not interleave with a user delete
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(database_error)?;
        check_assignee(&tx, request.assigned_to)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = db::now();
        let created_at = request.created_at.map(|ts| ts.min(now)).unwrap_or(now);
        let created_at = chrono::SubsecRound::trunc_subsecs(created_at, 6);
        let deadline = sla::deadline_for(created_at, request.sla_hours);

        let ticket = Ticket {
            id,
            title: request.title,
            description: request.description,
            priority: request.priority,
            status: TicketStatus::Open,
            submitted_by: request.submitted_by,
            assigned_to: request.assigned_to,
            notes: None,
            related_incident: request.related_incident,
            related_device: request.related_device,
            sla_hours: request.sla_hours,
            deadline,
            within_sla: None,
            completed_date: None,
            close_date: None,
            revision: 1,
            created_at,
            updated_at: now,
        };

        tx.execute(
            &format!(
                "INSERT INTO tickets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TICKET_COLUMNS
            ),
            params![
                ticket.id,
                ticket.title,
                ticket.description,
                ticket.priority.as_str(),
                ticket.status.as_str(),
                ticket.submitted_by,
                ticket.assigned_to,
                ticket.notes,
                ticket.related_incident,
                ticket.related_device,
                ticket.sla_hours,
                db::format_timestamp(&ticket.deadline),
                ticket.within_sla,
                Option::<String>::None,
                Option::<String>::None,
                ticket.revision,
                db::format_timestamp(&ticket.created_at),
                db::format_timestamp(&ticket.updated_at),
            ],
        )
        .map_err(database_error)?;
        tx.commit().map_err(database_error)?;

        Ok(ticket)
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::list_on(&conn, filter)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.lock()?;
        Self::count_on(&conn, filter)
    }

    fn list_with_total(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), TicketError> {
        let mut conn = self.lock()?;

        // Same snapshot for the page and its total
        let tx = conn.transaction().map_err(database_error)?;
        let tickets = Self::list_on(&tx, filter)?;
        let total = Self::count_on(&tx, filter)?;
        tx.commit().map_err(database_error)?;

        Ok((tickets, total))
    }

    fn update(&self, id: &str, update: TicketUpdate) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(database_error)?;

        let current = Self::fetch(&tx, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        if let Some(expected) = update.expected_revision {
            if expected != current.revision {
                return Err(TicketError::RevisionMismatch {
                    ticket_id: id.to_string(),
                    expected,
                    actual: current.revision,
                });
            }
        }

        check_assignee(&tx, update.assigned_to)?;

        // updated_at must move forward even for back-to-back writes
        let mut now = db::now();
        if now <= current.updated_at {
            now = current.updated_at + Duration::microseconds(1);
        }

        let read_revision = current.revision;
        let sla_fields = update.sla.unwrap_or_else(|| sla::SlaFields::of(&current));

        let updated = Ticket {
            status: update.status.unwrap_or(current.status),
            assigned_to: update.assigned_to.or(current.assigned_to),
            notes: update.notes.or(current.notes),
            within_sla: sla_fields.within_sla,
            completed_date: sla_fields.completed_date,
            close_date: sla_fields.close_date,
            revision: read_revision + 1,
            updated_at: now,
            ..current
        };

        let changed = tx
            .execute(
                "UPDATE tickets SET status = ?, assigned_to = ?, notes = ?, within_sla = ?, completed_date = ?, close_date = ?, revision = ?, updated_at = ? WHERE id = ? AND revision = ?",
                params![
                    updated.status.as_str(),
                    updated.assigned_to,
                    updated.notes,
                    updated.within_sla,
                    updated.completed_date.as_ref().map(db::format_timestamp),
                    updated.close_date.as_ref().map(db::format_timestamp),
                    updated.revision,
                    db::format_timestamp(&updated.updated_at),
                    id,
                    read_revision,
                ],
            )
            .map_err(database_error)?;

        if changed != 1 {
            let actual = Self::fetch(&tx, id)?
                .map(|t| t.revision)
                .ok_or_else(|| TicketError::NotFound(id.to_string()))?;
            return Err(TicketError::RevisionMismatch {
                ticket_id: id.to_string(),
                expected: read_revision,
                actual,
            });
        }

        tx.commit().map_err(database_error)?;

        Ok(updated)
    }

    fn stats(&self) -> Result<TicketStats, TicketError> {
        let conn = self.lock()?;

        let mut stats = TicketStats::default();
        for status in TicketStatus::ALL {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }
        for priority in Priority::ALL {
            stats.by_priority.insert(priority.as_str().to_string(), 0);
        }

        for (status, count) in Self::grouped_counts(&conn, "status")? {
            stats.by_status.insert(status, count);
        }
        for (priority, count) in Self::grouped_counts(&conn, "priority")? {
            stats.by_priority.insert(priority, count);
        }

        let (total, met, breached): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(within_sla = 1), 0), COALESCE(SUM(within_sla = 0), 0) FROM tickets",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(database_error)?;

        stats.total = total;
        stats.sla_met = met;
        stats.sla_breached = breached;

        Ok(stats)
    }
}
