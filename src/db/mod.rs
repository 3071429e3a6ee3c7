use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::PathBuf;

use crate::models::ActivityEntry;
use crate::utils::now_rfc3339;

/// Local client store: settings and the order activity log. Business data
/// stays on the server.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> SqlResult<Self> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = [
            (
                "001_create_settings.sql",
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/001_create_settings.sql")),
            ),
            (
                "002_create_activity_log.sql",
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/002_create_activity_log.sql")),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0)).optional()
    }

    pub fn delete_setting(&self, key: &str) -> SqlResult<()> {
        self.conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn log_activity(
        &self,
        action: &str,
        order_id: Option<i64>,
        status: &str,
        message: Option<&str>,
    ) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO activity_log (action, order_id, status, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![action, order_id, status, message, now_rfc3339()],
        )?;
        Ok(())
    }

    pub fn recent_activity(&self, limit: usize) -> SqlResult<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action, order_id, status, message, created_at
             FROM activity_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ActivityEntry {
                id: row.get(0)?,
                action: row.get(1)?,
                order_id: row.get(2)?,
                status: row.get(3)?,
                message: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_upsert_and_delete() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);

        db.set_setting("api_base_url", "http://a").unwrap();
        db.set_setting("api_base_url", "http://b").unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap().as_deref(), Some("http://b"));

        db.delete_setting("api_base_url").unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn activity_is_listed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.log_activity("create", Some(1), "success", None).unwrap();
        db.log_activity("delete", Some(99), "failed", Some("not found")).unwrap();

        let entries = db.recent_activity(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "delete");
        assert_eq!(entries[0].message.as_deref(), Some("not found"));
        assert_eq!(entries[1].order_id, Some(1));

        assert_eq!(db.recent_activity(1).unwrap().len(), 1);
    }
}
