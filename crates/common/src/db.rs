//! SQLite database for panel state persistence

use crate::store::Store;
use crate::types::{
    ActivityEntry, ActivityFilter, Identity, ResourceSpec, Session, UserRecord, Vps,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vps (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                spec TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deployed_at INTEGER,
                last_started_at INTEGER,
                generation INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_vps_owner ON vps(owner_id);

            -- Append-only; vps_id is a weak reference
            CREATE TABLE IF NOT EXISTS vps_activity (
                id TEXT PRIMARY KEY,
                vps_id TEXT NOT NULL,
                action TEXT NOT NULL,
                outcome TEXT NOT NULL,
                detail TEXT NOT NULL DEFAULT '{}',
                created_by TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_vps_activity_vps ON vps_activity(vps_id);
            CREATE INDEX IF NOT EXISTS idx_vps_activity_created_by ON vps_activity(created_by);

            CREATE TABLE IF NOT EXISTS auth_sessions (
                token_hash TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_auth_sessions_identity ON auth_sessions(identity_id);
            CREATE INDEX IF NOT EXISTS idx_auth_sessions_expires ON auth_sessions(expires_at);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }
}

/// Descriptive VPS fields stored as one JSON column
#[derive(Serialize, Deserialize)]
struct VpsSpecColumn {
    container_id: String,
    image: String,
    #[serde(default)]
    resources: ResourceSpec,
    ip_address: String,
    #[serde(default)]
    ports: Vec<u16>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
}

impl From<&Vps> for VpsSpecColumn {
    fn from(v: &Vps) -> Self {
        Self {
            container_id: v.container_id.clone(),
            image: v.image.clone(),
            resources: v.resources.clone(),
            ip_address: v.ip_address.clone(),
            ports: v.ports.clone(),
            environment: v.environment.clone(),
        }
    }
}

struct RawVps {
    id: String,
    owner_id: String,
    name: String,
    status: String,
    spec: String,
    created_at: i64,
    updated_at: i64,
    deployed_at: Option<i64>,
    last_started_at: Option<i64>,
    generation: i64,
}

const VPS_COLUMNS: &str = "id, owner_id, name, status, spec, created_at, updated_at, \
                           deployed_at, last_started_at, generation";

impl RawVps {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            spec: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            deployed_at: row.get(7)?,
            last_started_at: row.get(8)?,
            generation: row.get(9)?,
        })
    }

    fn parse(self) -> Result<Vps> {
        let spec: VpsSpecColumn = serde_json::from_str(&self.spec)?;
        Ok(Vps {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            status: self.status.parse()?,
            container_id: spec.container_id,
            image: spec.image,
            resources: spec.resources,
            ip_address: spec.ip_address,
            ports: spec.ports,
            environment: spec.environment,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deployed_at: self.deployed_at,
            last_started_at: self.last_started_at,
            generation: self.generation,
        })
    }
}

struct RawUser {
    id: String,
    username: String,
    email: Option<String>,
    role: String,
    active: bool,
    password_hash: String,
    created_at: i64,
    updated_at: i64,
}

const USER_COLUMNS: &str =
    "id, username, email, role, active, password_hash, created_at, updated_at";

impl RawUser {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            active: row.get(4)?,
            password_hash: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn parse(self) -> Result<UserRecord> {
        Ok(UserRecord {
            identity: Identity {
                id: self.id,
                username: self.username,
                email: self.email,
                role: self.role.parse()?,
                active: self.active,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }
}

struct RawActivity {
    id: String,
    vps_id: String,
    action: String,
    outcome: String,
    detail: String,
    created_by: Option<String>,
    created_at: i64,
}

impl RawActivity {
    fn parse(self) -> Result<ActivityEntry> {
        Ok(ActivityEntry {
            id: self.id,
            vps_id: self.vps_id,
            action: self.action.parse()?,
            outcome: self.outcome.parse()?,
            detail: serde_json::from_str(&self.detail)?,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token_hash: row.get(0)?,
        identity_id: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        last_seen_at: row.get(4)?,
    })
}

fn username_taken(conn: &Connection, username: &str, except_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1 AND id != ?2",
        params![username, except_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Store for Database {
    fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let conn = self.conn.lock();
        let i = &user.identity;
        if username_taken(&conn, &i.username, &i.id)? {
            return Err(Error::DuplicateUsername(i.username.clone()));
        }
        conn.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                i.id,
                i.username,
                i.email,
                i.role.as_str(),
                i.active,
                user.password_hash,
                i.created_at,
                i.updated_at
            ],
        )?;
        debug!("Inserted user {} ({})", i.username, i.id);
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                RawUser::from_row,
            )
            .optional()?;
        raw.map(RawUser::parse).transpose()
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                RawUser::from_row,
            )
            .optional()?;
        raw.map(RawUser::parse).transpose()
    }

    fn list_users(&self) -> Result<Vec<Identity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username"
        ))?;
        let rows = stmt.query_map([], RawUser::from_row)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.parse()?.identity);
        }
        Ok(out)
    }

    fn update_user(&self, user: &UserRecord) -> Result<()> {
        let conn = self.conn.lock();
        let i = &user.identity;
        if username_taken(&conn, &i.username, &i.id)? {
            return Err(Error::DuplicateUsername(i.username.clone()));
        }
        let rows = conn.execute(
            "UPDATE users SET username = ?2, email = ?3, role = ?4, active = ?5,
                password_hash = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                i.id,
                i.username,
                i.email,
                i.role.as_str(),
                i.active,
                user.password_hash,
                i.updated_at
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("user", i.id.as_str()));
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted user {}", id);
        }
        Ok(rows > 0)
    }

    fn insert_vps(&self, vps: &Vps, exclusive: bool) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if exclusive {
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM vps WHERE owner_id = ?1",
                params![vps.owner_id],
                |row| row.get(0),
            )?;
            if count > 0 {
                return Err(Error::DuplicateVps {
                    owner_id: vps.owner_id.clone(),
                });
            }
        }

        let spec = serde_json::to_string(&VpsSpecColumn::from(vps))?;
        tx.execute(
            &format!("INSERT INTO vps ({VPS_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                vps.id,
                vps.owner_id,
                vps.name,
                vps.status.as_str(),
                spec,
                vps.created_at,
                vps.updated_at,
                vps.deployed_at,
                vps.last_started_at,
                vps.generation
            ],
        )?;
        tx.commit()?;

        debug!("Inserted VPS {} for owner {}", vps.id, vps.owner_id);
        Ok(())
    }

    fn get_vps(&self, id: &str) -> Result<Option<Vps>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {VPS_COLUMNS} FROM vps WHERE id = ?1"),
                params![id],
                RawVps::from_row,
            )
            .optional()?;
        raw.map(RawVps::parse).transpose()
    }

    fn list_vps(&self) -> Result<Vec<Vps>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VPS_COLUMNS} FROM vps ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map([], RawVps::from_row)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.parse()?);
        }
        Ok(out)
    }

    fn list_vps_by_owner(&self, owner_id: &str) -> Result<Vec<Vps>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VPS_COLUMNS} FROM vps WHERE owner_id = ?1 ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![owner_id], RawVps::from_row)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.parse()?);
        }
        Ok(out)
    }

    fn update_vps(&self, vps: &Vps) -> Result<()> {
        let conn = self.conn.lock();
        let spec = serde_json::to_string(&VpsSpecColumn::from(vps))?;
        let rows = conn.execute(
            "UPDATE vps SET name = ?2, status = ?3, spec = ?4, updated_at = ?5,
                deployed_at = ?6, last_started_at = ?7, generation = ?8
             WHERE id = ?1",
            params![
                vps.id,
                vps.name,
                vps.status.as_str(),
                spec,
                vps.updated_at,
                vps.deployed_at,
                vps.last_started_at,
                vps.generation
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("vps", vps.id.as_str()));
        }
        Ok(())
    }

    fn delete_vps(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM vps WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted VPS {}", id);
        }
        Ok(rows > 0)
    }

    fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO vps_activity (id, vps_id, action, outcome, detail, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.vps_id,
                entry.action.as_str(),
                entry.outcome.as_str(),
                serde_json::to_string(&entry.detail)?,
                entry.created_by,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    fn list_activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, vps_id, action, outcome, detail, created_by, created_at
             FROM vps_activity
             WHERE (?1 IS NULL OR vps_id = ?1) AND (?2 IS NULL OR created_by = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![filter.vps_id, filter.created_by, filter.limit as i64],
            |row| {
                Ok(RawActivity {
                    id: row.get(0)?,
                    vps_id: row.get(1)?,
                    action: row.get(2)?,
                    outcome: row.get(3)?,
                    detail: row.get(4)?,
                    created_by: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.parse()?);
        }
        Ok(out)
    }

    fn insert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO auth_sessions (token_hash, identity_id, created_at, expires_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.token_hash,
                session.identity_id,
                session.created_at,
                session.expires_at,
                session.last_seen_at
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT token_hash, identity_id, created_at, expires_at, last_seen_at
                 FROM auth_sessions WHERE token_hash = ?1",
                params![token_hash],
                session_from_row,
            )
            .optional()?)
    }

    fn touch_session(&self, token_hash: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE auth_sessions SET last_seen_at = ?2 WHERE token_hash = ?1",
            params![token_hash, now],
        )?;
        Ok(())
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(rows > 0)
    }

    fn delete_sessions_for(&self, identity_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute(
            "DELETE FROM auth_sessions WHERE identity_id = ?1",
            params![identity_id],
        )?)
    }

    fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?1",
            params![now],
        )?;
        if rows > 0 {
            debug!("Purged {} expired sessions", rows);
        }
        Ok(rows)
    }
}
