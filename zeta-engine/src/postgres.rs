//! Postgres storage backend
//!
//! Every ticket mutation is a single `UPDATE` whose `WHERE` clause guards
//! on the current byte (`get_byte`/`set_byte` on the bytea columns), so
//! concurrent transitions on one ticket serialize in the database with
//! exactly one winner. Issuance increments `issued` with a `RETURNING`
//! clause under the same rule.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use zeta_core::{Event, Permissions, Result, ZetaError};

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseCreds {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

const POOL_MIN_CONNECTIONS: u32 = 1;
const POOL_MAX_CONNECTIONS: u32 = 5;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        tickets INTEGER NOT NULL,
        issued INTEGER NOT NULL,
        start DOUBLE PRECISION NOT NULL,
        finish DOUBLE PRECISION NOT NULL,
        restricted BOOLEAN NOT NULL,
        transfer_limit SMALLINT NOT NULL,
        enable_flags BOOLEAN NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS event_data (
        event_id TEXT PRIMARY KEY REFERENCES events (id) ON DELETE CASCADE,
        event_key BYTEA NOT NULL,
        owner_public_key TEXT NOT NULL,
        owner_public_key_hash BYTEA NOT NULL,
        state_bytes BYTEA NOT NULL,
        flag_bytes BYTEA
    );",
    "CREATE TABLE IF NOT EXISTS event_permissions (
        event_id TEXT NOT NULL REFERENCES events (id) ON DELETE CASCADE,
        public_key_hash BYTEA NOT NULL,
        cancel_ticket BOOLEAN NOT NULL,
        see_ticket_flag BOOLEAN NOT NULL,
        update_ticket_flag BOOLEAN NOT NULL,
        authorize_registration BOOLEAN NOT NULL,
        see_stamped_ticket BOOLEAN NOT NULL,
        stamp_ticket BOOLEAN NOT NULL,
        PRIMARY KEY (event_id, public_key_hash)
    );",
];

const DROP_SCHEMA: &[&str] = &[
    "DROP TABLE IF EXISTS event_permissions;",
    "DROP TABLE IF EXISTS event_data;",
    "DROP TABLE IF EXISTS events;",
];

const EVENT_COLUMNS: &str =
    "id, name, description, tickets, issued, start, finish, restricted, transfer_limit, enable_flags";

fn storage_err(err: sqlx::Error) -> ZetaError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            ZetaError::unavailable(format!("database unavailable: {err}"))
        }
        other => ZetaError::internal(format!("database error: {other}")),
    }
}

/// Pooled Postgres store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a bounded connection pool
    pub async fn connect(creds: &DatabaseCreds) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&creds.host)
            .port(creds.port)
            .database(&creds.dbname)
            .username(&creds.user)
            .password(&creds.password);

        let pool = PgPoolOptions::new()
            .min_connections(POOL_MIN_CONNECTIONS)
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(storage_err)?;

        Ok(PgStore { pool })
    }

    /// Create the tables; with `drop_existing`, start from a clean slate
    pub async fn install_schema(&self, drop_existing: bool) -> Result<()> {
        if drop_existing {
            for statement in DROP_SCHEMA {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
            }
        }
        for statement in CREATE_SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        Ok(())
    }

    fn event_from_row(row: &PgRow) -> Result<Event> {
        Ok(Event {
            id: row.try_get("id").map_err(storage_err)?,
            name: row.try_get("name").map_err(storage_err)?,
            description: row.try_get("description").map_err(storage_err)?,
            tickets: row.try_get::<i32, _>("tickets").map_err(storage_err)? as u32,
            issued: row.try_get::<i32, _>("issued").map_err(storage_err)? as u32,
            start: row.try_get("start").map_err(storage_err)?,
            finish: row.try_get("finish").map_err(storage_err)?,
            restricted: row.try_get("restricted").map_err(storage_err)?,
            transfer_limit: row.try_get::<i16, _>("transfer_limit").map_err(storage_err)? as u8,
            enable_flags: row.try_get("enable_flags").map_err(storage_err)?,
        })
    }

    pub(crate) async fn create_event(
        &self,
        event: &Event,
        event_key: &[u8],
        owner_public_key: &str,
        owner_key_hash: &[u8],
    ) -> Result<()> {
        let state_bytes = vec![0u8; event.tickets as usize];
        let flag_bytes: Option<Vec<u8>> = event
            .enable_flags
            .then(|| vec![0u8; event.tickets as usize]);

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO events (id, name, description, tickets, issued, start, finish, \
             restricted, transfer_limit, enable_flags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.tickets as i32)
        .bind(event.issued as i32)
        .bind(event.start)
        .bind(event.finish)
        .bind(event.restricted)
        .bind(event.transfer_limit as i16)
        .bind(event.enable_flags)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO event_data (event_id, event_key, owner_public_key, \
             owner_public_key_hash, state_bytes, flag_bytes) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&event.id)
        .bind(event_key)
        .bind(owner_public_key)
        .bind(owner_key_hash)
        .bind(&state_bytes)
        .bind(&flag_bytes)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)
    }

    pub(crate) async fn load_event(&self, event_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(Self::event_from_row).transpose()
    }

    pub(crate) async fn search_events(&self, text: &str, limit: u32) -> Result<Vec<Event>> {
        let pattern = format!("%{text}%");
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE name ILIKE $1 LIMIT $2"
        ))
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(Self::event_from_row).collect()
    }

    pub(crate) async fn delete_event(&self, event_id: &str) -> Result<bool> {
        let done = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(done.rows_affected() > 0)
    }

    pub(crate) async fn load_event_key(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT event_key FROM event_data WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| row.try_get("event_key").map_err(storage_err))
            .transpose()
    }

    pub(crate) async fn load_owner_public_key(&self, event_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT owner_public_key FROM event_data WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| row.try_get("owner_public_key").map_err(storage_err))
            .transpose()
    }

    pub(crate) async fn load_owner_key_hash(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT owner_public_key_hash FROM event_data WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| row.try_get("owner_public_key_hash").map_err(storage_err))
            .transpose()
    }

    pub(crate) async fn issue(&self, event_id: &str) -> Result<Option<u32>> {
        let row = sqlx::query(
            "UPDATE events SET issued = issued + 1 \
             WHERE id = $1 AND issued < tickets \
             RETURNING issued",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => {
                let issued: i32 = row.try_get("issued").map_err(storage_err)?;
                Ok(Some(issued as u32 - 1))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn reissue(&self, event_id: &str, number: u32, version: u8) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE event_data SET state_bytes = set_byte(state_bytes, $2, $3) \
             WHERE event_id = $1 AND get_byte(state_bytes, $2) = $4",
        )
        .bind(event_id)
        .bind(number as i32)
        .bind((version + 1) as i32)
        .bind(version as i32)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(done.rows_affected() == 1)
    }

    pub(crate) async fn advance_state(
        &self,
        event_id: &str,
        number: u32,
        value: u8,
        threshold: u8,
    ) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE event_data SET state_bytes = set_byte(state_bytes, $2, $3) \
             WHERE event_id = $1 AND get_byte(state_bytes, $2) < $4",
        )
        .bind(event_id)
        .bind(number as i32)
        .bind(value as i32)
        .bind(threshold as i32)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(done.rows_affected() == 1)
    }

    pub(crate) async fn cancel_state(&self, event_id: &str, number: u32) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE event_data \
             SET state_bytes = set_byte(state_bytes, $2, get_byte(state_bytes, $2) | $3) \
             WHERE event_id = $1 AND get_byte(state_bytes, $2) < $3",
        )
        .bind(event_id)
        .bind(number as i32)
        .bind(zeta_core::state::CANCELED as i32)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(done.rows_affected() == 1)
    }

    pub(crate) async fn load_state_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        let row = sqlx::query(
            "SELECT get_byte(state_bytes, $2) AS state \
             FROM event_data WHERE event_id = $1",
        )
        .bind(event_id)
        .bind(number as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => {
                let state: i32 = row.try_get("state").map_err(storage_err)?;
                Ok(Some(state as u8))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn load_flag_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        let row = sqlx::query(
            "SELECT get_byte(flag_bytes, $2) AS flag \
             FROM event_data WHERE event_id = $1 AND flag_bytes IS NOT NULL",
        )
        .bind(event_id)
        .bind(number as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => {
                let flag: i32 = row.try_get("flag").map_err(storage_err)?;
                Ok(Some(flag as u8))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn update_flag_byte(
        &self,
        event_id: &str,
        number: u32,
        mask: u8,
        bits: u8,
    ) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE event_data \
             SET flag_bytes = set_byte(flag_bytes, $2, (get_byte(flag_bytes, $2) & $3) | $4) \
             WHERE event_id = $1 AND flag_bytes IS NOT NULL",
        )
        .bind(event_id)
        .bind(number as i32)
        .bind(mask as i32)
        .bind(bits as i32)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(done.rows_affected() == 1)
    }

    pub(crate) async fn load_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
    ) -> Result<Option<Permissions>> {
        let row = sqlx::query(
            "SELECT cancel_ticket, see_ticket_flag, update_ticket_flag, \
             authorize_registration, see_stamped_ticket, stamp_ticket \
             FROM event_permissions WHERE event_id = $1 AND public_key_hash = $2",
        )
        .bind(event_id)
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Ok(Some(Permissions {
                cancel_ticket: row.try_get("cancel_ticket").map_err(storage_err)?,
                see_ticket_flag: row.try_get("see_ticket_flag").map_err(storage_err)?,
                update_ticket_flag: row.try_get("update_ticket_flag").map_err(storage_err)?,
                authorize_registration: row
                    .try_get("authorize_registration")
                    .map_err(storage_err)?,
                see_stamped_ticket: row.try_get("see_stamped_ticket").map_err(storage_err)?,
                stamp_ticket: row.try_get("stamp_ticket").map_err(storage_err)?,
            })),
            None => Ok(None),
        }
    }

    pub(crate) async fn upsert_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
        permissions: &Permissions,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_permissions (event_id, public_key_hash, cancel_ticket, \
             see_ticket_flag, update_ticket_flag, authorize_registration, \
             see_stamped_ticket, stamp_ticket) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (event_id, public_key_hash) DO UPDATE SET \
             cancel_ticket = EXCLUDED.cancel_ticket, \
             see_ticket_flag = EXCLUDED.see_ticket_flag, \
             update_ticket_flag = EXCLUDED.update_ticket_flag, \
             authorize_registration = EXCLUDED.authorize_registration, \
             see_stamped_ticket = EXCLUDED.see_stamped_ticket, \
             stamp_ticket = EXCLUDED.stamp_ticket",
        )
        .bind(event_id)
        .bind(key_hash)
        .bind(permissions.cancel_ticket)
        .bind(permissions.see_ticket_flag)
        .bind(permissions.update_ticket_flag)
        .bind(permissions.authorize_registration)
        .bind(permissions.see_stamped_ticket)
        .bind(permissions.stamp_ticket)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    pub(crate) async fn remove_permissions(&self, event_id: &str, key_hash: &[u8]) -> Result<()> {
        sqlx::query("DELETE FROM event_permissions WHERE event_id = $1 AND public_key_hash = $2")
            .bind(event_id)
            .bind(key_hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}
