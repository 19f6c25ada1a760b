//! Transactional CRUD over the six entities (spec §4.1). A [`UnitOfWork`] is
//! the explicit handle every service method takes: begin on entry, commit on
//! clean exit, rollback on error. Operations outside a `UnitOfWork` are a
//! programming error — there is no ambient connection pool used directly by
//! services.

pub mod attempts;
pub mod bots;
pub mod groups;
pub mod posts;
pub mod settings;
pub mod users;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::StoreError;

use attempts::AttemptRepo;
use bots::BotRepo;
use groups::GroupRepo;
use posts::PostRepo;
use settings::SettingRepo;
use users::UserRepo;

/// Owns the connection pool and runs migrations at startup (spec §6.2).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Opens a new transactional unit of work. Every repository call made
    /// through the returned handle runs in the same SQL transaction.
    pub async fn begin(&self) -> Result<UnitOfWork<'static>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(UnitOfWork { tx: Some(tx) })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A single-connection in-memory pool for tests. `max_connections(1)`
    /// matters here: SQLite's `:memory:` database is per-connection, so a
    /// pool with more than one connection would see each query land on a
    /// different, empty database. Not gated behind `#[cfg(test)]` so
    /// integration tests under `tests/` can use it too.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

/// A transactional handle exposing the six typed repositories. Dropping it
/// without calling [`UnitOfWork::commit`] rolls the transaction back
/// (sqlx's default `Transaction::drop` behavior).
pub struct UnitOfWork<'a> {
    tx: Option<Transaction<'a, Sqlite>>,
}

impl<'a> UnitOfWork<'a> {
    pub async fn commit(mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().expect("unit of work already consumed");
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().expect("unit of work already consumed");
        tx.rollback().await?;
        Ok(())
    }

    fn tx_mut(&mut self) -> &mut Transaction<'a, Sqlite> {
        self.tx.as_mut().expect("unit of work already consumed")
    }

    pub fn bots(&mut self) -> BotRepo<'_, 'a> {
        BotRepo::new(self.tx_mut())
    }

    pub fn groups(&mut self) -> GroupRepo<'_, 'a> {
        GroupRepo::new(self.tx_mut())
    }

    pub fn posts(&mut self) -> PostRepo<'_, 'a> {
        PostRepo::new(self.tx_mut())
    }

    pub fn attempts(&mut self) -> AttemptRepo<'_, 'a> {
        AttemptRepo::new(self.tx_mut())
    }

    pub fn settings(&mut self) -> SettingRepo<'_, 'a> {
        SettingRepo::new(self.tx_mut())
    }

    pub fn users(&mut self) -> UserRepo<'_, 'a> {
        UserRepo::new(self.tx_mut())
    }
}

/// Maps a raw `sqlx::Error` into the typed taxonomy expected by callers
/// (spec §7): foreign-key violations become [`StoreError::ForeignKeyViolation`]
/// so the scheduler can "log a warning and continue" per the §4.3 tie-break,
/// without string-sniffing SQLite error text at every call site.
pub(crate) fn classify_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKeyViolation;
        }
    }
    StoreError::Database(err)
}
