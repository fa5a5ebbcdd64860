use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::{AffinityError, Result};
use crate::model::{ItemId, ItemPerformance, Rating};
use crate::store::RatingsSource;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ratings (
        user_id INTEGER NOT NULL,
        item_id INTEGER NOT NULL,
        rating REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ratings_item ON ratings (item_id);
";

/// Ratings persisted in a single SQLite `ratings` table.
///
/// The store only remembers its path and opens a fresh connection per call, so one
/// instance can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct SqliteRatingsStore {
    path: PathBuf,
}

impl SqliteRatingsStore {
    /// Points at a database without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the database file (and parent directories) if needed and ensures the
    /// schema exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        store.open_write()?;
        Ok(store)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_write(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn open_read(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(conn)
    }

    /// Replaces the whole table with `ratings` inside one transaction.
    ///
    /// An empty input is rejected with [`AffinityError::NoData`] and leaves the table
    /// untouched.
    pub fn replace_ratings(&self, ratings: &[Rating]) -> Result<usize> {
        if ratings.is_empty() {
            return Err(AffinityError::NoData);
        }
        let mut conn = self.open_write()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM ratings", [])?;
        let written = insert_all(&tx, ratings)?;
        tx.commit()?;
        info!(
            db_path = %self.path.display(),
            rows = written,
            "store.ratings.replaced"
        );
        Ok(written)
    }

    /// Appends `ratings` to the table inside one transaction.
    pub fn append_ratings(&self, ratings: &[Rating]) -> Result<usize> {
        let mut conn = self.open_write()?;
        let tx = conn.transaction()?;
        let written = insert_all(&tx, ratings)?;
        tx.commit()?;
        info!(
            db_path = %self.path.display(),
            rows = written,
            "store.ratings.appended"
        );
        Ok(written)
    }

    /// Number of stored ratings.
    pub fn rating_count(&self) -> Result<u64> {
        let conn = self.open_read()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Interaction count and mean rating per item, busiest items first.
    pub fn performance_metrics(&self) -> Result<Vec<ItemPerformance>> {
        let conn = self.open_read()?;
        let mut stmt = conn.prepare(
            "SELECT item_id, COUNT(user_id) AS total_interactions, AVG(rating) AS avg_score
             FROM ratings
             GROUP BY item_id
             ORDER BY total_interactions DESC, item_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(item_id, total, avg_score)| {
                let item_id = ItemId::try_from(item_id).map_err(|_| {
                    AffinityError::InvalidRating(format!("item_id {item_id} must be positive"))
                })?;
                Ok(ItemPerformance {
                    item_id,
                    total_interactions: u64::try_from(total).unwrap_or(0),
                    avg_score,
                })
            })
            .collect()
    }
}

fn insert_all(tx: &rusqlite::Transaction<'_>, ratings: &[Rating]) -> Result<usize> {
    let mut stmt =
        tx.prepare("INSERT INTO ratings (user_id, item_id, rating) VALUES (?1, ?2, ?3)")?;
    for rating in ratings {
        stmt.execute(params![
            to_column(rating.user_id())?,
            to_column(rating.item_id())?,
            rating.value()
        ])?;
    }
    Ok(ratings.len())
}

fn to_column(id: u64) -> Result<i64> {
    i64::try_from(id)
        .map_err(|_| AffinityError::InvalidArgument(format!("id {id} does not fit in SQLite")))
}

impl RatingsSource for SqliteRatingsStore {
    /// Reads every row in insertion order and validates it.
    ///
    /// A missing database or table is an access failure; a row outside the rating
    /// bounds is reported as [`AffinityError::InvalidRating`].
    fn fetch_ratings(&self) -> Result<Vec<Rating>> {
        let conn = self.open_read()?;
        let mut stmt =
            conn.prepare("SELECT user_id, item_id, rating FROM ratings ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let ratings = rows
            .into_iter()
            .map(|(user, item, value)| Rating::from_signed(user, item, value))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            db_path = %self.path.display(),
            rows = ratings.len(),
            "store.ratings.fetched"
        );
        Ok(ratings)
    }
}
