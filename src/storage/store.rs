//! Reading Store - SQLite-backed time series of temperature and humidity
//!
//! One table holds both series, keyed by metric name, with a composite
//! B-tree index on `(metric, taken_at)` so every query below is a range scan.
//!
//! The database runs in WAL mode with two connections: the sampling loop
//! writes through `writer`, HTTP queries read through `reader`. A slow query
//! therefore never holds the lock the next sample needs. All statements run
//! on the blocking thread pool.

use chrono::{Local, NaiveDateTime, SubsecRound};
use rusqlite::{params, Connection, OpenFlags, Params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::{StorageError, StorageResult};
use super::types::{ceil_to_second, from_stored, to_stored, JoinedReading, MetricKind, Reading};

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(500);

/// Durable append-only store of readings
#[derive(Clone)]
pub struct ReadingStore {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl ReadingStore {
    /// Create or open the store at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = open_connection(&path)?;
        writer.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS readings (
                metric   TEXT NOT NULL,
                value    REAL NOT NULL,
                taken_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_metric_taken_at
                ON readings(metric, taken_at);
            ",
        )?;

        let reader = open_connection(&path)?;
        reader.execute_batch("PRAGMA query_only = ON;")?;

        tracing::info!(path = %path.display(), "Reading store opened");

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
            path,
        })
    }

    /// Append a reading stamped with the current local time
    pub async fn insert(&self, metric: MetricKind, value: f64) -> StorageResult<Reading> {
        let taken_at = Local::now().naive_local().trunc_subsecs(0);
        self.insert_at(metric, value, taken_at).await
    }

    /// Append a reading with an explicit timestamp (backfill and tests)
    pub(crate) async fn insert_at(
        &self,
        metric: MetricKind,
        value: f64,
        taken_at: NaiveDateTime,
    ) -> StorageResult<Reading> {
        let stamp = to_stored(&taken_at);
        self.with_writer(move |conn| {
            conn.prepare_cached("INSERT INTO readings (metric, value, taken_at) VALUES (?1, ?2, ?3)")?
                .execute(params![metric.as_str(), value, stamp])?;
            Ok(())
        })
        .await?;

        Ok(Reading {
            metric,
            value,
            taken_at: taken_at.trunc_subsecs(0),
        })
    }

    /// Most recent `limit` readings, newest first
    pub async fn fetch_last(&self, metric: MetricKind, limit: usize) -> StorageResult<Vec<Reading>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_reader(move |conn| {
            query_readings(
                conn,
                "SELECT value, taken_at FROM readings
                 WHERE metric = ?1
                 ORDER BY taken_at DESC, rowid DESC
                 LIMIT ?2",
                metric,
                params![metric.as_str(), limit],
            )
        })
        .await
    }

    /// All readings strictly between `start` and `end`, oldest first
    ///
    /// Both bounds are exclusive and may carry fractions of a second. A window
    /// with `start >= end` is empty.
    pub async fn fetch_between(
        &self,
        metric: MetricKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> StorageResult<Vec<Reading>> {
        let (start, end) = (to_stored(&start), to_stored(&ceil_to_second(&end)));
        self.with_reader(move |conn| {
            query_readings(
                conn,
                "SELECT value, taken_at FROM readings
                 WHERE metric = ?1 AND taken_at > ?2 AND taken_at < ?3
                 ORDER BY taken_at ASC, rowid ASC",
                metric,
                params![metric.as_str(), start, end],
            )
        })
        .await
    }

    /// Mean value strictly between `start` and `end`
    ///
    /// Returns `None` when the window holds no readings.
    pub async fn average(
        &self,
        metric: MetricKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> StorageResult<Option<f64>> {
        let (start, end) = (to_stored(&start), to_stored(&ceil_to_second(&end)));
        self.with_reader(move |conn| {
            let avg = conn
                .prepare_cached(
                    "SELECT AVG(value) FROM readings
                     WHERE metric = ?1 AND taken_at > ?2 AND taken_at < ?3",
                )?
                .query_row(params![metric.as_str(), start, end], |row| {
                    row.get::<_, Option<f64>>(0)
                })?;
            Ok(avg)
        })
        .await
    }

    /// Temperature readings paired with humidity at the same timestamp
    ///
    /// Only minutes whose minute-of-hour is a multiple of `interval_minutes`
    /// are kept, one row per minute, taking the maximum of each series. The
    /// window is inclusive on both ends. Rows without a humidity reading at
    /// the identical timestamp keep `humidity = None`.
    pub async fn fetch_joined_at_interval(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval_minutes: u32,
    ) -> StorageResult<Vec<JoinedReading>> {
        let (start, end) = (to_stored(&ceil_to_second(&start)), to_stored(&end));
        let interval = interval_minutes.max(1);

        self.with_reader(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT strftime('%Y-%m-%d %H:%M:00', t.taken_at) AS minute,
                        MAX(t.value),
                        MAX(h.value)
                 FROM readings AS t
                 LEFT JOIN readings AS h
                   ON h.metric = ?4 AND h.taken_at = t.taken_at
                 WHERE t.metric = ?5
                   AND t.taken_at >= ?1
                   AND t.taken_at <= ?2
                   AND CAST(strftime('%M', t.taken_at) AS INTEGER) % ?3 = 0
                 GROUP BY minute
                 ORDER BY minute",
            )?;

            let rows = stmt.query_map(
                params![
                    start,
                    end,
                    interval,
                    MetricKind::Humidity.as_str(),
                    MetricKind::Temperature.as_str()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )?;

            let mut joined = Vec::new();
            for row in rows {
                let (minute, temperature, humidity) = row?;
                joined.push(JoinedReading {
                    timestamp: from_stored(&minute)?,
                    temperature,
                    humidity,
                });
            }
            Ok(joined)
        })
        .await
    }

    /// Number of readings stored for a metric
    pub async fn count(&self, metric: MetricKind) -> StorageResult<u64> {
        self.with_reader(move |conn| {
            let count: i64 = conn
                .prepare_cached("SELECT COUNT(*) FROM readings WHERE metric = ?1")?
                .query_row(params![metric.as_str()], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_writer<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        run_blocking(Arc::clone(&self.writer), "writer", f).await
    }

    async fn with_reader<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        run_blocking(Arc::clone(&self.reader), "reader", f).await
    }
}

fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

async fn run_blocking<T, F>(conn: Arc<Mutex<Connection>>, role: &'static str, f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("{} connection: {}", role, e)))?;
        f(&guard)
    })
    .await?
}

fn query_readings<P: Params>(
    conn: &Connection,
    sql: &str,
    metric: MetricKind,
    params: P,
) -> StorageResult<Vec<Reading>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut readings = Vec::new();
    for row in rows {
        let (value, taken_at) = row?;
        readings.push(Reading {
            metric,
            value,
            taken_at: from_stored(&taken_at)?,
        });
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn open_temp() -> (ReadingStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = ReadingStore::open(dir.path().join("readings.db")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_insert_assigns_timestamp() {
        let (store, _dir) = open_temp();

        let before = Local::now().naive_local().trunc_subsecs(0);
        let reading = store.insert(MetricKind::Temperature, 21.4).await.unwrap();
        let after = Local::now().naive_local();

        assert_eq!(reading.value, 21.4);
        assert!(reading.taken_at >= before && reading.taken_at <= after);
        assert_eq!(store.count(MetricKind::Temperature).await.unwrap(), 1);
        assert_eq!(store.count(MetricKind::Humidity).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_last_newest_first_and_limited() {
        let (store, _dir) = open_temp();

        for i in 0..15 {
            store
                .insert_at(MetricKind::Humidity, 40.0 + i as f64, at(10, 0, i))
                .await
                .unwrap();
        }

        let last = store.fetch_last(MetricKind::Humidity, 10).await.unwrap();
        assert_eq!(last.len(), 10);
        assert_eq!(last[0].value, 54.0);
        assert_eq!(last[9].value, 45.0);
        assert!(last.windows(2).all(|w| w[0].taken_at >= w[1].taken_at));
    }

    #[tokio::test]
    async fn test_fetch_last_keeps_series_apart() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 20.0, at(8, 0, 0)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 55.0, at(8, 0, 0)).await.unwrap();

        let temps = store.fetch_last(MetricKind::Temperature, 10).await.unwrap();
        assert_eq!(temps.len(), 1);
        assert_eq!(temps[0].metric, MetricKind::Temperature);
        assert_eq!(temps[0].value, 20.0);
    }

    #[tokio::test]
    async fn test_fetch_between_is_exclusive() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 1.0, at(9, 0, 0)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 2.0, at(9, 30, 0)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 3.0, at(10, 0, 0)).await.unwrap();

        let readings = store
            .fetch_between(MetricKind::Temperature, at(9, 0, 0), at(10, 0, 0))
            .await
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 2.0);

        let readings = store
            .fetch_between(MetricKind::Temperature, at(8, 59, 59), at(10, 0, 1))
            .await
            .unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_fractional_bounds() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Humidity, 40.0, at(10, 0, 0)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 42.0, at(10, 0, 1)).await.unwrap();

        let end = at(10, 0, 0) + chrono::Duration::milliseconds(500);
        let readings = store
            .fetch_between(MetricKind::Humidity, at(9, 0, 0), end)
            .await
            .unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![40.0]);

        let avg = store.average(MetricKind::Humidity, at(9, 0, 0), end).await.unwrap();
        assert_eq!(avg, Some(40.0));

        // A start just after 10:00:00 excludes that reading
        let start = at(9, 59, 59) + chrono::Duration::milliseconds(500);
        let readings = store
            .fetch_between(MetricKind::Humidity, start, at(11, 0, 0))
            .await
            .unwrap();
        assert_eq!(readings.len(), 2);
    }

    #[tokio::test]
    async fn test_joined_fractional_start_is_inclusive_of_next_second_only() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 20.0, at(10, 0, 0)).await.unwrap();

        let start = at(10, 0, 0) + chrono::Duration::milliseconds(250);
        let joined = store
            .fetch_joined_at_interval(start, at(11, 0, 0), 15)
            .await
            .unwrap();
        assert!(joined.is_empty());

        let joined = store
            .fetch_joined_at_interval(at(10, 0, 0), at(11, 0, 0), 15)
            .await
            .unwrap();
        assert_eq!(joined.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_between_inverted_window_is_empty() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 1.0, at(9, 0, 0)).await.unwrap();

        let readings = store
            .fetch_between(MetricKind::Temperature, at(12, 0, 0), at(6, 0, 0))
            .await
            .unwrap();
        assert!(readings.is_empty());
    }

    #[tokio::test]
    async fn test_average() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 10.0, at(9, 0, 1)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 20.0, at(9, 0, 2)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 30.0, at(9, 0, 3)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 99.0, at(9, 0, 2)).await.unwrap();

        let avg = store
            .average(MetricKind::Temperature, at(9, 0, 0), at(9, 1, 0))
            .await
            .unwrap();
        assert_eq!(avg, Some(20.0));
    }

    #[tokio::test]
    async fn test_average_empty_window() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 10.0, at(9, 0, 0)).await.unwrap();

        let avg = store
            .average(MetricKind::Temperature, at(11, 0, 0), at(12, 0, 0))
            .await
            .unwrap();
        assert_eq!(avg, None);
    }

    #[tokio::test]
    async fn test_joined_at_interval() {
        let (store, _dir) = open_temp();

        // 10:00 has both series, with a duplicate temperature in the same second
        store.insert_at(MetricKind::Temperature, 20.0, at(10, 0, 0)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 20.4, at(10, 0, 0)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 50.0, at(10, 0, 0)).await.unwrap();
        // 10:07 is not on the 15 minute grid
        store.insert_at(MetricKind::Temperature, 21.0, at(10, 7, 0)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 51.0, at(10, 7, 0)).await.unwrap();
        // 10:15 has no humidity at the identical second
        store.insert_at(MetricKind::Temperature, 22.0, at(10, 15, 2)).await.unwrap();
        store.insert_at(MetricKind::Humidity, 52.0, at(10, 15, 4)).await.unwrap();

        let joined = store
            .fetch_joined_at_interval(at(0, 0, 0), at(23, 59, 59), 15)
            .await
            .unwrap();

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].timestamp, at(10, 0, 0));
        assert_eq!(joined[0].temperature, 20.4);
        assert_eq!(joined[0].humidity, Some(50.0));
        assert_eq!(joined[1].timestamp, at(10, 15, 0));
        assert_eq!(joined[1].temperature, 22.0);
        assert_eq!(joined[1].humidity, None);
    }

    #[tokio::test]
    async fn test_joined_zero_interval_treated_as_every_minute() {
        let (store, _dir) = open_temp();

        store.insert_at(MetricKind::Temperature, 20.0, at(10, 1, 0)).await.unwrap();
        store.insert_at(MetricKind::Temperature, 21.0, at(10, 2, 0)).await.unwrap();

        let joined = store
            .fetch_joined_at_interval(at(10, 0, 0), at(11, 0, 0), 0)
            .await
            .unwrap();
        assert_eq!(joined.len(), 2);
    }

    #[tokio::test]
    async fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("readings.db");

        {
            let store = ReadingStore::open(&path).unwrap();
            store.insert_at(MetricKind::Humidity, 61.0, at(7, 0, 0)).await.unwrap();
        }

        let store = ReadingStore::open(&path).unwrap();
        let last = store.fetch_last(MetricKind::Humidity, 10).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].taken_at, at(7, 0, 0));
        assert_eq!(store.path(), path.as_path());
    }
}
