//! SQLite-backed filing store.
//!
//! All statements run on tokio's blocking pool so store waits never stall
//! request handling on the async workers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use filingwatch_core::error::{FilingWatchError, Result};
use filingwatch_core::traits::FilingStore;
use filingwatch_core::types::{Filing, FilingQuery};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FILING_COLUMNS: &str = "id, company_name, company_code, category, subject, summary, title, \
     filed_at, scraped_at, source_page, pdf_url, screenshot, dispatched";

/// Text order of `filed_at` is not time order once offsets and the
/// space-separated shape mix; `julianday` normalizes both to UTC.
const NEWEST_FIRST: &str = "julianday(filed_at) DESC, id";

/// Filing store over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteFilingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFilingStore {
    /// Open or create the filing database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| store_err("open", e))?;

        // WAL keeps dashboard reads from blocking the scraper's writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| store_err("busy_timeout", e))?;

        let store = Self::from_connection(conn)?;
        tracing::info!("🗄️ Filing store opened: {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("open", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| FilingWatchError::Store(format!("{op}: lock poisoned: {e}")))?;
            f(&guard).map_err(|e| store_err(op, e))
        })
        .await
        .map_err(|e| FilingWatchError::Store(format!("{op}: blocking task failed: {e}")))?
    }
}

/// Run migrations to create tables.
fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS filings (
            id TEXT PRIMARY KEY,
            company_name TEXT NOT NULL,
            company_code TEXT,
            category TEXT NOT NULL DEFAULT 'Other',
            subject TEXT NOT NULL,
            summary TEXT,
            title TEXT,
            filed_at TEXT NOT NULL,          -- RFC 3339 or 'YYYY-MM-DD HH:MM:SS'
            scraped_at TEXT NOT NULL,
            source_page TEXT,
            pdf_url TEXT,
            screenshot TEXT,                 -- JSON: {\"images\": [...]}
            dispatched INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_filings_pending_jd
            ON filings (dispatched, julianday(filed_at) DESC);
        CREATE INDEX IF NOT EXISTS idx_filings_filed_jd
            ON filings (julianday(filed_at) DESC);
        ",
    )
    .map_err(|e| store_err("migrate", e))
}

fn store_err(op: &str, e: rusqlite::Error) -> FilingWatchError {
    FilingWatchError::Store(format!("{op}: {e}"))
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accept RFC 3339 as well as SQLite's `datetime('now')` shape.
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn row_to_filing(row: &Row<'_>) -> rusqlite::Result<Filing> {
    let filed_at: String = row.get(7)?;
    let scraped_at: String = row.get(8)?;
    let filed_at = parse_ts(&filed_at).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("bad filed_at '{filed_at}'").into(),
        )
    })?;
    Ok(Filing {
        id: row.get(0)?,
        company_name: row.get(1)?,
        company_code: row.get(2)?,
        category: row.get(3)?,
        subject: row.get(4)?,
        summary: row.get(5)?,
        title: row.get(6)?,
        filed_at,
        scraped_at: parse_ts(&scraped_at).unwrap_or(filed_at),
        source_page: row.get(9)?,
        pdf_url: row.get(10)?,
        screenshot: row.get(11)?,
        dispatched: row.get::<_, i64>(12)? != 0,
    })
}

#[async_trait]
impl FilingStore for SqliteFilingStore {
    async fn query_pending(&self) -> Result<Vec<Filing>> {
        self.with_conn("query_pending", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FILING_COLUMNS} FROM filings WHERE dispatched = 0 ORDER BY {NEWEST_FIRST}"
            ))?;
            let rows = stmt.query_map([], row_to_filing)?;
            rows.collect()
        })
        .await
    }

    async fn mark_dispatched(&self, id: &str) -> Result<u64> {
        let id = id.to_string();
        self.with_conn("mark_dispatched", move |conn| {
            conn.execute(
                "UPDATE filings SET dispatched = 1 WHERE id = ?1 AND dispatched = 0",
                params![id],
            )
            .map(|n| n as u64)
        })
        .await
    }

    async fn query(&self, query: &FilingQuery) -> Result<Vec<Filing>> {
        let query = query.clone();
        self.with_conn("query", move |conn| {
            let mut sql = format!("SELECT {FILING_COLUMNS} FROM filings WHERE 1=1");
            let mut values: Vec<Value> = Vec::new();

            if let Some(category) = query.category.filter(|c| !c.is_empty()) {
                values.push(Value::Text(category));
                sql.push_str(&format!(" AND category = ?{}", values.len()));
            }
            if let Some(company) = query.company.filter(|c| !c.is_empty()) {
                values.push(Value::Text(format!("%{company}%")));
                let n = values.len();
                sql.push_str(&format!(" AND (company_name LIKE ?{n} OR company_code LIKE ?{n})"));
            }

            values.push(Value::Integer(i64::from(query.limit)));
            values.push(Value::Integer(i64::from(query.offset)));
            sql.push_str(&format!(
                " ORDER BY {NEWEST_FIRST} LIMIT ?{} OFFSET ?{}",
                values.len() - 1,
                values.len()
            ));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(values), row_to_filing)?;
            rows.collect()
        })
        .await
    }

    async fn insert(&self, filing: &Filing) -> Result<bool> {
        let f = filing.clone();
        self.with_conn("insert", move |conn| {
            conn.execute(
                "INSERT INTO filings
                 (id, company_name, company_code, category, subject, summary, title,
                  filed_at, scraped_at, source_page, pdf_url, screenshot, dispatched)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    f.id,
                    f.company_name,
                    f.company_code,
                    f.category,
                    f.subject,
                    f.summary,
                    f.title,
                    format_ts(&f.filed_at),
                    format_ts(&f.scraped_at),
                    f.source_page,
                    f.pdf_url,
                    f.screenshot,
                    f.dispatched as i32,
                ],
            )
            .map(|n| n > 0)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn("ping", |conn| {
            conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
                .optional()
                .map(|_| ())
        })
        .await
    }
}
