//! [`FunnelStore`] over a single SQLite file.

use std::path::Path;

use chrono::Utc;
use funnel_core::{
  event::{Event, NewEvent},
  registration::{NewRegistration, Registration},
  setting::{self, Setting},
  store::{
    CountryCount, EventQuery, FunnelStore, Insertion, PageCount, ResetCounts, StoreStats,
  },
  waitlist::{NewWaitlistEntry, WaitlistEntry},
  wire,
};
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{RawEvent, RawRegistration, RawSetting, RawWaitlistEntry, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A funnel store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Column values for one `events` row, ready to bind.
struct EventRow {
  id:           Option<i64>,
  event:        String,
  timestamp:    String,
  page:         Option<String>,
  visitor_id:   Option<String>,
  variant:      Option<String>,
  referred_by:  Option<i64>,
  details_json: String,
  created_at:   String,
}

impl EventRow {
  fn new(event: &Event) -> Result<Self> {
    let d = &event.details;
    Ok(Self {
      id:           Some(event.id),
      event:        event.kind.as_str().to_owned(),
      timestamp:    encode_dt(event.timestamp),
      page:         d.page.clone(),
      visitor_id:   d.visitor_id.clone(),
      variant:      d.variant.clone(),
      referred_by:  d.referred_by,
      details_json: serde_json::to_string(d)?,
      created_at:   encode_dt(event.created_at.unwrap_or_else(Utc::now)),
    })
  }

  fn insert(&self, conn: &rusqlite::Connection, or_ignore: bool) -> rusqlite::Result<usize> {
    let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
    conn.execute(
      &format!(
        "{verb} INTO events (
           id, event, timestamp, page, visitor_id, variant, referred_by,
           details_json, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
      ),
      rusqlite::params![
        self.id,
        self.event,
        self.timestamp,
        self.page,
        self.visitor_id,
        self.variant,
        self.referred_by,
        self.details_json,
        self.created_at,
      ],
    )
  }
}

/// Column values for one `registrations` row, ready to bind.
struct RegistrationRow {
  id:           Option<i64>,
  email:        String,
  timestamp:    String,
  visitor_id:   Option<String>,
  variant:      Option<String>,
  referred_by:  Option<i64>,
  country:      Option<String>,
  details_json: String,
  created_at:   String,
}

impl RegistrationRow {
  fn new(r: &Registration) -> Result<Self> {
    let d = &r.details;
    Ok(Self {
      id:           Some(r.id),
      email:        r.email.trim().to_owned(),
      timestamp:    encode_dt(r.timestamp),
      visitor_id:   d.visitor_id.clone(),
      variant:      d.variant.clone(),
      referred_by:  d.referred_by,
      country:      d.context.country.clone(),
      details_json: serde_json::to_string(d)?,
      created_at:   encode_dt(r.created_at.unwrap_or_else(Utc::now)),
    })
  }

  /// Inserts unless the id or `(email, timestamp)` is taken. Returns the
  /// number of rows written.
  fn insert_or_ignore(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT OR IGNORE INTO registrations (
         id, email, timestamp, visitor_id, variant, referred_by, country,
         details_json, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      rusqlite::params![
        self.id,
        self.email,
        self.timestamp,
        self.visitor_id,
        self.variant,
        self.referred_by,
        self.country,
        self.details_json,
        self.created_at,
      ],
    )
  }
}

impl SqliteStore {
  /// Opens `path`, creating the file and tables if needed.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    debug!(path = %path.as_ref().display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// A throwaway store that lives only as long as the connection.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let now = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(SCHEMA)?;
        for (key, value) in setting::DEFAULTS {
          conn.execute(
            "INSERT OR IGNORE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now],
          )?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FunnelStore impl ────────────────────────────────────────────────────────

impl FunnelStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn append_event(&self, input: NewEvent) -> Result<i64> {
    let event = input.into_event(0)?;
    let mut row = EventRow::new(&event)?;
    row.id = None;

    let id = self
      .conn
      .call(move |conn| {
        row.insert(conn, false)?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  async fn list_events(&self, query: EventQuery) -> Result<Vec<Event>> {
    let mut sql = format!("SELECT {} FROM events WHERE 1 = 1", RawEvent::COLUMNS);
    let mut values: Vec<Value> = Vec::new();

    if let Some(kind) = &query.kind {
      sql.push_str(" AND event = ?");
      values.push(Value::Text(kind.as_str().to_owned()));
    }
    if let Some(from) = query.from {
      sql.push_str(" AND timestamp >= ?");
      values.push(Value::Text(encode_dt(from)));
    }
    if let Some(to) = query.to {
      sql.push_str(" AND timestamp <= ?");
      values.push(Value::Text(encode_dt(to)));
    }
    sql.push_str(" ORDER BY timestamp DESC, id DESC");
    if let Some(limit) = query.limit {
      sql.push_str(" LIMIT ?");
      values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn get_event(&self, id: i64) -> Result<Option<Event>> {
    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM events WHERE id = ?1", RawEvent::COLUMNS),
            rusqlite::params![id],
            RawEvent::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn delete_event(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM events WHERE id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Registrations ─────────────────────────────────────────────────────────

  async fn append_registration(&self, input: NewRegistration) -> Result<Insertion> {
    input.validate()?;
    let email = wire::non_blank(input.email.as_deref())
      .ok_or(funnel_core::Error::MissingField("email"))?
      .to_owned();
    let timestamp = input.timestamp.ok_or(funnel_core::Error::MissingField("timestamp"))?;
    let registration =
      Registration { id: 0, email, timestamp, details: input.details, created_at: None };
    let mut row = RegistrationRow::new(&registration)?;
    row.id = None;

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = row.insert_or_ignore(conn)?;
        Ok((changed > 0).then(|| conn.last_insert_rowid()))
      })
      .await?;

    Ok(match inserted {
      Some(id) => Insertion::Created(id),
      None => {
        debug!(email = %registration.email, "duplicate registration skipped");
        Insertion::Duplicate
      }
    })
  }

  async fn list_registrations(&self, limit: Option<usize>) -> Result<Vec<Registration>> {
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let raws: Vec<RawRegistration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM registrations ORDER BY timestamp DESC, id DESC LIMIT ?1",
          RawRegistration::COLUMNS
        ))?;
        let rows = stmt
          .query_map([limit], RawRegistration::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRegistration::into_registration).collect()
  }

  async fn get_registration(&self, id: i64) -> Result<Option<Registration>> {
    let raw: Option<RawRegistration> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM registrations WHERE id = ?1", RawRegistration::COLUMNS),
            [id],
            RawRegistration::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRegistration::into_registration).transpose()
  }

  async fn delete_registration(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM registrations WHERE id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn stats(&self) -> Result<StoreStats> {
    let stats = self
      .conn
      .call(|conn| {
        let count = |sql: &str| -> rusqlite::Result<u64> {
          conn.query_row(sql, [], |row| row.get::<_, i64>(0)).map(|n| n as u64)
        };

        let total_events = count("SELECT COUNT(*) FROM events")?;
        let total_visits = count("SELECT COUNT(*) FROM events WHERE event = 'page_visit'")?;
        let unique_visitors = count(
          "SELECT COUNT(DISTINCT visitor_id) FROM events
           WHERE visitor_id IS NOT NULL AND visitor_id != ''",
        )?;
        let button_clicks = count("SELECT COUNT(*) FROM events WHERE event = 'button_click'")?;
        let total_registrations = count("SELECT COUNT(*) FROM registrations")?;

        let mut stmt = conn.prepare(
          "SELECT country, COUNT(*) FROM registrations
           WHERE country IS NOT NULL AND country != ''
           GROUP BY country ORDER BY COUNT(*) DESC, country",
        )?;
        let registrations_by_country = stmt
          .query_map([], |row| {
            Ok(CountryCount { country: row.get(0)?, count: row.get::<_, i64>(1)? as u64 })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT COALESCE(page, 'unknown') AS page, COUNT(*) FROM events
           WHERE event = 'page_visit'
           GROUP BY COALESCE(page, 'unknown') ORDER BY COUNT(*) DESC, page",
        )?;
        let page_views = stmt
          .query_map([], |row| {
            Ok(PageCount { page: row.get(0)?, count: row.get::<_, i64>(1)? as u64 })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoreStats {
          total_events,
          total_visits,
          unique_visitors,
          total_registrations,
          button_clicks,
          registrations_by_country,
          page_views,
        })
      })
      .await?;
    Ok(stats)
  }

  async fn reset(&self) -> Result<ResetCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let events = tx.execute("DELETE FROM events", [])? as u64;
        let registrations = tx.execute("DELETE FROM registrations", [])? as u64;
        tx.commit()?;
        Ok(ResetCounts { events, registrations })
      })
      .await?;
    info!(events = counts.events, registrations = counts.registrations, "store reset");
    Ok(counts)
  }

  async fn restore_events(&self, events: Vec<Event>) -> Result<u64> {
    let rows = events.iter().map(EventRow::new).collect::<Result<Vec<_>>>()?;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for row in &rows {
          inserted += row.insert(&tx, true)? as u64;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn restore_registrations(&self, registrations: Vec<Registration>) -> Result<u64> {
    let rows =
      registrations.iter().map(RegistrationRow::new).collect::<Result<Vec<_>>>()?;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for row in &rows {
          inserted += row.insert_or_ignore(&tx)? as u64;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn get_setting<'a>(&'a self, key: &'a str) -> Result<Option<Setting>> {
    let key = key.to_owned();
    let raw: Option<RawSetting> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT key, value, updated_at FROM settings WHERE key = ?1",
            [key],
            RawSetting::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSetting::into_setting).transpose()
  }

  async fn set_setting<'a>(&'a self, key: &'a str, value: &'a str) -> Result<Setting> {
    let now = Utc::now();
    let (key, value, at) = (key.to_owned(), value.to_owned(), encode_dt(now));
    let setting = Setting { key: key.clone(), value: value.clone(), updated_at: now };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
          rusqlite::params![key, value, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(setting)
  }

  async fn list_settings(&self) -> Result<Vec<Setting>> {
    let raws: Vec<RawSetting> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
        let rows = stmt
          .query_map([], RawSetting::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSetting::into_setting).collect()
  }

  // ── Waiting list ──────────────────────────────────────────────────────────

  async fn join_waitlist(&self, entry: NewWaitlistEntry) -> Result<Insertion> {
    entry.validate()?;
    let email = wire::non_blank(entry.email.as_deref())
      .ok_or(funnel_core::Error::MissingField("email"))?
      .to_owned();
    let timestamp = entry.timestamp.ok_or(funnel_core::Error::MissingField("timestamp"))?;
    let (ts, details_json, created_at) =
      (encode_dt(timestamp), serde_json::to_string(&entry.details)?, encode_dt(Utc::now()));

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO waitlist (email, timestamp, details_json, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(email) DO NOTHING",
          rusqlite::params![email, ts, details_json, created_at],
        )?;
        Ok((changed > 0).then(|| conn.last_insert_rowid()))
      })
      .await?;

    Ok(inserted.map_or(Insertion::Duplicate, Insertion::Created))
  }

  async fn list_waitlist(&self) -> Result<Vec<WaitlistEntry>> {
    let raws: Vec<RawWaitlistEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, email, timestamp, details_json, created_at FROM waitlist
           ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
          .query_map([], RawWaitlistEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWaitlistEntry::into_entry).collect()
  }
}
