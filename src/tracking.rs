//! Per-visitor visit counting.
//!
//! A visitor carries a `(visits, last_visit)` record. The first observed
//! request initializes it to `(1, now)`; later requests increment the count
//! only when more than the configured threshold has elapsed since
//! `last_visit`. The transition itself is a pure function; the two
//! substrates (client cookies vs. a server-side row keyed by a visitor
//! token cookie) only load and store the record.

use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::params;

use crate::config::{TrackingConfig, VisitSubstrate};
use crate::error::AppResult;
use crate::extractors::cookie_value;
use crate::state::DbPool;

pub const VISITS_COOKIE: &str = "visits";
pub const LAST_VISIT_COOKIE: &str = "last_visit";
pub const VISITOR_COOKIE: &str = "linkdir_visitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRecord {
    pub visits: u32,
    pub last_visit: DateTime<Utc>,
}

/// The state machine. Absent record initializes; a present record
/// increments past the threshold and is otherwise left unchanged.
pub fn advance(prev: Option<VisitRecord>, now: DateTime<Utc>, threshold: Duration) -> VisitRecord {
    match prev {
        None => VisitRecord {
            visits: 1,
            last_visit: now,
        },
        Some(rec) if now - rec.last_visit > threshold => VisitRecord {
            visits: rec.visits + 1,
            last_visit: now,
        },
        Some(rec) => rec,
    }
}

/// Decode a stored record. Anything malformed yields None, which the
/// caller treats as a fresh visitor rather than an error.
fn parse_record(visits: Option<&str>, last_visit: Option<&str>) -> Option<VisitRecord> {
    let visits = visits?.trim().parse::<u32>().ok()?;
    let secs = last_visit?.trim().parse::<i64>().ok()?;
    let last_visit = DateTime::from_timestamp(secs, 0)?;
    Some(VisitRecord { visits, last_visit })
}

/// Cookies the handler must attach to its response, as `Set-Cookie` values.
pub type VisitCookies = Vec<(axum::http::HeaderName, String)>;

pub struct VisitTracker {
    substrate: VisitSubstrate,
    threshold: Duration,
}

impl VisitTracker {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            substrate: config.substrate,
            threshold: Duration::seconds(config.threshold_secs as i64),
        }
    }

    /// Run the state machine for this request. Returns the current visit
    /// count and any cookies to set on the response.
    pub fn observe(&self, pool: &DbPool, headers: &HeaderMap) -> AppResult<(u32, VisitCookies)> {
        self.observe_at(pool, headers, Utc::now())
    }

    pub fn observe_at(
        &self,
        pool: &DbPool,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> AppResult<(u32, VisitCookies)> {
        match self.substrate {
            VisitSubstrate::Cookie => Ok(self.observe_cookie(headers, now)),
            VisitSubstrate::Session => self.observe_session(pool, headers, now),
        }
    }

    /// Read the current count without advancing the machine. 0 when absent.
    pub fn peek(&self, pool: &DbPool, headers: &HeaderMap) -> AppResult<u32> {
        match self.substrate {
            VisitSubstrate::Cookie => Ok(cookie_value(headers, VISITS_COOKIE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)),
            VisitSubstrate::Session => {
                let Some(token) = cookie_value(headers, VISITOR_COOKIE) else {
                    return Ok(0);
                };
                let conn = pool.get()?;
                let visits = match conn.query_row(
                    "SELECT visits FROM visit_state WHERE token = ?1",
                    params![token],
                    |row| row.get::<_, i64>(0),
                ) {
                    Ok(visits) => visits,
                    Err(rusqlite::Error::QueryReturnedNoRows) => 0,
                    Err(e) => return Err(e.into()),
                };
                Ok(visits.max(0) as u32)
            }
        }
    }

    fn observe_cookie(&self, headers: &HeaderMap, now: DateTime<Utc>) -> (u32, VisitCookies) {
        let prev = parse_record(
            cookie_value(headers, VISITS_COOKIE).as_deref(),
            cookie_value(headers, LAST_VISIT_COOKIE).as_deref(),
        );
        let next = advance(prev, now, self.threshold);

        let mut cookies = Vec::new();
        if prev != Some(next) {
            cookies.push((
                SET_COOKIE,
                format!("{}={}; Path=/", VISITS_COOKIE, next.visits),
            ));
            cookies.push((
                SET_COOKIE,
                format!(
                    "{}={}; Path=/",
                    LAST_VISIT_COOKIE,
                    next.last_visit.timestamp()
                ),
            ));
        }
        (next.visits, cookies)
    }

    fn observe_session(
        &self,
        pool: &DbPool,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> AppResult<(u32, VisitCookies)> {
        let conn = pool.get()?;
        let mut cookies = Vec::new();

        let token = match cookie_value(headers, VISITOR_COOKIE) {
            Some(token) => token,
            None => {
                let token = generate_visitor_token();
                cookies.push((
                    SET_COOKIE,
                    format!("{}={}; Path=/; HttpOnly", VISITOR_COOKIE, token),
                ));
                token
            }
        };

        // Only a missing row means a fresh visitor; real failures surface.
        let stored: Option<(String, String)> = match conn.query_row(
            "SELECT visits, last_visit FROM visit_state WHERE token = ?1",
            params![token],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?.to_string(),
                    row.get::<_, String>(1)?,
                ))
            },
        ) {
            Ok(row) => Some(row),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let prev = stored
            .as_ref()
            .and_then(|(visits, last)| parse_record(Some(visits), Some(last)));
        let next = advance(prev, now, self.threshold);

        if prev != Some(next) {
            conn.execute(
                "INSERT INTO visit_state (token, visits, last_visit)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(token) DO UPDATE SET
                   visits = excluded.visits,
                   last_visit = excluded.last_visit",
                params![token, next.visits as i64, next.last_visit.timestamp().to_string()],
            )?;
        }

        Ok((next.visits, cookies))
    }
}

fn generate_visitor_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
