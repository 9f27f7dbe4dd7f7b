//! Mapping between `Session` values and session table rows
//!
//! The three optional columns (`ip`, `agent_os`, `agent_browser`) share one
//! rule: an absent or empty value is written as NULL, and NULL (or a stray
//! empty string) is read back as absent.

use chrono::{DateTime, Utc};
use pgsession_core::{Agent, Session};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use std::net::IpAddr;

/// Optional column value to write: empty strings become NULL
pub(crate) fn encode_optional(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Optional column value read back: NULL and empty strings are absent
pub(crate) fn decode_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse a stored client address. Unparseable text is treated as absent.
fn decode_ip(value: Option<String>) -> Option<IpAddr> {
    let text = decode_optional(value)?;
    match text.parse() {
        Ok(ip) => Some(ip),
        Err(e) => {
            tracing::warn!(ip = %text, error = %e, "Ignoring unparseable stored client IP");
            None
        }
    }
}

/// A session in column order, ready to be bound to the insert statement
#[derive(Debug, PartialEq)]
pub(crate) struct SessionParams<'a> {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub id: &'a str,
    pub user_key: &'a str,
    pub ip: Option<String>,
    pub agent_os: Option<&'a str>,
    pub agent_browser: Option<&'a str>,
}

impl<'a> SessionParams<'a> {
    pub fn encode(session: &'a Session) -> Self {
        let ip = session.ip.map(|ip| ip.to_string());

        Self {
            created_at: session.created_at,
            expires_at: session.expires_at,
            id: &session.id,
            user_key: &session.user_key,
            ip: encode_optional(ip.as_deref()).map(str::to_string),
            agent_os: encode_optional(session.agent.os.as_deref()),
            agent_browser: encode_optional(session.agent.browser.as_deref()),
        }
    }

    /// Bind all seven columns positionally
    pub fn bind(
        self,
        query: Query<'a, Postgres, PgArguments>,
    ) -> Query<'a, Postgres, PgArguments> {
        query
            .bind(self.created_at)
            .bind(self.expires_at)
            .bind(self.id)
            .bind(self.user_key)
            .bind(self.ip)
            .bind(self.agent_os)
            .bind(self.agent_browser)
    }
}

/// Decode one session row
pub(crate) fn decode_session(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        id: row.try_get("id")?,
        user_key: row.try_get("user_key")?,
        ip: decode_ip(row.try_get("ip")?),
        agent: Agent {
            os: decode_optional(row.try_get("agent_os")?),
            browser: decode_optional(row.try_get("agent_browser")?),
        },
    })
}
