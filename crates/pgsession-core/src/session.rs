//! Session record persisted by storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Client software that opened the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Operating system, if known
    #[serde(default)]
    pub os: Option<String>,

    /// Browser, if known
    #[serde(default)]
    pub browser: Option<String>,
}

/// One authenticated client's login state.
///
/// The host owns session semantics (ID generation, renewal); backends only
/// persist what they are given. There is no update path: a session is created
/// once and removed either explicitly or after `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Globally unique session ID
    pub id: String,

    /// Owning user; one user may hold many sessions
    pub user_key: String,

    /// Client address, if recorded
    #[serde(default)]
    pub ip: Option<IpAddr>,

    #[serde(default)]
    pub agent: Agent,
}

impl Session {
    /// Create a session without client metadata
    pub fn new(
        id: impl Into<String>,
        user_key: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            created_at,
            expires_at,
            id: id.into(),
            user_key: user_key.into(),
            ip: None,
            agent: Agent::default(),
        }
    }

    /// Set the client address
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Set the client agent
    pub fn with_agent(mut self, os: impl Into<String>, browser: impl Into<String>) -> Self {
        self.agent = Agent {
            os: Some(os.into()),
            browser: Some(browser.into()),
        };
        self
    }

    /// A session is active while its expiry is strictly in the future.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_active_at() {
        let now = Utc::now();
        let session = Session::new("id", "key", now, now + Duration::hours(1));

        assert!(session.is_active_at(now));
        assert!(!session.is_active_at(now + Duration::hours(1)));
        assert!(!session.is_active_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_builder_sets_metadata() {
        let now = Utc::now();
        let session = Session::new("id", "key", now, now)
            .with_ip("127.0.0.1".parse().unwrap())
            .with_agent("GNU/Linux", "Firefox");

        assert_eq!(session.ip, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(session.agent.os.as_deref(), Some("GNU/Linux"));
        assert_eq!(session.agent.browser.as_deref(), Some("Firefox"));
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let session: Session = serde_json::from_value(serde_json::json!({
            "created_at": "2024-01-01T00:00:00Z",
            "expires_at": "2024-01-02T00:00:00Z",
            "id": "id",
            "user_key": "key",
        }))
        .unwrap();

        assert_eq!(session.ip, None);
        assert_eq!(session.agent, Agent::default());
    }
}
