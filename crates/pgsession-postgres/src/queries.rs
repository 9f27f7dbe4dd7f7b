//! SQL statements for the session table
//!
//! All statements are rendered once from the validated table name when the
//! store is built; values are always bound as parameters.

use crate::config::TableName;

/// Column list shared by the insert and select statements. The row codec
/// decodes by these names.
pub(crate) const COLUMNS: &str =
    "created_at, expires_at, id, user_key, ip, agent_os, agent_browser";

/// Pre-rendered statements for one session table
#[derive(Debug, Clone)]
pub(crate) struct Queries {
    pub create_table: String,
    pub create_expires_index: String,
    pub insert: String,
    pub select_active_by_id: String,
    pub select_by_user_key: String,
    pub delete_by_id: String,
    pub delete_by_user_key: String,
    pub delete_by_user_key_except: String,
    pub delete_expired: String,
}

impl Queries {
    pub fn new(table: &TableName) -> Self {
        let t = table.as_str();

        Self {
            create_table: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {t} (
                    created_at TIMESTAMPTZ NOT NULL,
                    expires_at TIMESTAMPTZ NOT NULL,
                    id TEXT PRIMARY KEY,
                    user_key TEXT NOT NULL,
                    ip TEXT,
                    agent_os TEXT,
                    agent_browser TEXT
                )
                "#
            ),
            create_expires_index: format!(
                "CREATE INDEX IF NOT EXISTS {} ON {t} (expires_at)",
                table.expires_index()
            ),
            insert: format!("INSERT INTO {t} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"),
            select_active_by_id: format!(
                "SELECT {COLUMNS} FROM {t} WHERE id = $1 AND expires_at > CURRENT_TIMESTAMP"
            ),
            select_by_user_key: format!("SELECT {COLUMNS} FROM {t} WHERE user_key = $1"),
            delete_by_id: format!("DELETE FROM {t} WHERE id = $1"),
            delete_by_user_key: format!("DELETE FROM {t} WHERE user_key = $1"),
            delete_by_user_key_except: format!(
                "DELETE FROM {t} WHERE user_key = $1 AND id <> ALL($2)"
            ),
            delete_expired: format!("DELETE FROM {t} WHERE expires_at < CURRENT_TIMESTAMP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(name: &str) -> Queries {
        Queries::new(&TableName::new(name).unwrap())
    }

    #[test]
    fn test_create_table_has_all_columns() {
        let q = queries("sessions");
        assert!(q.create_table.contains("CREATE TABLE IF NOT EXISTS sessions ("));
        for column in [
            "created_at TIMESTAMPTZ NOT NULL",
            "expires_at TIMESTAMPTZ NOT NULL",
            "id TEXT PRIMARY KEY",
            "user_key TEXT NOT NULL",
            "ip TEXT",
            "agent_os TEXT",
            "agent_browser TEXT",
        ] {
            assert!(q.create_table.contains(column), "missing {}", column);
        }
    }

    #[test]
    fn test_expires_index() {
        let q = queries("auth.sessions");
        assert_eq!(
            q.create_expires_index,
            "CREATE INDEX IF NOT EXISTS sessions_expires_at_idx ON auth.sessions (expires_at)"
        );
    }

    #[test]
    fn test_crud_statements() {
        let q = queries("sessions");
        assert_eq!(
            q.insert,
            "INSERT INTO sessions (created_at, expires_at, id, user_key, ip, agent_os, agent_browser) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
        assert_eq!(
            q.select_active_by_id,
            "SELECT created_at, expires_at, id, user_key, ip, agent_os, agent_browser \
             FROM sessions WHERE id = $1 AND expires_at > CURRENT_TIMESTAMP"
        );
        assert_eq!(
            q.select_by_user_key,
            "SELECT created_at, expires_at, id, user_key, ip, agent_os, agent_browser \
             FROM sessions WHERE user_key = $1"
        );
        assert_eq!(q.delete_by_id, "DELETE FROM sessions WHERE id = $1");
        assert_eq!(q.delete_by_user_key, "DELETE FROM sessions WHERE user_key = $1");
        assert_eq!(
            q.delete_by_user_key_except,
            "DELETE FROM sessions WHERE user_key = $1 AND id <> ALL($2)"
        );
        assert_eq!(
            q.delete_expired,
            "DELETE FROM sessions WHERE expires_at < CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_fetch_by_user_key_does_not_filter_expired() {
        let q = queries("sessions");
        assert!(!q.select_by_user_key.contains("expires_at >"));
    }
}
