//! Session store implementations for Loopwright.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use loopwright_config::StoreConfig;
use loopwright_core::error::SessionError;
use loopwright_core::session::SessionStore;

pub use in_memory::InMemorySessionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

/// Open the backend named in `config`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SessionStore>, SessionError> {
    match config.backend.as_str() {
        "in_memory" | "memory" => Ok(Arc::new(InMemorySessionStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SessionError::Storage(format!("Cannot create {}: {e}", parent.display()))
                    })?;
                }
            }
            Ok(Arc::new(SqliteSessionStore::new(&config.path).await?))
        }
        other => Err(SessionError::Storage(format!("Unknown store backend '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_in_memory_backend() {
        let config = StoreConfig {
            backend: "in_memory".into(),
            path: String::new(),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[tokio::test]
    async fn opens_sqlite_backend_creating_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let config = StoreConfig {
            backend: "sqlite".into(),
            path: path.to_string_lossy().into_owned(),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = StoreConfig {
            backend: "postgres".into(),
            path: String::new(),
        };
        assert!(matches!(
            open_store(&config).await,
            Err(SessionError::Storage(_))
        ));
    }
}
