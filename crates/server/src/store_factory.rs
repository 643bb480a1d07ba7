use std::sync::Arc;

use hololith_store::Repository;
use hololith_store_memory::MemoryRepository;
#[cfg(feature = "postgres")]
use hololith_store_postgres::{PostgresConfig, PostgresRepository};

use crate::config::StoreConfig;
use crate::error::ServerError;

/// Construct the configured repository backend.
///
/// Backends that keep a schema run their migrations as part of construction.
pub async fn create_repository(config: &StoreConfig) -> Result<Arc<dyn Repository>, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryRepository::new())),
        #[cfg(feature = "postgres")]
        "postgres" => create_postgres(config).await,
        other => Err(ServerError::Config(format!(
            "unsupported store backend: {other} (is the feature enabled?)"
        ))),
    }
}

#[cfg(feature = "postgres")]
async fn create_postgres(config: &StoreConfig) -> Result<Arc<dyn Repository>, ServerError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| ServerError::Config("postgres backend requires 'url' in [store]".into()))?;
    let pg_config = PostgresConfig {
        url: url.to_owned(),
        pool_size: config.pool_size,
        schema: config.schema.clone(),
        table_prefix: config.table_prefix.clone(),
    };
    let repo = PostgresRepository::new(pg_config)
        .await
        .map_err(|e| ServerError::Config(format!("postgres store: {e}")))?;
    Ok(Arc::new(repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_is_built() {
        let repo = create_repository(&StoreConfig::default()).await.unwrap();
        assert!(repo.ping().await.is_ok());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn postgres_requires_feature() {
        let config = StoreConfig {
            backend: "postgres".into(),
            url: Some("postgres://localhost/hololith".into()),
            ..StoreConfig::default()
        };
        let Err(err) = create_repository(&config).await else {
            panic!("expected a configuration error");
        };
        assert!(err.to_string().contains("is the feature enabled"));
    }
}
