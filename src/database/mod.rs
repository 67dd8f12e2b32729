use sqlx::Executor;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::{AppEnv, Config};

/// Builds the Postgres pool. Test runs create and select their own schema on
/// every new connection so parallel suites never share tables.
pub async fn connect_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let isolate = config.app_env == AppEnv::Test;
    let schema = config.db_schema();

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .after_connect(move |conn, _meta| {
            let schema = schema.clone();
            Box::pin(async move {
                conn.execute("SET application_name = 'carboncity';").await?;
                if isolate {
                    conn.execute(format!("CREATE SCHEMA IF NOT EXISTS {};", schema).as_str())
                        .await?;
                    conn.execute(format!("SET search_path TO {};", schema).as_str())
                        .await?;
                }
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        "Connected to Postgres (max {} connections, schema {})",
        config.db_max_connections,
        config.db_schema()
    );
    Ok(pool)
}
