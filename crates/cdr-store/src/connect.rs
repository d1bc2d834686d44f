use std::time::Duration;

/// SurrealDB connection options
#[derive(Clone, Debug)]
pub struct SurrealOpts {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
}

impl SurrealOpts {
    /// Embedded engines need no authentication.
    fn is_embedded(&self) -> bool {
        self.endpoint.starts_with("mem://")
    }
}

const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub async fn surreal_connect(
    opts: &SurrealOpts,
) -> anyhow::Result<surrealdb::Surreal<surrealdb::engine::any::Any>> {
    surreal_connect_with_retries(opts, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY).await
}

/// Connect to SurrealDB, retrying transient failures.
///
/// Waits `retry_delay` between attempts, up to `max_retries` attempts in total.
pub async fn surreal_connect_with_retries(
    opts: &SurrealOpts,
    max_retries: u32,
    retry_delay: Duration,
) -> anyhow::Result<surrealdb::Surreal<surrealdb::engine::any::Any>> {
    let endpoint = opts
        .endpoint
        .replace("http://", "ws://")
        .replace("https://", "wss://");

    tracing::debug!(
        "Connecting to SurrealDB at {} (namespace: {}, database: {})",
        endpoint,
        opts.namespace,
        opts.database
    );

    let mut last_error = None;
    for attempt in 1..=max_retries.max(1) {
        match try_connect(&endpoint, opts).await {
            Ok(surreal) => {
                if attempt > 1 {
                    tracing::info!("Connected to SurrealDB after {attempt} attempts");
                }
                return Ok(surreal);
            }
            Err(e) => {
                if attempt < max_retries {
                    tracing::warn!(
                        "Failed to connect to SurrealDB at '{endpoint}' (attempt {attempt}/{max_retries}): {e}. Retrying in {retry_delay:?}..."
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.context(format!(
            "Failed to connect to SurrealDB at '{endpoint}' after {max_retries} attempts"
        ))),
        None => Err(anyhow::anyhow!(
            "Failed to connect to SurrealDB at '{endpoint}'"
        )),
    }
}

async fn try_connect(
    endpoint: &str,
    opts: &SurrealOpts,
) -> anyhow::Result<surrealdb::Surreal<surrealdb::engine::any::Any>> {
    let surreal = surrealdb::engine::any::connect(endpoint)
        .await
        .map_err(|e| anyhow::anyhow!("SurrealDB connection to '{endpoint}' failed: {e}"))?;

    if !opts.is_embedded() {
        let username = &opts.username;
        surreal
            .signin(surrealdb::opt::auth::Root {
                username,
                password: &opts.password,
            })
            .await
            .map_err(|e| {
                anyhow::anyhow!("SurrealDB authentication failed (user: '{username}'): {e}")
            })?;
    }

    let (ns, db) = (&opts.namespace, &opts.database);
    surreal.use_ns(ns).use_db(db).await.map_err(|e| {
        anyhow::anyhow!("SurrealDB failed to select namespace '{ns}' / database '{db}': {e}")
    })?;

    Ok(surreal)
}
