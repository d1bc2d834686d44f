use crate::StoreOpts;
use anyhow::Context;
use cdr_store::{surreal_connect, CdrStore, SurrealOpts, SurrealStore};
use std::sync::Arc;

/// Connect to SurrealDB and open the CDR table.
pub async fn open_store(opts: &StoreOpts) -> anyhow::Result<Arc<dyn CdrStore>> {
    let client = surreal_connect(&SurrealOpts::from(opts))
        .await
        .context("Failed to open CDR store")?;
    tracing::info!(
        "Using SurrealDB table '{}' at {} ({}/{})",
        opts.table,
        opts.surreal_endpoint,
        opts.namespace,
        opts.database
    );
    Ok(Arc::new(SurrealStore::new(client, opts.table.clone())))
}
