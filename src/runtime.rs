use std::sync::Arc;

use tracing::info;

use crate::channels::MatrixClient;
use crate::config::Config;
use crate::pipeline::RetrievalPipeline;
use crate::session::{SessionLoop, SessionOptions};
use crate::signal::shutdown_signal;
use randcaps_storage::corpus::MongoCorpusStore;
use randcaps_storage::handled::HandledEventLog;

/// Wire the corpus, ledger and Matrix session, then run until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let credential = config.credential();

    let store = MongoCorpusStore::connect(
        &config.mongodb_uri,
        &config.mongodb_db,
        &config.events_collection,
    )
    .await?;
    let blocklist = config.blocklist_with_self();
    info!(
        "Corpus: {}.{} (sample size {}, {} blocked senders)",
        config.mongodb_db,
        config.events_collection,
        config.sample_size,
        blocklist.len()
    );
    let pipeline = RetrievalPipeline::new(Arc::new(store), &blocklist, config.sample_size);

    let ledger = Arc::new(HandledEventLog::new(&config.data_dir)?);
    let client = MatrixClient::from_config(&config);

    let session = SessionLoop::new(
        client,
        pipeline,
        Some(ledger),
        SessionOptions::from_config(&config),
    );
    session.run(credential.as_ref(), shutdown_signal()).await?;

    info!("Session ended");
    Ok(())
}
