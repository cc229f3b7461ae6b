//! Sample, filter, select: one run of the trigger command.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::candidate_filter::filter_candidates;
use crate::selector::select;
use randcaps_core::error::RandCapsError;
use randcaps_core::text::preview;
use randcaps_storage::corpus::{CorpusStore, SampleQuery};

pub struct RetrievalPipeline {
    store: Arc<dyn CorpusStore>,
    query: SampleQuery,
}

impl RetrievalPipeline {
    pub fn new(store: Arc<dyn CorpusStore>, blocklist: &[String], sample_size: u32) -> Self {
        Self {
            store,
            query: SampleQuery::screaming(blocklist, sample_size),
        }
    }

    /// `Ok(None)` means the sample held no eligible body. A store failure is
    /// an error, never a `None`.
    pub async fn pick<R: Rng + ?Sized + Send>(
        &self,
        rng: &mut R,
    ) -> Result<Option<String>, RandCapsError> {
        let sampled = self.store.sample(&self.query).await?;
        let candidates = filter_candidates(&sampled);
        debug!(
            "{} of {} sampled messages eligible",
            candidates.len(),
            sampled.len()
        );

        let choice = select(&candidates, rng).map(ToOwned::to_owned);
        match &choice {
            Some(body) => info!("Selected: {}", preview(body, 80)),
            None => info!("No candidates found after filtering"),
        }
        Ok(choice)
    }
}
