//! Long-running sync loop that recognizes the trigger and answers it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::pipeline::RetrievalPipeline;
use crate::responder::respond;
use randcaps_channels::message_stream::{Credential, MessageStream, StreamEvent};
use randcaps_core::error::RandCapsError;
use randcaps_core::text::preview;
use randcaps_storage::handled::{call_blocking, HandledEventLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Authenticating,
    Syncing,
    HandlingEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored,
    AlreadyHandled,
    Replied { found: bool },
}

/// The one command the bot answers.
pub const TRIGGER: &str = "!randcaps";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub sync_timeout_ms: u64,
    pub retry_delay: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sync_timeout_ms: config.sync_timeout_ms,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Exact, case-sensitive prefix match. Anything after the trigger is ignored.
pub fn is_trigger(body: &str) -> bool {
    body.starts_with(TRIGGER)
}

pub struct SessionLoop<M: MessageStream> {
    stream: M,
    pipeline: RetrievalPipeline,
    ledger: Option<Arc<HandledEventLog>>,
    options: SessionOptions,
    rng: StdRng,
    state: SessionState,
    since: Option<String>,
}

impl<M: MessageStream> SessionLoop<M> {
    pub fn new(
        stream: M,
        pipeline: RetrievalPipeline,
        ledger: Option<Arc<HandledEventLog>>,
        options: SessionOptions,
    ) -> Self {
        Self {
            stream,
            pipeline,
            ledger,
            options,
            rng: StdRng::from_entropy(),
            state: SessionState::Disconnected,
            since: None,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }

    /// Disconnected -> Authenticating -> Syncing. Without a credential the
    /// session never leaves Disconnected.
    pub async fn connect(&mut self, credential: Option<&Credential>) -> Result<(), RandCapsError> {
        let Some(credential) = credential else {
            return Err(RandCapsError::Config(
                "MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN required".into(),
            ));
        };

        self.state = SessionState::Authenticating;
        if let Err(e) = self.stream.authenticate(credential).await {
            self.state = SessionState::Disconnected;
            return Err(match e {
                RandCapsError::Authentication(_) | RandCapsError::Config(_) => e,
                other => RandCapsError::Authentication(other.to_string()),
            });
        }

        info!(
            "Logged in as {} ({})",
            self.stream.user_id(),
            credential.kind()
        );
        self.state = SessionState::Syncing;
        Ok(())
    }

    /// Immediate sync without a position. The recent timeline it returns is
    /// dispatched like any other batch; triggers answered before a restart
    /// are skipped through the handled-event ledger.
    pub async fn bootstrap(&mut self) -> Result<usize, RandCapsError> {
        let batch = self.stream.sync(None, 0).await?;
        self.since = Some(batch.next_batch);
        let replied = self.dispatch(&batch.events).await;
        info!(
            "Initial sync complete, {} backlog events, {replied} replies",
            batch.events.len()
        );
        Ok(replied)
    }

    /// One long-poll round. Per-event failures are logged and dropped; only
    /// the sync itself can fail this call.
    pub async fn sync_once(&mut self) -> Result<usize, RandCapsError> {
        let batch = self
            .stream
            .sync(self.since.as_deref(), self.options.sync_timeout_ms)
            .await?;
        self.since = Some(batch.next_batch);
        Ok(self.dispatch(&batch.events).await)
    }

    async fn dispatch(&mut self, events: &[StreamEvent]) -> usize {
        let mut replied = 0;
        for event in events {
            match self.handle_event(event).await {
                Ok(EventOutcome::Replied { .. }) => replied += 1,
                Ok(_) => {}
                Err(e) => error!(
                    "Dropped {} in {}: {e}",
                    event.event_id.as_str(),
                    event.room_id.as_str()
                ),
            }
        }
        replied
    }

    pub async fn handle_event(&mut self, event: &StreamEvent) -> Result<EventOutcome, RandCapsError> {
        if !event.is_text_message()
            || event.sender == self.stream.user_id()
            || !is_trigger(&event.body)
        {
            return Ok(EventOutcome::Ignored);
        }

        if self.already_handled(&event.event_id).await {
            return Ok(EventOutcome::AlreadyHandled);
        }

        info!(
            "Command received in {} from {}: {}",
            event.room_id,
            event.sender,
            preview(&event.body, 100)
        );

        self.state = SessionState::HandlingEvent;
        let result = self.run_command(event).await;
        self.state = SessionState::Syncing;
        result
    }

    async fn run_command(&mut self, event: &StreamEvent) -> Result<EventOutcome, RandCapsError> {
        let choice = self.pipeline.pick(&mut self.rng).await?;
        respond(&self.stream, &event.room_id, choice.as_deref()).await?;
        self.mark_handled(event).await;
        Ok(EventOutcome::Replied {
            found: choice.is_some(),
        })
    }

    async fn already_handled(&self, event_id: &str) -> bool {
        let Some(ledger) = self.ledger.clone() else {
            return false;
        };
        let event_id = event_id.to_string();
        match call_blocking(ledger, move |log| log.is_handled(&event_id)).await {
            Ok(handled) => handled,
            Err(e) => {
                warn!("Handled-event lookup failed: {e}");
                false
            }
        }
    }

    async fn mark_handled(&self, event: &StreamEvent) {
        let Some(ledger) = self.ledger.clone() else {
            return;
        };
        let event_id = event.event_id.clone();
        let room_id = event.room_id.clone();
        if let Err(e) = call_blocking(ledger, move |log| log.mark_handled(&event_id, &room_id)).await
        {
            warn!("Failed to record handled event: {e}");
        }
    }

    /// Waits out the retry delay. Returns false if `shutdown` resolved first.
    async fn backoff<F>(&self, err: &RandCapsError, shutdown: Pin<&mut F>) -> bool
    where
        F: Future<Output = ()>,
    {
        warn!(
            "Sync error: {err}; retrying in {}s",
            self.options.retry_delay.as_secs_f32()
        );
        tokio::select! {
            _ = shutdown => false,
            _ = tokio::time::sleep(self.options.retry_delay) => true,
        }
    }

    /// Authenticate, bootstrap, then sync until `shutdown` resolves or a
    /// fatal error occurs.
    pub async fn run<F>(mut self, credential: Option<&Credential>, shutdown: F) -> Result<(), RandCapsError>
    where
        F: Future<Output = ()>,
    {
        self.connect(credential).await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested before initial sync");
                    self.state = SessionState::Disconnected;
                    return Ok(());
                }
                res = self.bootstrap() => match res {
                    Ok(_) => break,
                    Err(e) if e.is_fatal() => {
                        self.state = SessionState::Disconnected;
                        return Err(e);
                    }
                    Err(e) => {
                        if !self.backoff(&e, shutdown.as_mut()).await {
                            info!("Shutdown requested during retry delay");
                            self.state = SessionState::Disconnected;
                            return Ok(());
                        }
                    }
                }
            }
        }

        info!("Listening for {TRIGGER}");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving sync loop");
                    self.state = SessionState::Disconnected;
                    return Ok(());
                }
                res = self.sync_once() => match res {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => {
                        error!("Fatal sync error: {e}");
                        self.state = SessionState::Disconnected;
                        return Err(e);
                    }
                    Err(e) => {
                        if !self.backoff(&e, shutdown.as_mut()).await {
                            info!("Shutdown requested during retry delay");
                            self.state = SessionState::Disconnected;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
