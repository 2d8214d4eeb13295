use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::RateRequest;
use crate::engine::{QuoteFailure, RateEngine, RateQuoteResult};

/// Result of a quote run through a [`QuoteSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Completed(Result<RateQuoteResult, QuoteFailure>),
    /// A newer quote started before this one finished; its result was dropped.
    Superseded { generation: u64 },
}

/// Generation gate for one shopper's quotes.
///
/// Every call to [`quote`](Self::quote) takes a new generation. Starting a
/// newer generation cancels the in-flight future of the older one, so a stale
/// carrier response can never be reported as current.
pub struct QuoteSession {
    engine: Arc<RateEngine>,
    latest: watch::Sender<u64>,
}

impl QuoteSession {
    pub fn new(engine: Arc<RateEngine>) -> Self {
        let (latest, _) = watch::channel(0);
        Self { engine, latest }
    }

    pub fn current_generation(&self) -> u64 {
        *self.latest.borrow()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.latest.send_modify(|latest| {
            *latest += 1;
            generation = *latest;
        });
        generation
    }

    pub async fn quote(&self, request: &RateRequest) -> QuoteOutcome {
        let generation = self.begin();
        let mut latest = self.latest.subscribe();

        tokio::select! {
            biased;
            () = superseded(&mut latest, generation) => {
                debug!(generation, "quote superseded, in-flight carrier calls dropped");
                QuoteOutcome::Superseded { generation }
            }
            outcome = self.engine.quote(request) => {
                if self.is_current(generation) {
                    QuoteOutcome::Completed(outcome)
                } else {
                    debug!(generation, "discarding stale quote result");
                    QuoteOutcome::Superseded { generation }
                }
            }
        }
    }
}

async fn superseded(latest: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *latest.borrow_and_update() > generation {
            return;
        }
        if latest.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
