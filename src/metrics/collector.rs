use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::page::{EntryStream, NavigationTiming, PageProbe, PerformanceEntry};

use super::rules::MetricRule;
use super::types::{Confidence, MetricKind, MetricSample};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Init,
    Observing,
    Resolved,
    Fallback,
    Done,
}

/// One bounded observation of a single metric.
///
/// The first resolution wins, whichever path produced it; afterwards entries,
/// load transitions and timers are ignored and the settled sample is returned.
pub struct MetricCollector<R: MetricRule> {
    rule: R,
    timeout: Duration,
    state: CollectorState,
    loaded: bool,
    sample: Option<MetricSample>,
}

impl<R: MetricRule> MetricCollector<R> {
    pub fn new(rule: R, timeout: Duration) -> Self {
        Self {
            rule,
            timeout,
            state: CollectorState::Init,
            loaded: false,
            sample: None,
        }
    }

    pub fn kind(&self) -> MetricKind {
        R::KIND
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// INIT → OBSERVING.
    pub fn begin(&mut self, loaded: bool) {
        if self.state == CollectorState::Init {
            self.state = CollectorState::Observing;
            self.loaded = loaded;
        }
    }

    pub fn on_entry(&mut self, entry: &PerformanceEntry) -> Option<MetricSample> {
        if self.state != CollectorState::Observing || entry.kind() != R::KIND {
            return None;
        }
        let value = self.rule.record(entry, self.loaded)?;
        Some(self.settle(value, Confidence::Measured))
    }

    pub fn on_load(&mut self) -> Option<MetricSample> {
        if self.state != CollectorState::Observing || self.loaded {
            return None;
        }
        self.loaded = true;
        let value = self.rule.load_completed()?;
        Some(self.settle(value, Confidence::Measured))
    }

    /// Timeout or aggregator ceiling fired.
    pub fn on_expired(&mut self, timing: Option<&NavigationTiming>) -> MetricSample {
        let (value, confidence) = self.rule.expire(timing);
        self.settle(value, confidence)
    }

    /// Observation is unsupported or the stream failed.
    pub fn on_failure(&mut self, timing: Option<&NavigationTiming>) -> MetricSample {
        let value = self.rule.fallback(timing);
        self.settle(value, Confidence::Fallback)
    }

    /// Any state → DONE.
    pub fn finish(&mut self) {
        self.state = CollectorState::Done;
    }

    fn settle(&mut self, value: f64, confidence: Confidence) -> MetricSample {
        if let Some(sample) = &self.sample {
            return sample.clone();
        }

        let sample = MetricSample::new(R::KIND, value, confidence);
        self.state = match confidence {
            Confidence::Measured => CollectorState::Resolved,
            Confidence::Fallback => CollectorState::Fallback,
        };
        self.sample = Some(sample.clone());
        sample
    }

    /// Observe `page` until the metric resolves, its timeout elapses, or
    /// `deadline` fires. `cancel` aborts the observation without a sample.
    ///
    /// The subscription and the timer are owned by this call and are released
    /// on every return path.
    pub async fn run(
        mut self,
        page: &dyn PageProbe,
        deadline: &CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<MetricSample, AnalysisError> {
        let kind = R::KIND;
        let mut load_rx = page.load_state();
        let loaded = *load_rx.borrow_and_update();

        let stream = match page.observe(kind) {
            Ok(stream) => stream,
            Err(err) => {
                log_warn!("{kind} collector falling back: {err}");
                let sample = self.on_failure(page.navigation_timing().as_ref());
                self.finish();
                return Ok(sample);
            }
        };

        self.begin(loaded);
        let outcome = self
            .observe(stream, &mut load_rx, page, deadline, cancel)
            .await;
        self.finish();

        if let Ok(sample) = &outcome {
            log_debug!(
                "{kind} collector done: {:.3} ({:?})",
                sample.value,
                sample.confidence
            );
        }
        outcome
    }

    async fn observe(
        &mut self,
        mut stream: EntryStream,
        load_rx: &mut tokio::sync::watch::Receiver<bool>,
        page: &dyn PageProbe,
        deadline: &CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<MetricSample, AnalysisError> {
        let kind = R::KIND;
        let timer = tokio::time::sleep(self.timeout);
        tokio::pin!(timer);

        let mut stream_open = true;
        let mut load_watch_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Err(AnalysisError::Cancelled(format!("{kind} collection")));
                }
                received = stream.recv(), if stream_open => match received {
                    Some(Ok(entry)) => {
                        if let Some(sample) = self.on_entry(&entry) {
                            return Ok(sample);
                        }
                    }
                    Some(Err(err)) => {
                        log_warn!("{kind} observer raised an error, using fallback: {err}");
                        return Ok(self.on_failure(page.navigation_timing().as_ref()));
                    }
                    None => {
                        log_debug!("{kind} stream closed by the page");
                        stream_open = false;
                    }
                },
                changed = load_rx.changed(), if load_watch_open && !self.loaded => {
                    if changed.is_err() {
                        load_watch_open = false;
                    } else if *load_rx.borrow_and_update() {
                        if let Some(sample) = self.on_load() {
                            return Ok(sample);
                        }
                    }
                }
                _ = &mut timer => {
                    return Ok(self.on_expired(page.navigation_timing().as_ref()));
                }
                _ = deadline.cancelled() => {
                    log_debug!("{kind} collector cut short by the aggregator ceiling");
                    return Ok(self.on_expired(page.navigation_timing().as_ref()));
                }
            }
        }
    }
}
