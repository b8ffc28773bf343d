//! Session orchestration
//!
//! A `Session` owns one processing pipeline for its whole lifetime and
//! drives the connection lifecycle around it:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected
//!                                  |
//!                             (Calibrating)
//! ```
//!
//! All methods take `&self`. State sits behind a lock that is never held
//! across an await, so a calibration can run while the ingestion side keeps
//! calling `process_signal` on the same session. Samples must still arrive
//! from a single ingestion loop, in order.

use crate::baseline::{BaselineAccumulator, CalibrationBaseline};
use crate::catalog::AdaptationCatalog;
use crate::config::PipelineConfig;
use crate::device::DeviceLink;
use crate::error::NeuroError;
use crate::pipeline::NeuroProcessor;
use crate::types::{
    AdaptationEvent, AdaptationProfile, ConnectionState, DeviceInfo, DeviceKind, MetricVector,
    Sample, SignalFrame,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct SessionInner {
    state: ConnectionState,
    /// Bumped on every connect attempt and disconnect; in-flight async work
    /// compares it to detect that the connection it started on is gone.
    generation: u64,
    device_info: Option<DeviceInfo>,
    processor: NeuroProcessor,
    baseline: Option<CalibrationBaseline>,
    last_error: Option<String>,
    calibrating: bool,
}

/// One user's neuro-adaptive session
pub struct Session {
    id: Uuid,
    link: Box<dyn DeviceLink>,
    calibration_interval: Duration,
    inner: RwLock<SessionInner>,
    status: watch::Sender<ConnectionState>,
}

/// Clears the calibrating flag however the calibration future ends
struct CalibrationGuard<'a> {
    inner: &'a RwLock<SessionInner>,
}

impl Drop for CalibrationGuard<'_> {
    fn drop(&mut self) {
        self.inner.write().calibrating = false;
    }
}

/// Rolls a pending connect back to `Disconnected` if its future is dropped
/// before the link answers
struct ConnectGuard<'a> {
    session: &'a Session,
    generation: u64,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.inner.write();
        if inner.state == ConnectionState::Connecting && inner.generation == self.generation {
            self.session
                .set_state(&mut inner, ConnectionState::Disconnected);
            warn!(session = %self.session.id, "connect abandoned before the device answered");
        }
    }
}

impl Session {
    /// Create a disconnected session with default configuration
    pub fn new(link: impl DeviceLink + 'static) -> Self {
        Self::build(NeuroProcessor::new(), link)
    }

    /// Create a disconnected session from a validated configuration
    pub fn with_config(
        config: PipelineConfig,
        link: impl DeviceLink + 'static,
    ) -> Result<Self, NeuroError> {
        Ok(Self::build(NeuroProcessor::with_config(config)?, link))
    }

    /// Create a disconnected session with a custom catalog
    pub fn with_catalog(
        config: PipelineConfig,
        catalog: AdaptationCatalog,
        link: impl DeviceLink + 'static,
    ) -> Result<Self, NeuroError> {
        Ok(Self::build(NeuroProcessor::with_catalog(config, catalog)?, link))
    }

    fn build(processor: NeuroProcessor, link: impl DeviceLink + 'static) -> Self {
        let calibration_interval =
            Duration::from_millis(processor.config().calibration_interval_ms);
        let (status, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            id: Uuid::new_v4(),
            link: Box::new(link),
            calibration_interval,
            inner: RwLock::new(SessionInner {
                state: ConnectionState::Disconnected,
                generation: 0,
                device_info: None,
                processor,
                baseline: None,
                last_error: None,
                calibrating: false,
            }),
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Open a device through the link and attach a fresh pipeline.
    ///
    /// A failed attempt returns the session to `Disconnected` with the error
    /// retained in `last_error`; the session can be connected again. Dropping
    /// the returned future mid-attempt also rolls back to `Disconnected`.
    pub async fn connect(&self, kind: DeviceKind) -> Result<DeviceInfo, NeuroError> {
        let generation = {
            let mut inner = self.inner.write();
            if inner.state != ConnectionState::Disconnected {
                return Err(NeuroError::AlreadyConnected);
            }
            inner.generation += 1;
            inner.last_error = None;
            self.set_state(&mut inner, ConnectionState::Connecting);
            inner.generation
        };
        info!(session = %self.id, kind = kind.as_str(), "connecting");

        let mut guard = ConnectGuard {
            session: self,
            generation,
            armed: true,
        };
        let opened = self.link.open(kind).await;
        guard.armed = false;

        let outcome = {
            let mut inner = self.inner.write();
            if inner.state != ConnectionState::Connecting || inner.generation != generation {
                Err(NeuroError::ConnectionCancelled)
            } else {
                match opened {
                    Ok(info) => {
                        inner.processor.reset_signal_state();
                        inner.device_info = Some(info.clone());
                        self.set_state(&mut inner, ConnectionState::Connected);
                        Ok(info)
                    }
                    Err(e) => {
                        inner.last_error = Some(e.to_string());
                        self.set_state(&mut inner, ConnectionState::Disconnected);
                        Err(e)
                    }
                }
            }
        };

        match &outcome {
            Ok(info) => {
                info!(
                    session = %self.id,
                    device = %info.name,
                    channels = info.channel_count,
                    "connected"
                );
            }
            Err(NeuroError::ConnectionCancelled) => {
                warn!(session = %self.id, "connect cancelled by disconnect");
                self.link.close().await;
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "connection failed");
            }
        }

        outcome
    }

    /// Detach from the device and reset all per-band signal state.
    ///
    /// Any in-flight calibration settles with `CalibrationInterrupted`, and
    /// further samples are rejected until the next `connect`.
    pub async fn disconnect(&self) {
        let previous = {
            let mut inner = self.inner.write();
            let previous = inner.state;
            if previous == ConnectionState::Disconnected {
                return;
            }
            inner.generation += 1;
            inner.device_info = None;
            inner.processor.reset_signal_state();
            self.set_state(&mut inner, ConnectionState::Disconnected);
            previous
        };

        if previous == ConnectionState::Connected {
            self.link.close().await;
        }
        info!(session = %self.id, "disconnected");
    }

    /// Update the state and publish it while the write guard is held, so
    /// watchers see transitions in the order they were applied.
    fn set_state(&self, inner: &mut SessionInner, state: ConnectionState) {
        inner.state = state;
        self.status.send_replace(state);
    }

    /// Run one sample through the pipeline and return the new metrics
    pub fn process_signal(&self, sample: &Sample) -> Result<MetricVector, NeuroError> {
        self.process_frame(sample).map(|frame| frame.metrics)
    }

    /// Like `process_signal`, returning the full pipeline output
    pub fn process_frame(&self, sample: &Sample) -> Result<SignalFrame, NeuroError> {
        let mut inner = self.inner.write();
        if inner.state != ConnectionState::Connected {
            return Err(NeuroError::NotConnected);
        }
        Ok(inner.processor.process(sample))
    }

    /// Average the current metrics over `duration`, polling at the
    /// configured interval, and store the result as the session baseline.
    ///
    /// Samples must keep flowing through `process_signal` meanwhile. A
    /// disconnect during the window rejects with `CalibrationInterrupted`
    /// and leaves the previous baseline in place.
    pub async fn calibrate_baseline(
        &self,
        duration: Duration,
    ) -> Result<CalibrationBaseline, NeuroError> {
        let generation = {
            let mut inner = self.inner.write();
            if inner.state != ConnectionState::Connected {
                return Err(NeuroError::NotConnected);
            }
            if inner.calibrating {
                return Err(NeuroError::CalibrationInProgress);
            }
            inner.calibrating = true;
            inner.generation
        };
        let _guard = CalibrationGuard { inner: &self.inner };
        info!(session = %self.id, duration_ms = duration.as_millis() as u64, "calibration started");

        let mut status_rx = self.status.subscribe();
        let mut ticker = tokio::time::interval(self.calibration_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = Instant::now() + duration;
        let mut accumulator = BaselineAccumulator::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let metrics = {
                        let inner = self.inner.read();
                        if inner.state != ConnectionState::Connected || inner.generation != generation {
                            None
                        } else {
                            Some(inner.processor.current_metrics())
                        }
                    };
                    match metrics {
                        Some(metrics) => accumulator.add(&metrics),
                        None => return Err(self.interrupted(&accumulator)),
                    }
                    if Instant::now() >= deadline {
                        break;
                    }
                }
                changed = status_rx.changed() => {
                    // never take the session lock while borrowing the watch
                    let still_connected = changed.is_ok() && {
                        let inner = self.inner.read();
                        inner.state == ConnectionState::Connected && inner.generation == generation
                    };
                    if !still_connected {
                        return Err(self.interrupted(&accumulator));
                    }
                }
            }
        }

        let baseline = accumulator
            .finish(Utc::now())
            .ok_or(NeuroError::CalibrationInterrupted { collected: 0 })?;

        {
            let mut inner = self.inner.write();
            if inner.generation != generation {
                return Err(self.interrupted(&accumulator));
            }
            inner.baseline = Some(baseline.clone());
        }
        info!(
            session = %self.id,
            readings = baseline.sample_count,
            "calibration finished"
        );
        Ok(baseline)
    }

    fn interrupted(&self, accumulator: &BaselineAccumulator) -> NeuroError {
        warn!(
            session = %self.id,
            collected = accumulator.count(),
            "calibration interrupted by disconnect"
        );
        NeuroError::CalibrationInterrupted {
            collected: accumulator.count(),
        }
    }

    /// Report how well a profile's adaptation worked (0-1). Unknown ids are
    /// ignored. Returns the profile's new confidence when it changed.
    pub fn provide_feedback(&self, profile_id: &str, effectiveness: f64) -> Option<f64> {
        let updated = self
            .inner
            .write()
            .processor
            .provide_feedback(profile_id, effectiveness);
        if updated.is_none() {
            debug!(session = %self.id, profile_id, "feedback ignored");
        }
        updated
    }

    pub fn current_metrics(&self) -> MetricVector {
        self.inner.read().processor.current_metrics()
    }

    pub fn current_adaptation(&self) -> Option<AdaptationProfile> {
        self.inner.read().processor.current_adaptation().cloned()
    }

    /// Oldest-first snapshot of recent adaptation events
    pub fn adaptation_history(&self) -> Vec<AdaptationEvent> {
        self.inner.read().processor.history().snapshot()
    }

    /// Snapshot of the catalog with current confidences
    pub fn catalog(&self) -> AdaptationCatalog {
        self.inner.read().processor.catalog().clone()
    }

    pub fn status(&self) -> ConnectionState {
        self.inner.read().state
    }

    /// Receiver that observes every lifecycle transition
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.subscribe()
    }

    pub fn is_calibrating(&self) -> bool {
        self.inner.read().calibrating
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.read().device_info.clone()
    }

    /// Most recent completed calibration
    pub fn baseline(&self) -> Option<CalibrationBaseline> {
        self.inner.read().baseline.clone()
    }

    /// Error message from the last failed connect, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }
}
