//! Biometric control loop: a [`SampleSource`] feeding a [`BreathModel`].
//!
//! The host drives two timers. Its sampling timer calls
//! [`BiometricController::poll_once`] (or [`spawn_fetch`] +
//! [`ingest`] to keep the frame loop unblocked while a request is in
//! flight); its frame loop calls [`tick`] every simulation step.
//!
//! [`spawn_fetch`]: BiometricController::spawn_fetch
//! [`ingest`]: BiometricController::ingest
//! [`tick`]: BiometricController::tick

use std::sync::Arc;

use lumina_logic::breath::{BreathConfig, BreathModel, BreathSample};
use tokio::task::JoinHandle;

use crate::sampler::{fetch_sample, SampleSource};
use crate::session::FillDrive;

pub struct BiometricController<S: ?Sized> {
    source: Arc<S>,
    model: BreathModel,
    polls: u64,
    missed: u64,
}

impl<S> BiometricController<S>
where
    S: SampleSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, config: BreathConfig) -> Self {
        Self {
            source,
            model: BreathModel::new(config),
            polls: 0,
            missed: 0,
        }
    }

    /// One sampling-clock step: fetch every enabled metric and feed the
    /// model. Returns the normalized volume if a volume reading arrived.
    pub async fn poll_once(&mut self) -> Option<f32> {
        let sample = fetch_sample(self.source.as_ref(), self.model.config()).await;
        self.ingest(&sample)
    }

    /// Start a sampling round on the runtime without waiting for it.
    ///
    /// Feed the finished sample back through [`ingest`](Self::ingest).
    /// Dropping the handle abandons the request; it still ends at the
    /// source's own timeout.
    pub fn spawn_fetch(&self) -> JoinHandle<BreathSample> {
        let source = Arc::clone(&self.source);
        let config = self.model.config().clone();
        tokio::spawn(async move { fetch_sample(source.as_ref(), &config).await })
    }

    /// Apply a fetched sample to the model.
    pub fn ingest(&mut self, sample: &BreathSample) -> Option<f32> {
        self.polls += 1;
        let norm = self.model.ingest(sample);
        if norm.is_none() {
            self.missed += 1;
            log::debug!("Breath poll {} had no volume; keeping last state", self.polls);
        }
        norm
    }

    /// One smoothing-clock step.
    pub fn tick(&mut self, dt: f32) {
        self.model.tick(dt);
    }

    pub fn multiplier(&self) -> f32 {
        self.model.multiplier()
    }

    pub fn is_gate_open(&self) -> bool {
        self.model.is_gate_open()
    }

    /// Current outputs bundled for a [`PaintSession`](crate::session::PaintSession).
    pub fn drive(&self) -> FillDrive {
        FillDrive {
            multiplier: self.multiplier(),
            gate_open: self.is_gate_open(),
        }
    }

    pub fn model(&self) -> &BreathModel {
        &self.model
    }

    /// Polls attempted and polls that produced no volume.
    pub fn poll_counts(&self) -> (u64, u64) {
        (self.polls, self.missed)
    }
}
