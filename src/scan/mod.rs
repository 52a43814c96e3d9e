//! Scan orchestrator — image → request → inference → parse → (save).
//!
//! State machine:
//!
//!   Idle ──scan──▶ Scanning ──ok──▶ ResultReady ──confirm_save / discard──▶ Idle
//!                     │  ▲
//!                   error └──retry── Failed ──dismiss──▶ Idle
//!
//! One scan may be in flight at a time; a second start is rejected.
//! Dropping a `scan`/`retry` future cancels it and returns to `Idle`. The
//! state lock is never held across an await or a store write. Observers subscribe to a
//! `watch` channel of `ScanStatus` snapshots.

mod state;

pub use state::{ScanState, ScanStatus};

use crate::config::AppConfig;
use crate::error::ScanError;
use crate::llm::{self, AnalysisProfile, DetectionResult, InferenceClient};
use crate::preferences::Preferences;
use crate::store::{RecordId, RecordStore, ScanRecord};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Per-session analysis settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub profile: AnalysisProfile,
    pub model: String,
    /// Hard bound on the inference call; the call is abandoned past it.
    pub wait: Duration,
}

impl ScanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            profile: config.profile,
            model: config.model.clone(),
            wait: config.wait(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

struct Inner {
    state: ScanState,
    /// Bumped on every scan start so a cancelled run can't publish late.
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

pub struct ScanOrchestrator<C, S> {
    client: C,
    store: S,
    settings: ScanSettings,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<ScanStatus>,
    preferences: Mutex<Preferences>,
    preferences_path: Option<PathBuf>,
}

impl<C: InferenceClient, S: RecordStore> ScanOrchestrator<C, S> {
    pub fn new(client: C, store: S, settings: ScanSettings) -> Self {
        let (status_tx, _) = watch::channel(ScanStatus::Idle);
        Self {
            client,
            store,
            settings,
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                generation: 0,
                cancel: None,
            }),
            status_tx,
            preferences: Mutex::new(Preferences::default()),
            preferences_path: None,
        }
    }

    /// Back the onboarding flag with a preferences file, read once here.
    pub fn with_preferences(mut self, path: PathBuf) -> Self {
        self.preferences = Mutex::new(Preferences::load(&path));
        self.preferences_path = Some(path);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive a snapshot on every transition.
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> ScanStatus {
        self.lock().state.status()
    }

    /// Source image of the current cycle, if any.
    pub fn current_image(&self) -> Option<Arc<DynamicImage>> {
        self.lock().state.image().cloned()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a scan. Allowed from any state except `Scanning`; a previous
    /// result or error is implicitly dismissed.
    pub async fn scan(&self, image: DynamicImage) -> Result<DetectionResult, ScanError> {
        let image = Arc::new(image);
        let (generation, cancel_rx) = {
            let mut inner = self.lock();
            if matches!(inner.state, ScanState::Scanning { .. }) {
                log::warn!("[SCAN] Rejected start: scan already in flight");
                return Err(ScanError::ScanInProgress);
            }
            self.begin(&mut inner, image.clone())
        };
        self.run(image, generation, cancel_rx).await
    }

    /// Re-run the pipeline with the image that just failed.
    pub async fn retry(&self) -> Result<DetectionResult, ScanError> {
        let (image, generation, cancel_rx) = {
            let mut inner = self.lock();
            let image = match &inner.state {
                ScanState::Failed { image, .. } => image.clone(),
                other => {
                    return Err(ScanError::InvalidTransition {
                        action: "retry",
                        state: other.name(),
                    })
                }
            };
            let (generation, rx) = self.begin(&mut inner, image.clone());
            (image, generation, rx)
        };
        log::info!("[SCAN] Retrying");
        self.run(image, generation, cancel_rx).await
    }

    /// Persist the ready result, then return to `Idle`.
    ///
    /// If the store fails the result stays in place so saving can be retried.
    pub fn confirm_save(&self) -> Result<RecordId, ScanError> {
        let (result, jpeg, generation) = {
            let inner = self.lock();
            match &inner.state {
                ScanState::ResultReady { result, jpeg, .. } => {
                    (result.clone(), jpeg.clone(), inner.generation)
                }
                other => {
                    return Err(ScanError::InvalidTransition {
                        action: "save",
                        state: other.name(),
                    })
                }
            }
        };

        // The state lock is released for the disk write.
        let id = self.store.save(&result, Some(jpeg.as_slice())).map_err(|e| {
            log::error!("[SCAN] Save failed, keeping result: {}", e);
            e
        })?;
        log::info!("[SCAN] Saved scan {}", id);

        let mut inner = self.lock();
        if inner.generation == generation && matches!(inner.state, ScanState::ResultReady { .. }) {
            self.transition(&mut inner, ScanState::Idle);
        }
        Ok(id)
    }

    /// Drop the ready result and its image.
    pub fn discard(&self) -> Result<(), ScanError> {
        let mut inner = self.lock();
        if !matches!(inner.state, ScanState::ResultReady { .. }) {
            return Err(ScanError::InvalidTransition {
                action: "discard",
                state: inner.state.name(),
            });
        }
        self.transition(&mut inner, ScanState::Idle);
        Ok(())
    }

    /// Acknowledge a failure and drop its image.
    pub fn dismiss(&self) -> Result<(), ScanError> {
        let mut inner = self.lock();
        if !matches!(inner.state, ScanState::Failed { .. }) {
            return Err(ScanError::InvalidTransition {
                action: "dismiss",
                state: inner.state.name(),
            });
        }
        self.transition(&mut inner, ScanState::Idle);
        Ok(())
    }

    /// Abort an in-flight scan and return to `Idle`. Returns false if
    /// nothing was scanning.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if !matches!(inner.state, ScanState::Scanning { .. }) {
            return false;
        }
        if let Some(tx) = inner.cancel.take() {
            let _ = tx.send(());
        }
        inner.generation += 1;
        log::info!("[SCAN] Cancelled");
        self.transition(&mut inner, ScanState::Idle);
        true
    }

    // ── History ──────────────────────────────────────────────────────

    pub fn history(&self) -> Result<Vec<ScanRecord>, ScanError> {
        self.store.list()
    }

    pub fn delete(&self, ids: &HashSet<RecordId>) -> Result<(), ScanError> {
        self.store.delete(ids)
    }

    // ── Onboarding ───────────────────────────────────────────────────

    pub fn needs_onboarding(&self) -> bool {
        !self
            .preferences
            .lock()
            .map(|p| p.has_seen_onboarding)
            .unwrap_or(false)
    }

    pub fn complete_onboarding(&self) -> Result<(), String> {
        let mut prefs = self.preferences.lock().map_err(|e| e.to_string())?;
        if prefs.has_seen_onboarding {
            return Ok(());
        }
        prefs.has_seen_onboarding = true;
        if let Some(path) = &self.preferences_path {
            prefs.save(path)?;
        }
        log::info!("[SCAN] Onboarding complete");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn begin(&self, inner: &mut Inner, image: Arc<DynamicImage>) -> (u64, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        inner.generation += 1;
        inner.cancel = Some(tx);
        self.transition(inner, ScanState::Scanning { image });
        (inner.generation, rx)
    }

    async fn run(
        &self,
        image: Arc<DynamicImage>,
        generation: u64,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<DetectionResult, ScanError> {
        // Declared before `inner` below so it drops after the lock is released.
        let _abandon = AbandonGuard {
            orchestrator: self,
            generation,
        };
        let start = std::time::Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel_rx => Err(ScanError::Cancelled),
            r = self.pipeline(&image) => r,
        };

        let mut inner = self.lock();
        if inner.generation != generation || !matches!(inner.state, ScanState::Scanning { .. }) {
            return Err(ScanError::Cancelled);
        }
        inner.cancel = None;

        match outcome {
            Ok((result, jpeg)) => {
                log::info!(
                    "[SCAN] Result ready in {}ms: valid={}, flag={}, severity={}, confidence={:.2}",
                    start.elapsed().as_millis(),
                    result.is_valid_image,
                    result.has_anomaly_flag,
                    result.severity_level,
                    result.confidence_score
                );
                self.transition(
                    &mut inner,
                    ScanState::ResultReady {
                        image,
                        result: result.clone(),
                        jpeg: Arc::new(jpeg),
                    },
                );
                Ok(result)
            }
            Err(error) => {
                log::error!("[SCAN] Failed after {}ms: {}", start.elapsed().as_millis(), error);
                self.transition(
                    &mut inner,
                    ScanState::Failed {
                        image,
                        error: error.clone(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Build → complete (bounded) → parse. Returns the result and the JPEG
    /// that was uploaded.
    async fn pipeline(&self, image: &DynamicImage) -> Result<(DetectionResult, Vec<u8>), ScanError> {
        let request = llm::build_request(image, self.settings.profile, &self.settings.model)?;

        let infer_start = std::time::Instant::now();
        let raw = tokio::time::timeout(self.settings.wait, self.client.complete(&request))
            .await
            .map_err(|_| {
                log::error!(
                    "[SCAN] Inference exceeded {}s wait bound",
                    self.settings.wait.as_secs()
                );
                ScanError::Timeout
            })??;
        log::info!("[SCAN] Inference: {}ms", infer_start.elapsed().as_millis());

        let result = llm::parse_detection(&raw, self.settings.profile)?;
        Ok((result, request.jpeg_bytes))
    }
}

impl<C, S> ScanOrchestrator<C, S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, inner: &mut Inner, next: ScanState) {
        log::debug!("[SCAN] {} → {}", inner.state.name(), next.name());
        inner.state = next;
        self.status_tx.send_replace(inner.state.status());
    }
}

/// Returns the orchestrator to `Idle` if a scan future is dropped while its
/// run is still the current one.
struct AbandonGuard<'a, C, S> {
    orchestrator: &'a ScanOrchestrator<C, S>,
    generation: u64,
}

impl<C, S> Drop for AbandonGuard<'_, C, S> {
    fn drop(&mut self) {
        let mut inner = self.orchestrator.lock();
        if inner.generation != self.generation || !matches!(inner.state, ScanState::Scanning { .. }) {
            return;
        }
        inner.cancel = None;
        log::warn!("[SCAN] Scan abandoned by caller; returning to idle");
        self.orchestrator.transition(&mut inner, ScanState::Idle);
    }
}
