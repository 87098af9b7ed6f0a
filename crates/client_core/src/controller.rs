//! Session state machine: sequences user actions against the processing
//! service with at most one remote operation outstanding.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use shared::{
    domain::{InputItem, RemixParameters},
    protocol::{ArtifactRef, ProcessRequest, ProcessUrlRequest},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    input_set::{InputSet, InputSetError},
    RemoteError, RemoteService,
};

pub const ENTER_VALID_URL: &str = "Please enter a valid URL.";
pub const SELECT_FILES_TO_UPLOAD: &str = "Please select audio files to upload.";
pub const CONNECTION_FAILED: &str = "Error connecting to backend.";
pub const BACKEND_UNREACHABLE: &str = "Backend not reachable";

const PROCESSING_URL: &str = "Processing URL...";
const URL_PROCESSED: &str = "URL processed successfully!";
const URL_FAILED: &str = "Failed to process URL.";
const UPLOADING: &str = "Uploading files...";
const UPLOADED: &str = "Files uploaded!";
const UPLOAD_FAILED: &str = "Failed to upload files.";
const GENERATING: &str = "Generating remix...";
const GENERATED: &str = "Remix generated! Review the result below.";
const GENERATE_FAILED: &str = "Failed to generate remix.";
const DOWNLOADING: &str = "Downloading file...";
const DOWNLOAD_FAILED: &str = "Failed to download file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProbeStatus,
    SubmitUrl,
    Upload,
    Generate,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InFlight(Operation),
}

/// Why an action did not run. Every rejection is local; none reaches the
/// network and none except `Precondition` touches session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    #[error("{0:?} is still in flight")]
    Busy(Operation),
    #[error("generation is disabled until inputs are ready")]
    NotReady,
    #[error(transparent)]
    Input(#[from] InputSetError),
    /// A precondition failed; the message is also the new status.
    #[error("{0}")]
    Precondition(&'static str),
}

/// How a remote action resolved. Either way the session is back to idle
/// and the status message describes the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Resolution<T = ()> {
    Succeeded(T),
    Failed,
}

impl<T> Resolution<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            Self::Failed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemixResult {
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Read-only copy of a session, available in every phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub status_message: String,
    pub input_names: Vec<String>,
    pub ready: bool,
    pub params: RemixParameters,
    pub backend_status: Option<String>,
    pub last_result: Option<RemixResult>,
    pub artifacts: Vec<ArtifactRef>,
    pub picker_epoch: u64,
}

struct SessionState {
    phase: Phase,
    status_message: String,
    inputs: InputSet,
    ready: bool,
    params: RemixParameters,
    backend_status: Option<String>,
    last_result: Option<RemixResult>,
    artifacts: Vec<ArtifactRef>,
}

impl SessionState {
    fn new() -> Self {
        let inputs = InputSet::new();
        Self {
            phase: Phase::Idle,
            status_message: inputs.status_message(),
            ready: inputs.is_ready(),
            inputs,
            params: RemixParameters::default(),
            backend_status: None,
            last_result: None,
            artifacts: Vec::new(),
        }
    }

    fn ensure_idle(&self) -> Result<(), ActionRejected> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::InFlight(operation) => Err(ActionRejected::Busy(operation)),
        }
    }

    fn begin(&mut self, operation: Operation, status: &str) {
        self.phase = Phase::InFlight(operation);
        self.status_message = status.to_string();
    }

    fn finish(&mut self, status: String) {
        self.phase = Phase::Idle;
        self.status_message = status;
    }

    /// Readiness follows the local inputs after every selection change.
    fn sync_with_inputs(&mut self) {
        self.ready = self.inputs.is_ready();
        self.status_message = self.inputs.status_message();
    }

    /// A successful upload makes the session ready regardless of the local
    /// inputs: the service now holds content it can remix by name. The next
    /// selection change recomputes readiness from the inputs again.
    fn mark_uploaded(&mut self) {
        self.ready = true;
    }

    fn snapshot(&self, session_id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            session_id,
            phase: self.phase,
            status_message: self.status_message.clone(),
            input_names: self.inputs.names(),
            ready: self.ready,
            params: self.params,
            backend_status: self.backend_status.clone(),
            last_result: self.last_result.clone(),
            artifacts: self.artifacts.clone(),
            picker_epoch: self.inputs.picker_epoch(),
        }
    }
}

fn failure_status(err: &RemoteError, fallback: &str) -> String {
    match err {
        RemoteError::Transport(_) => CONNECTION_FAILED.to_string(),
        RemoteError::Application { .. } => err
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Marks an outstanding remote call. If the action future is dropped before
/// the call settles, the session returns to idle with the connection-failure
/// status.
struct InFlight<'a> {
    controller: &'a SessionController,
    operation: Operation,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(controller: &'a SessionController, operation: Operation) -> Self {
        Self {
            controller,
            operation,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.controller.lock_state();
        if state.phase != Phase::InFlight(self.operation) {
            return;
        }
        warn!(
            session = %self.controller.id,
            operation = ?self.operation,
            "action dropped before the service answered"
        );
        match self.operation {
            Operation::ProbeStatus => {
                state.backend_status = Some(BACKEND_UNREACHABLE.to_string());
                state.phase = Phase::Idle;
            }
            _ => state.finish(CONNECTION_FAILED.to_string()),
        }
    }
}

/// One user session. Construct one per session and share it behind an `Arc`
/// if several tasks drive it; state changes only through these methods.
pub struct SessionController {
    id: Uuid,
    remote: Arc<dyn RemoteService>,
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot(self.id)
    }

    /// Appends a batch of inputs. An empty batch clears the selection.
    pub async fn select_files(&self, items: Vec<InputItem>) -> Result<(), ActionRejected> {
        let mut state = self.lock_state();
        self.guard(&state)?;

        if items.is_empty() {
            state.inputs.clear();
        } else {
            state.inputs.add(items);
        }
        state.sync_with_inputs();
        info!(session = %self.id, inputs = state.inputs.len(), "selection updated");
        Ok(())
    }

    pub async fn remove_file(&self, index: usize) -> Result<InputItem, ActionRejected> {
        let mut state = self.lock_state();
        self.guard(&state)?;

        let removed = state.inputs.remove_at(index).map_err(|err| {
            debug!(session = %self.id, %err, "remove rejected");
            ActionRejected::from(err)
        })?;
        state.sync_with_inputs();
        info!(
            session = %self.id,
            index,
            name = %removed.name,
            inputs = state.inputs.len(),
            "input removed"
        );
        Ok(removed)
    }

    pub async fn set_tempo(&self, value: i32) -> Result<i32, ActionRejected> {
        let mut state = self.lock_state();
        self.guard(&state)?;
        Ok(state.params.set_tempo(value))
    }

    pub async fn set_pitch_shift(&self, value: i32) -> Result<i32, ActionRejected> {
        let mut state = self.lock_state();
        self.guard(&state)?;
        Ok(state.params.set_pitch_shift(value))
    }

    pub async fn set_effect_mix(&self, value: i32) -> Result<i32, ActionRejected> {
        let mut state = self.lock_state();
        self.guard(&state)?;
        Ok(state.params.set_effect_mix(value))
    }

    /// Probes the service and records what to show as backend status. The
    /// status message is left alone; a failed probe is informational only.
    pub async fn refresh_backend_status(&self) -> Result<String, ActionRejected> {
        {
            let mut state = self.lock_state();
            self.guard(&state)?;
            state.phase = Phase::InFlight(Operation::ProbeStatus);
        }
        let in_flight = InFlight::new(self, Operation::ProbeStatus);

        let result = self.remote.probe_status().await;

        let mut state = self.lock_state();
        in_flight.settle();
        let shown = match result {
            Ok(response) => response.status,
            Err(err) => {
                warn!(session = %self.id, %err, "backend status probe failed");
                BACKEND_UNREACHABLE.to_string()
            }
        };
        state.backend_status = Some(shown.clone());
        state.phase = Phase::Idle;
        Ok(shown)
    }

    pub async fn submit_url(&self, url: &str) -> Result<Resolution, ActionRejected> {
        let request = {
            let mut state = self.lock_state();
            self.guard(&state)?;

            let url = url.trim();
            if url.is_empty() {
                state.status_message = ENTER_VALID_URL.to_string();
                return Err(ActionRejected::Precondition(ENTER_VALID_URL));
            }
            state.begin(Operation::SubmitUrl, PROCESSING_URL);
            ProcessUrlRequest {
                url: url.to_string(),
            }
        };
        info!(session = %self.id, url = %request.url, "submitting url");

        let in_flight = InFlight::new(self, Operation::SubmitUrl);
        let result = self.remote.submit_url(request).await;

        let mut state = self.lock_state();
        in_flight.settle();
        Ok(match result {
            Ok(response) => {
                state.artifacts = response.artifacts();
                state.finish(response.message.unwrap_or_else(|| URL_PROCESSED.to_string()));
                Resolution::Succeeded(())
            }
            Err(err) => {
                warn!(session = %self.id, %err, "url ingestion failed");
                state.finish(failure_status(&err, URL_FAILED));
                Resolution::Failed
            }
        })
    }

    pub async fn upload(&self) -> Result<Resolution, ActionRejected> {
        let items = {
            let mut state = self.lock_state();
            self.guard(&state)?;

            if state.inputs.is_empty() {
                state.status_message = SELECT_FILES_TO_UPLOAD.to_string();
                return Err(ActionRejected::Precondition(SELECT_FILES_TO_UPLOAD));
            }
            state.begin(Operation::Upload, UPLOADING);
            state.inputs.items().to_vec()
        };
        info!(session = %self.id, files = items.len(), "uploading inputs");

        let in_flight = InFlight::new(self, Operation::Upload);
        let result = self.remote.upload_files(items).await;

        let mut state = self.lock_state();
        in_flight.settle();
        Ok(match result {
            Ok(response) => {
                state.mark_uploaded();
                state.artifacts = response.artifacts();
                state.finish(response.message.unwrap_or_else(|| UPLOADED.to_string()));
                Resolution::Succeeded(())
            }
            Err(err) => {
                warn!(session = %self.id, %err, "upload failed");
                state.finish(failure_status(&err, UPLOAD_FAILED));
                Resolution::Failed
            }
        })
    }

    /// Requests a remix of the currently named inputs. Disabled, with no
    /// state change, until the session is ready.
    pub async fn generate(&self) -> Result<Resolution, ActionRejected> {
        let request = {
            let mut state = self.lock_state();
            self.guard(&state)?;

            if !state.ready {
                debug!(session = %self.id, "generate is disabled");
                return Err(ActionRejected::NotReady);
            }
            state.begin(Operation::Generate, GENERATING);
            ProcessRequest::new(&state.params, state.inputs.names())
        };
        info!(
            session = %self.id,
            tempo = request.tempo,
            pitch = request.pitch,
            effect_mix = request.effect_mix,
            files = request.files.len(),
            "generating remix"
        );

        let in_flight = InFlight::new(self, Operation::Generate);
        let result = self.remote.generate_remix(request).await;

        let mut state = self.lock_state();
        in_flight.settle();
        Ok(match result {
            Ok(payload) => {
                state.last_result = Some(RemixResult {
                    payload,
                    received_at: Utc::now(),
                });
                state.finish(GENERATED.to_string());
                Resolution::Succeeded(())
            }
            Err(err) => {
                warn!(session = %self.id, %err, "remix generation failed");
                state.finish(failure_status(&err, GENERATE_FAILED));
                Resolution::Failed
            }
        })
    }

    pub async fn download_artifact(
        &self,
        artifact: ArtifactRef,
    ) -> Result<Resolution<Vec<u8>>, ActionRejected> {
        {
            let mut state = self.lock_state();
            self.guard(&state)?;
            state.begin(Operation::Download, DOWNLOADING);
        }
        let name = artifact.file_name().to_string();
        info!(session = %self.id, path = %artifact.path(), "downloading artifact");

        let in_flight = InFlight::new(self, Operation::Download);
        let result = self.remote.download_artifact(artifact).await;

        let mut state = self.lock_state();
        in_flight.settle();
        Ok(match result {
            Ok(bytes) => {
                state.finish(format!("Downloaded {name}."));
                Resolution::Succeeded(bytes)
            }
            Err(err) => {
                warn!(session = %self.id, %err, "artifact download failed");
                state.finish(failure_status(&err, DOWNLOAD_FAILED));
                Resolution::Failed
            }
        })
    }

    /// Never held across an await.
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self, state: &SessionState) -> Result<(), ActionRejected> {
        state.ensure_idle().inspect_err(|err| {
            debug!(session = %self.id, %err, "action rejected while busy");
        })
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
