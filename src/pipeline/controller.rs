//! Pipeline state machine
//!
//! Orchestrates capture, validation, upload, decode, and playback in
//! sequence. The state machine is the single source of truth for "is
//! something in flight": `user_start` is refused anywhere but `Idle`, so
//! the one microphone and the one in-flight upload are exclusive by
//! construction.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::{Player, Recorder};
use crate::config::Config;
use crate::error::{Error, Result};

use super::{
    ArtifactValidator, AudioArtifact, CaptureSession, PipelineEvent, PipelineState,
    PlaybackSession, ResponseDecoder, UploadClient,
};

/// Capability grants required before capture may begin
///
/// The permission system itself (OS prompts, consent UI) is an external
/// collaborator; the pipeline only asks whether the grants are present.
pub trait PermissionGate: Send + Sync {
    /// Whether microphone access is granted
    fn microphone_granted(&self) -> bool;

    /// Whether network access is granted
    fn network_granted(&self) -> bool;
}

/// Gate for platforms where grants are implicit
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn microphone_granted(&self) -> bool {
        true
    }

    fn network_granted(&self) -> bool {
        true
    }
}

/// A lifecycle command arrived in a state that does not accept it
///
/// This is a caller error, rejected without side effects. It is distinct
/// from a pipeline failure, which transitions the machine to `Failed`.
#[derive(Debug, thiserror::Error)]
#[error("not accepted while {state}")]
pub struct StartRejected {
    /// The state the pipeline was in
    pub state: PipelineState,
}

/// Drives one utterance at a time through the pipeline
pub struct PipelineController<R: Recorder, P: Player> {
    state: PipelineState,
    capture: CaptureSession<R>,
    validator: ArtifactValidator<P>,
    uploader: UploadClient,
    playback: PlaybackSession<P>,
    permissions: Box<dyn PermissionGate>,
    host: String,
    last_artifact: Option<AudioArtifact>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl<R: Recorder, P: Player> PipelineController<R, P> {
    /// Build a controller and the event stream the UI collaborator drains
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_receiver(
        recorder: R,
        player: Arc<P>,
        config: &Config,
        permissions: Box<dyn PermissionGate>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PipelineEvent>)> {
        let (events, rx) = mpsc::unbounded_channel();

        let controller = Self {
            state: PipelineState::Idle,
            capture: CaptureSession::new(recorder, config.capture.clone()),
            validator: ArtifactValidator::new(Arc::clone(&player)),
            uploader: UploadClient::new()
                .map_err(|e| Error::Config(format!("http client: {e}")))?,
            playback: PlaybackSession::new(player),
            permissions,
            host: config.server_host.clone(),
            last_artifact: None,
            events,
        };

        Ok((controller, rx))
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The most recent recording, retained for a retry from `Idle`
    #[must_use]
    pub const fn last_artifact(&self) -> Option<&AudioArtifact> {
        self.last_artifact.as_ref()
    }

    /// Begin a new cycle: `Idle → Recording`
    ///
    /// Missing permission grants and capture acquisition failures are
    /// pipeline failures (the machine enters `Failed`); calling this
    /// anywhere but `Idle` is a caller error with no side effects.
    ///
    /// # Errors
    ///
    /// Returns `StartRejected` when the pipeline is not `Idle`.
    pub fn user_start(&mut self) -> std::result::Result<(), StartRejected> {
        if self.state != PipelineState::Idle {
            return Err(StartRejected {
                state: self.state.clone(),
            });
        }

        if !self.permissions.microphone_granted() || !self.permissions.network_granted() {
            self.fail("permission not granted".to_string());
            return Ok(());
        }

        match self.capture.start() {
            Ok(()) => self.enter(PipelineState::Recording),
            Err(e) => self.fail(e.to_string()),
        }
        Ok(())
    }

    /// Finish the utterance and run the rest of the cycle to `Idle` or
    /// `Failed`
    ///
    /// Suspends on the network round trip and on playback completion;
    /// neither blocks the runtime. There is no mid-flight cancellation;
    /// a failure is only observed when the operation completes.
    ///
    /// # Errors
    ///
    /// Returns `StartRejected` when the pipeline is not `Recording`.
    pub async fn user_stop(&mut self) -> std::result::Result<(), StartRejected> {
        if self.state != PipelineState::Recording {
            return Err(StartRejected {
                state: self.state.clone(),
            });
        }

        self.enter(PipelineState::Validating);
        let artifact = match self.capture.stop() {
            Ok(artifact) => artifact,
            Err(e) => {
                self.fail(e.to_string());
                return Ok(());
            }
        };
        self.last_artifact = Some(artifact.clone());

        if let Err(e) = self.validator.validate(&artifact) {
            self.fail(e.to_string());
            return Ok(());
        }

        self.enter(PipelineState::Uploading);
        let body = match self.uploader.send(&artifact, &self.host).await {
            Ok(body) => body,
            Err(e) => {
                self.fail(e.to_string());
                return Ok(());
            }
        };

        self.enter(PipelineState::AwaitingResponse);
        let utterance = match ResponseDecoder::decode(&body) {
            Ok(utterance) => utterance,
            Err(e) => {
                self.fail(e.to_string());
                return Ok(());
            }
        };

        // The transcript rides on the Playing event, emitted before
        // playback starts, so the text display cannot race the audio.
        tracing::info!(text = %utterance.text, "reply received");
        self.state = PipelineState::Playing;
        let _ = self.events.send(PipelineEvent::playing(utterance.text));

        match self.playback.play(&utterance.audio).await {
            Ok(()) => self.enter(PipelineState::Idle),
            Err(e) => self.fail(e.to_string()),
        }
        Ok(())
    }

    /// Dismiss a failure: `Failed → Idle`
    ///
    /// A no-op in any other state.
    pub fn acknowledge(&mut self) {
        if matches!(self.state, PipelineState::Failed(_)) {
            self.enter(PipelineState::Idle);
        }
    }

    /// Transition and notify the UI collaborator
    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(from = %self.state, to = %state, "state change");
        self.state = state.clone();
        let _ = self.events.send(PipelineEvent::entered(state));
    }

    /// Transition to `Failed` with a human-readable reason
    fn fail(&mut self, reason: String) {
        tracing::warn!(reason = %reason, "pipeline failed");
        self.enter(PipelineState::Failed(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use crate::error::{CaptureError, PlaybackError};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Recorder that writes a file of a configurable size on stop
    struct FakeRecorder {
        output: PathBuf,
        stop_len: u64,
        fail_start: bool,
        starts: Arc<Mutex<usize>>,
    }

    impl Recorder for FakeRecorder {
        fn start(&mut self, _config: &CaptureConfig) -> std::result::Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::DeviceUnavailable("device busy".to_string()));
            }
            *self.starts.lock().unwrap() += 1;
            Ok(())
        }

        fn stop(&mut self) -> std::result::Result<AudioArtifact, CaptureError> {
            std::fs::write(&self.output, vec![0u8; usize::try_from(self.stop_len).unwrap()])
                .map_err(|e| CaptureError::Backend(e.to_string()))?;
            Ok(AudioArtifact::new(self.output.clone(), self.stop_len))
        }
    }

    /// Player that accepts everything and counts plays
    struct FakePlayer {
        plays: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Player for FakePlayer {
        fn probe(&self, _path: &Path) -> std::result::Result<(), PlaybackError> {
            Ok(())
        }

        async fn play(&self, path: &Path) -> std::result::Result<(), PlaybackError> {
            let bytes = std::fs::read(path)?;
            self.plays.lock().unwrap().push(bytes);
            Ok(())
        }
    }

    struct DeniedGate;

    impl PermissionGate for DeniedGate {
        fn microphone_granted(&self) -> bool {
            false
        }

        fn network_granted(&self) -> bool {
            true
        }
    }

    fn test_config(dir: &Path, host: &str) -> Config {
        Config {
            server_host: host.to_string(),
            data_dir: dir.to_path_buf(),
            capture: CaptureConfig::in_dir(dir),
        }
    }

    fn build(
        dir: &Path,
        host: &str,
        stop_len: u64,
        permissions: Box<dyn PermissionGate>,
    ) -> (
        PipelineController<FakeRecorder, FakePlayer>,
        mpsc::UnboundedReceiver<PipelineEvent>,
        Arc<Mutex<usize>>,
    ) {
        let starts = Arc::new(Mutex::new(0));
        let recorder = FakeRecorder {
            output: dir.join("audio_record.m4a"),
            stop_len,
            fail_start: false,
            starts: Arc::clone(&starts),
        };
        let player = Arc::new(FakePlayer {
            plays: Mutex::new(Vec::new()),
        });
        let config = test_config(dir, host);
        let (controller, rx) =
            PipelineController::with_receiver(recorder, player, &config, permissions)
                .expect("controller");
        (controller, rx, starts)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineState> {
        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            states.push(event.state);
        }
        states
    }

    #[test]
    fn missing_permission_fails_without_acquiring() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut controller, mut rx, starts) =
            build(dir.path(), "example.com", 2000, Box::new(DeniedGate));

        controller.user_start().expect("accepted");
        assert_eq!(
            controller.state(),
            &PipelineState::Failed("permission not granted".to_string())
        );
        assert_eq!(*starts.lock().unwrap(), 0);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn start_while_recording_is_rejected_without_side_effects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut controller, mut rx, starts) =
            build(dir.path(), "example.com", 2000, Box::new(AlwaysGranted));

        controller.user_start().expect("accepted");
        drain(&mut rx);

        let err = controller.user_start().expect_err("must reject");
        assert_eq!(err.state, PipelineState::Recording);
        assert_eq!(controller.state(), &PipelineState::Recording);
        assert_eq!(*starts.lock().unwrap(), 1);
        assert!(drain(&mut rx).is_empty(), "no events on rejection");
    }

    #[test]
    fn capture_start_failure_enters_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recorder = FakeRecorder {
            output: dir.path().join("audio_record.m4a"),
            stop_len: 2000,
            fail_start: true,
            starts: Arc::new(Mutex::new(0)),
        };
        let player = Arc::new(FakePlayer {
            plays: Mutex::new(Vec::new()),
        });
        let config = test_config(dir.path(), "example.com");
        let (mut controller, _rx) = PipelineController::with_receiver(
            recorder,
            player,
            &config,
            Box::new(AlwaysGranted),
        )
        .expect("controller");

        controller.user_start().expect("accepted");
        assert!(matches!(controller.state(), PipelineState::Failed(_)));

        // Restartable after acknowledge.
        controller.acknowledge();
        assert_eq!(controller.state(), &PipelineState::Idle);
    }

    #[tokio::test]
    async fn too_small_artifact_never_reaches_uploading() {
        let dir = tempfile::tempdir().expect("tempdir");
        // 512 bytes is under the 1024-byte gate.
        let (mut controller, mut rx, _starts) =
            build(dir.path(), "example.com", 512, Box::new(AlwaysGranted));

        controller.user_start().expect("start");
        controller.user_stop().await.expect("stop accepted");

        let states = drain(&mut rx);
        assert!(states.contains(&PipelineState::Validating));
        assert!(!states.contains(&PipelineState::Uploading));
        assert!(matches!(controller.state(), PipelineState::Failed(_)));
    }

    #[tokio::test]
    async fn stop_while_idle_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut controller, _rx, _starts) =
            build(dir.path(), "example.com", 2000, Box::new(AlwaysGranted));

        let err = controller.user_stop().await.expect_err("must reject");
        assert_eq!(err.state, PipelineState::Idle);
    }

    #[test]
    fn acknowledge_outside_failed_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut controller, _rx, _starts) =
            build(dir.path(), "example.com", 2000, Box::new(AlwaysGranted));

        controller.acknowledge();
        assert_eq!(controller.state(), &PipelineState::Idle);

        controller.user_start().expect("start");
        controller.acknowledge();
        assert_eq!(controller.state(), &PipelineState::Recording);
    }
}
