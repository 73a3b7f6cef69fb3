//! Capture session: exclusive ownership of the recording resource

use crate::audio::Recorder;
use crate::config::CaptureConfig;
use crate::error::CaptureError;

use super::AudioArtifact;

/// Owns the microphone for the duration of one recording
///
/// At most one session may be active; a second `start` is rejected
/// before anything is acquired. `stop` releases the resource on every
/// exit path, including failures.
pub struct CaptureSession<R: Recorder> {
    recorder: R,
    config: CaptureConfig,
    active: bool,
}

impl<R: Recorder> CaptureSession<R> {
    /// Wrap a recorder backend with the session discipline
    pub const fn new(recorder: R, config: CaptureConfig) -> Self {
        Self {
            recorder,
            config,
            active: false,
        }
    }

    /// Whether a recording is in progress
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Acquire the microphone and begin recording
    ///
    /// # Errors
    ///
    /// Returns `SessionActive` without side effects if a recording is
    /// already in progress, or the backend's acquisition error.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::SessionActive);
        }

        self.recorder.start(&self.config)?;
        self.active = true;
        tracing::info!(path = %self.config.output_path.display(), "recording started");
        Ok(())
    }

    /// Stop recording and return the artifact
    ///
    /// The session is marked inactive before the backend result is
    /// inspected, so the resource is never considered held after this
    /// call, success or failure.
    ///
    /// # Errors
    ///
    /// Returns `NotRecording` if idle, `EmptyArtifact` for a zero-length
    /// or missing file, or the backend's stop error.
    pub fn stop(&mut self) -> Result<AudioArtifact, CaptureError> {
        if !self.active {
            return Err(CaptureError::NotRecording);
        }

        self.active = false;
        let artifact = self.recorder.stop()?;

        if !artifact.exists() || artifact.len == 0 {
            return Err(CaptureError::EmptyArtifact);
        }

        tracing::info!(bytes = artifact.len, "recording stopped");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Recorder that hands back a fixed artifact
    struct StubRecorder {
        artifact: AudioArtifact,
        started: usize,
        stopped: usize,
    }

    impl Recorder for StubRecorder {
        fn start(&mut self, _config: &CaptureConfig) -> Result<(), CaptureError> {
            self.started += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<AudioArtifact, CaptureError> {
            self.stopped += 1;
            Ok(self.artifact.clone())
        }
    }

    fn session_with_file(len: u64) -> (CaptureSession<StubRecorder>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CaptureConfig::in_dir(dir.path());
        std::fs::write(&config.output_path, vec![0u8; usize::try_from(len).unwrap()])
            .expect("write");
        let recorder = StubRecorder {
            artifact: AudioArtifact::new(config.output_path.clone(), len),
            started: 0,
            stopped: 0,
        };
        (CaptureSession::new(recorder, config), dir)
    }

    #[test]
    fn second_start_is_rejected_before_acquiring() {
        let (mut session, _dir) = session_with_file(2000);
        session.start().expect("first start");
        assert!(matches!(session.start(), Err(CaptureError::SessionActive)));
        assert_eq!(session.recorder.started, 1);
    }

    #[test]
    fn stop_when_idle_is_rejected() {
        let (mut session, _dir) = session_with_file(2000);
        assert!(matches!(session.stop(), Err(CaptureError::NotRecording)));
    }

    #[test]
    fn stop_returns_artifact_and_releases() {
        let (mut session, _dir) = session_with_file(2000);
        session.start().expect("start");
        let artifact = session.stop().expect("stop");
        assert_eq!(artifact.len, 2000);
        assert!(!session.is_active());
        // The cycle is restartable.
        session.start().expect("restart");
    }

    #[test]
    fn empty_file_reports_empty_artifact() {
        let (mut session, _dir) = session_with_file(0);
        session.start().expect("start");
        assert!(matches!(session.stop(), Err(CaptureError::EmptyArtifact)));
        assert!(!session.is_active());
    }

    #[test]
    fn missing_file_reports_empty_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CaptureConfig::in_dir(dir.path());
        let recorder = StubRecorder {
            artifact: AudioArtifact::new(PathBuf::from("/nonexistent/take.wav"), 2000),
            started: 0,
            stopped: 0,
        };
        let mut session = CaptureSession::new(recorder, config);
        session.start().expect("start");
        assert!(matches!(session.stop(), Err(CaptureError::EmptyArtifact)));
    }
}
