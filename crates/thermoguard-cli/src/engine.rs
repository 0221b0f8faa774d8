use serde::Serialize;
use thermoguard_client::{ApiClient, ClientError};
use thermoguard_core::{
    evaluate, BlinkDetector, BoundingBox, Calibration, CaptureError, Descriptor, Detection,
    DetectorError, FrameSource, GeometryExtractor, LivenessPolicy, Verdict,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("registration error: {0}")]
    Client(#[from] ClientError),
    #[error("no face detected in any captured frame")]
    NoFaceDetected,
    #[error("liveness check rejected the face ({:?})", .0.failed_checks)]
    LivenessRejected(Box<Verdict>),
    #[error("no blink observed in any captured frame")]
    NoBlink,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// The registration/verification backend as seen by the engine.
pub trait IdentityService: Send + 'static {
    fn register(&self, user: &str, descriptor: &Descriptor) -> Result<(), ClientError>;
    /// Fails closed: an undecidable verification is a rejection.
    fn verify(&self, user: &str, descriptor: &Descriptor) -> bool;
}

impl IdentityService for ApiClient {
    fn register(&self, user: &str, descriptor: &Descriptor) -> Result<(), ClientError> {
        ApiClient::register(self, user, descriptor)
    }

    fn verify(&self, user: &str, descriptor: &Descriptor) -> bool {
        ApiClient::verify(self, user, descriptor)
    }
}

/// Pipeline tunables, copied out of [`Config`] at spawn time.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub calibration: Calibration,
    pub policy: LivenessPolicy,
    pub liveness_enabled: bool,
    pub blink_threshold: f32,
    pub blink_window: usize,
    pub require_blink: bool,
    pub frames_per_request: usize,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            calibration: config.calibration,
            policy: config.policy.clone(),
            liveness_enabled: config.liveness_enabled,
            blink_threshold: config.blink_threshold,
            blink_window: config.blink_window,
            require_blink: config.require_blink,
            frames_per_request: config.frames_per_request.max(1),
        }
    }
}

/// What the pipeline saw in a single frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub timestamp_ms: u64,
    pub face: Option<BoundingBox>,
    /// `None` when no face was found or the thermal check is disabled.
    pub verdict: Option<Verdict>,
    pub blink: bool,
}

/// Result of a registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResult {
    pub verdict: Option<Verdict>,
    pub blink: bool,
}

/// Result of a verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub accepted: bool,
    pub verdict: Option<Verdict>,
    pub blink: bool,
}

/// Messages sent from callers to the engine thread.
enum EngineRequest {
    Register {
        user: String,
        reply: oneshot::Sender<Result<RegisterResult, EngineError>>,
    },
    Verify {
        user: String,
        reply: oneshot::Sender<Result<VerifyResult, EngineError>>,
    },
    Inspect {
        reply: oneshot::Sender<Result<FrameReport, EngineError>>,
    },
    SetCalibration {
        calibration: Calibration,
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture frames until a live face is found, then register its descriptor.
    pub async fn register(&self, user: &str) -> Result<RegisterResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Register {
            user: user.to_string(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Capture frames until a live face is found, then verify it against `user`.
    pub async fn verify(&self, user: &str) -> Result<VerifyResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Verify {
            user: user.to_string(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Process exactly one frame and report what was seen.
    pub async fn inspect(&self) -> Result<FrameReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Inspect { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Replace the camera-pair calibration; applies from the next frame.
    pub async fn set_calibration(&self, calibration: Calibration) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::SetCalibration {
            calibration,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the frame source, the extractor, the identity service and
/// the blink history. Requests are handled one at a time, so frames are never
/// processed concurrently.
pub fn spawn_engine<S, X, C>(
    source: S,
    extractor: X,
    identity: C,
    settings: EngineSettings,
) -> Result<EngineHandle, EngineError>
where
    S: FrameSource + Send + 'static,
    X: GeometryExtractor + Send + 'static,
    C: IdentityService,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    tracing::info!(
        rule = ?settings.policy.rule,
        liveness_enabled = settings.liveness_enabled,
        require_blink = settings.require_blink,
        frames_per_request = settings.frames_per_request,
        "starting engine"
    );

    let mut pipeline = Pipeline {
        source,
        extractor,
        identity,
        blink: BlinkDetector::new(settings.blink_threshold, settings.blink_window),
        settings,
    };

    std::thread::Builder::new()
        .name("thermoguard-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Register { user, reply } => {
                        let _ = reply.send(pipeline.register(&user));
                    }
                    EngineRequest::Verify { user, reply } => {
                        let _ = reply.send(pipeline.verify(&user));
                    }
                    EngineRequest::Inspect { reply } => {
                        let _ = reply.send(pipeline.inspect());
                    }
                    EngineRequest::SetCalibration { calibration, reply } => {
                        tracing::info!(
                            offset_x = calibration.offset_x,
                            offset_y = calibration.offset_y,
                            scale = ?calibration.scale,
                            "calibration updated"
                        );
                        pipeline.settings.calibration = calibration;
                        let _ = reply.send(());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

/// One processed frame that contained a face.
struct Observation {
    detection: Detection,
    verdict: Option<Verdict>,
    blink: bool,
}

struct Pipeline<S, X, C> {
    source: S,
    extractor: X,
    identity: C,
    blink: BlinkDetector,
    settings: EngineSettings,
}

impl<S, X, C> Pipeline<S, X, C>
where
    S: FrameSource,
    X: GeometryExtractor,
    C: IdentityService,
{
    /// Capture → detect → liveness + blink for a single frame.
    fn observe(&mut self) -> Result<(u64, Option<Observation>), EngineError> {
        let pair = self.source.next_pair()?;
        let timestamp_ms = pair.optical.timestamp_ms();

        let Some(detection) = self.extractor.detect(&pair.optical)? else {
            tracing::debug!(timestamp_ms, "no face in frame");
            return Ok((timestamp_ms, None));
        };

        // Calibration is read per frame so live adjustments apply immediately.
        let verdict = self.settings.liveness_enabled.then(|| {
            evaluate(
                &detection.landmarks,
                &pair,
                &self.settings.calibration,
                &self.settings.policy,
            )
        });
        let blink = self.blink.check(&detection.landmarks);

        tracing::debug!(
            timestamp_ms,
            is_live = ?verdict.as_ref().map(|v| v.is_live),
            outcome = ?verdict.as_ref().map(|v| v.outcome),
            blink,
            "frame processed"
        );

        Ok((
            timestamp_ms,
            Some(Observation {
                detection,
                verdict,
                blink,
            }),
        ))
    }

    fn inspect(&mut self) -> Result<FrameReport, EngineError> {
        let (timestamp_ms, observation) = self.observe()?;
        Ok(match observation {
            Some(obs) => FrameReport {
                timestamp_ms,
                face: Some(obs.detection.bounding_box),
                verdict: obs.verdict,
                blink: obs.blink,
            },
            None => FrameReport {
                timestamp_ms,
                face: None,
                verdict: None,
                blink: false,
            },
        })
    }

    /// Capture up to `frames_per_request` frames and return the first face
    /// that passes liveness (and, when required, with a blink somewhere in
    /// the attempt).
    fn acquire_live_face(&mut self) -> Result<Observation, EngineError> {
        let mut faces = 0usize;
        let mut blinked = false;
        let mut live: Option<Observation> = None;
        let mut rejected: Option<Verdict> = None;

        for _ in 0..self.settings.frames_per_request {
            let obs = match self.observe() {
                Ok((_, Some(obs))) => obs,
                Ok((_, None)) => continue,
                Err(EngineError::Capture(CaptureError::Exhausted)) if faces > 0 => break,
                Err(e) => return Err(e),
            };
            faces += 1;
            // The blink window outlives a request; only this attempt's frames count.
            blinked |= self.blink.blinked_within(faces);

            match &obs.verdict {
                Some(v) if !v.is_live => rejected = Some(v.clone()),
                _ => {
                    if live.is_none() {
                        live = Some(obs);
                    }
                }
            }

            if live.is_some() && (blinked || !self.settings.require_blink) {
                break;
            }
        }

        let mut obs = match (live, rejected) {
            (Some(obs), _) => obs,
            (None, Some(verdict)) => {
                tracing::warn!(failed = ?verdict.failed_checks, "liveness rejected every face");
                return Err(EngineError::LivenessRejected(Box::new(verdict)));
            }
            (None, None) => return Err(EngineError::NoFaceDetected),
        };

        if self.settings.require_blink && !blinked {
            return Err(EngineError::NoBlink);
        }
        obs.blink = blinked;
        Ok(obs)
    }

    fn register(&mut self, user: &str) -> Result<RegisterResult, EngineError> {
        let obs = self.acquire_live_face()?;
        self.identity.register(user, &obs.detection.descriptor)?;
        tracing::info!(user, "registered");
        Ok(RegisterResult {
            verdict: obs.verdict,
            blink: obs.blink,
        })
    }

    fn verify(&mut self, user: &str) -> Result<VerifyResult, EngineError> {
        let obs = self.acquire_live_face()?;
        let accepted = self.identity.verify(user, &obs.detection.descriptor);
        tracing::info!(user, accepted, "verify complete");
        Ok(VerifyResult {
            accepted,
            verdict: obs.verdict,
            blink: obs.blink,
        })
    }
}
