use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use livecheck_core::{FrameReport, MotionFeed, SessionEvent, SessionOrchestrator, SessionStatus};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::detector::{
    validate_observation, CameraError, CameraFrame, CameraSource, DetectorError, FaceDetector,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Outcome of offering a frame to the pipeline.
#[derive(Debug)]
pub enum Submission {
    /// The frame was analysed and the session advanced.
    Processed(FrameReport),
    /// Another frame was still in flight; this one was discarded.
    Dropped,
    /// The detector failed on this frame; session state is untouched.
    Skipped(DetectorError),
}

/// Marks the single analysis slot as occupied for as long as it lives.
///
/// Travels inside the request, so the slot is released when the engine
/// thread finishes with the frame, or when the request is dropped unsent.
struct InFlightSlot {
    flag: Arc<AtomicBool>,
}

impl InFlightSlot {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Messages sent from callers to the engine thread.
enum PipelineRequest {
    Frame {
        frame: CameraFrame,
        slot: InFlightSlot,
        reply: oneshot::Sender<Submission>,
    },
    Reset {
        reply: oneshot::Sender<SessionEvent>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Clone-safe handle to the engine thread. The thread exits once every
/// handle is dropped; a frame still being analysed at that point finishes
/// and its result is discarded.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineRequest>,
    in_flight: Arc<AtomicBool>,
    motion: MotionFeed,
}

impl PipelineHandle {
    /// Offer a frame for analysis. Returns [`Submission::Dropped`] at once
    /// if a previous frame is still being processed.
    pub async fn submit(&self, frame: CameraFrame) -> Result<Submission, EngineError> {
        let Some(slot) = InFlightSlot::acquire(&self.in_flight) else {
            tracing::trace!("frame dropped: analysis in flight");
            return Ok(Submission::Dropped);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PipelineRequest::Frame {
                frame,
                slot,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Discard the current session and start a new one.
    pub async fn reset(&self) -> Result<SessionEvent, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PipelineRequest::Reset { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<SessionStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PipelineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Producer handle for the device-motion subscription.
    pub fn motion_feed(&self) -> MotionFeed {
        self.motion.clone()
    }

    /// Whether a frame is currently being analysed.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Spawn the pipeline on a dedicated OS thread.
///
/// The camera is opened on the engine thread once it is running, and the
/// call blocks until that open completes. An open failure is returned here:
/// without a camera no progress is possible. A failure to spawn the thread
/// happens before the camera is touched, so there is nothing to close.
pub fn spawn_pipeline<C, D>(
    mut orchestrator: SessionOrchestrator,
    mut camera: C,
    mut detector: D,
) -> Result<PipelineHandle, EngineError>
where
    C: CameraSource,
    D: FaceDetector,
{
    let zoom = orchestrator.config().camera_zoom;
    let motion = orchestrator.motion_feed();
    let (tx, mut rx) = mpsc::channel::<PipelineRequest>(4);
    let (opened_tx, opened_rx) = std::sync::mpsc::channel::<Result<(), CameraError>>();

    std::thread::Builder::new()
        .name("livecheck-engine".into())
        .spawn(move || {
            match camera.open(zoom) {
                Ok(info) => {
                    tracing::info!(
                        width = info.width,
                        height = info.height,
                        zoom = info.zoom,
                        "camera opened"
                    );
                    if opened_tx.send(Ok(())).is_err() {
                        camera.close();
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "camera open failed");
                    let _ = opened_tx.send(Err(e));
                    return;
                }
            }

            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    PipelineRequest::Frame { frame, slot, reply } => {
                        let result = run_frame(&mut orchestrator, &mut detector, &frame);
                        drop(slot);
                        let _ = reply.send(result);
                    }
                    PipelineRequest::Reset { reply } => {
                        let _ = reply.send(orchestrator.reset());
                    }
                    PipelineRequest::Status { reply } => {
                        let _ = reply.send(orchestrator.status());
                    }
                }
            }
            camera.close();
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    opened_rx.recv().map_err(|_| EngineError::ChannelClosed)??;

    Ok(PipelineHandle {
        tx,
        in_flight: Arc::new(AtomicBool::new(false)),
        motion,
    })
}

/// Expire, detect, then classify. Expiry is settled before the detector
/// runs, so a dead session never waits on detector output. Otherwise the
/// orchestrator is only touched once a valid detector result is in hand,
/// and a failed frame leaves no partial state.
fn run_frame<D: FaceDetector>(
    orchestrator: &mut SessionOrchestrator,
    detector: &mut D,
    frame: &CameraFrame,
) -> Submission {
    if let Some(reset) = orchestrator.expire_if_due() {
        tracing::debug!(event = ?reset, "session event");
        return Submission::Processed(FrameReport {
            events: vec![reset],
            status: orchestrator.status(),
        });
    }

    let face = match detector
        .detect(frame)
        .and_then(|face| validate_observation(&face).map(|_| face))
    {
        Ok(face) => face,
        Err(e) => {
            tracing::warn!(error = %e, "detector failed; frame skipped");
            return Submission::Skipped(e);
        }
    };

    let report = orchestrator.process_frame(&frame.as_frame(), &face);
    for event in &report.events {
        tracing::debug!(?event, "session event");
    }
    Submission::Processed(report)
}
