use crate::{
    error::AnalyzerError,
    model::{GenerationModel, NormalizedImage},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Represents the current state of the generation engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineState {
    /// The worker is waiting for the next request.
    Idle,
    /// The worker is running the model.
    Processing,
}

impl EngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Processing => "processing",
        }
    }
}

/// Output of one generation call together with its telemetry.
#[derive(Debug)]
pub struct EngineResponse {
    /// Identifier assigned when the request was scheduled.
    pub id: u64,
    /// Timestamp when the model started on this request.
    pub start_time: Instant,
    /// Time spent inside the model.
    pub duration: Duration,
    /// Text returned by the model, unmodified.
    pub text: String,
}

struct EngineJob {
    id: u64,
    image: NormalizedImage,
    prompt: String,
    // the caller stops waiting after this instant
    deadline: Option<Instant>,
    reply: mpsc::Sender<Result<EngineResponse, String>>,
}

/// Owns a [`GenerationModel`] on a dedicated worker thread.
///
/// Requests from any number of callers are queued and run one at a time, so
/// access to the model is serialized. Each caller blocks on its own reply
/// channel, optionally bounded by a timeout.
pub struct GenerationEngine {
    state: Arc<Mutex<EngineState>>,
    req_tx: Option<mpsc::Sender<EngineJob>>,
    worker: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl GenerationEngine {
    /// Creates a new engine, moving `model` onto a background worker thread.
    pub fn new<M: GenerationModel + Send + 'static>(mut model: M) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<EngineJob>();
        let state = Arc::new(Mutex::new(EngineState::Idle));

        let worker = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(job) = req_rx.recv() {
                    if job.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        log::debug!("Skipping inference #{}: caller timed out", job.id);
                        continue;
                    }

                    log::debug!("Running inference #{}", job.id);

                    set_state(&state, EngineState::Processing);
                    let start_time = Instant::now();

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        model.generate(&job.image, &job.prompt)
                    }));

                    let result = match outcome {
                        Ok(Ok(text)) => {
                            let duration = start_time.elapsed();
                            log::debug!("Inference #{} completed in {:?}", job.id, duration);
                            Ok(EngineResponse {
                                id: job.id,
                                start_time,
                                duration,
                                text,
                            })
                        }
                        Ok(Err(e)) => {
                            log::error!("Inference #{} failed: {}", job.id, e);
                            Err(e.to_string())
                        }
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            log::error!("Inference #{} panicked: {}", job.id, message);
                            Err(format!("model panicked: {message}"))
                        }
                    };

                    set_state(&state, EngineState::Idle);

                    // the caller may have timed out and dropped its receiver
                    let _ = job.reply.send(result);
                }
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            worker: Some(worker),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns the current state of the engine.
    pub fn state(&self) -> EngineState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs the model on `image` and `prompt`, blocking until it answers.
    ///
    /// With `timeout` set, gives up after that long with [`AnalyzerError::Timeout`];
    /// a request still queued when its caller gives up is skipped by the worker,
    /// one already running finishes and its output is discarded.
    pub fn generate(
        &self,
        image: NormalizedImage,
        prompt: String,
        timeout: Option<Duration>,
    ) -> Result<EngineResponse, AnalyzerError> {
        let tx = self.req_tx.as_ref().ok_or(AnalyzerError::EngineStopped)?;
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = mpsc::channel();
        let deadline = timeout.map(|limit| Instant::now() + limit);

        tx.send(EngineJob {
            id,
            image,
            prompt,
            deadline,
            reply: reply_tx,
        })
        .map_err(|_| AnalyzerError::EngineStopped)?;
        log::debug!("Scheduled inference #{id}");

        let reply = match timeout {
            Some(limit) => reply_rx.recv_timeout(limit).map_err(|e| match e {
                mpsc::RecvTimeoutError::Timeout => AnalyzerError::Timeout(limit),
                mpsc::RecvTimeoutError::Disconnected => AnalyzerError::EngineStopped,
            })?,
            None => reply_rx.recv().map_err(|_| AnalyzerError::EngineStopped)?,
        };

        reply.map_err(AnalyzerError::Model)
    }

    /// Stops the engine and waits for the worker to drain queued requests.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GenerationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn set_state(state: &Mutex<EngineState>, next: EngineState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
