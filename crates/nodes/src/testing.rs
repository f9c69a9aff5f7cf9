//! Scripted [`TextGenerator`] for stage and executor tests.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature, for
//! the integration tests under `tests/`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pipeline::{GenerationError, GenerationRequest, Stage, TextGenerator};

type Handler = Box<dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Generator scripted per stage. Queued replies are consumed first, in order;
/// then the stage's handler answers, if one is set. Otherwise the call fails
/// with `NotConfigured`.
#[derive(Default)]
pub struct ScriptedGenerator {
    queued: Mutex<HashMap<Stage, VecDeque<Result<String, GenerationError>>>>,
    handlers: HashMap<Stage, Handler>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reply(self, stage: Stage, text: &str) -> Self {
        self.queue(stage, Ok(text.to_string()))
    }

    #[must_use]
    pub fn fail(self, stage: Stage, error: GenerationError) -> Self {
        self.queue(stage, Err(error))
    }

    fn queue(self, stage: Stage, reply: Result<String, GenerationError>) -> Self {
        locked(&self.queued).entry(stage).or_default().push_back(reply);
        self
    }

    /// Answers every unqueued call for `stage` with `handler`.
    #[must_use]
    pub fn handle<F>(mut self, stage: Stage, handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        self.handlers.insert(stage, Box::new(handler));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        locked(&self.requests).clone()
    }

    pub fn requests_for(&self, stage: Stage) -> Vec<GenerationRequest> {
        locked(&self.requests)
            .iter()
            .filter(|r| r.stage == stage)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.requests).push(request.clone());
        let queued = locked(&self.queued)
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }
        match self.handlers.get(&request.stage) {
            Some(handler) => handler(&request),
            None => Err(GenerationError::NotConfigured(format!(
                "no reply for {}",
                request.stage
            ))),
        }
    }
}
