//! Test doubles shared by the fan-out and orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::credentials::ApiKey;
use crate::gemini::{GeminiError, ImageGenerator};
use crate::media::ImagePayload;
use crate::request::{GenerationOptions, GenerationRequest, GenerationTemplate, ReferenceSubject};

#[derive(Debug, Clone)]
pub enum Reply {
    Image(&'static str),
    Empty,
    Fail,
    /// Never resolves within any test timeout.
    Hang,
}

pub fn png(tag: &str) -> ImagePayload {
    ImagePayload::new("image/png", tag.as_bytes().to_vec())
}

/// Scriptable [`ImageGenerator`]. Replies come from the call script first,
/// then from per-prompt replies, then from the default.
pub struct MockGenerator {
    default: Reply,
    by_prompt: HashMap<String, Reply>,
    script: Mutex<VecDeque<(Duration, Reply)>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(default: Reply) -> Self {
        Self {
            default,
            by_prompt: HashMap::new(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on_prompt(mut self, prompt: &str, reply: Reply) -> Self {
        self.by_prompt.insert(prompt.to_string(), reply);
        self
    }

    pub fn script(self, replies: Vec<(Duration, Reply)>) -> Self {
        *self.script.lock() = replies.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ImageGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<ImagePayload>, GeminiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (delay, reply) = match self.script.lock().pop_front() {
            Some(step) => step,
            None => (
                Duration::ZERO,
                self.by_prompt
                    .get(request.prompt())
                    .cloned()
                    .unwrap_or_else(|| self.default.clone()),
            ),
        };

        // Always yield so sibling branches get a chance to start.
        tokio::time::sleep(delay).await;
        tokio::task::yield_now().await;

        match reply {
            Reply::Image(tag) => Ok(Some(png(tag))),
            Reply::Empty => Ok(None),
            Reply::Fail => Err(GeminiError::ApiError {
                status: 500,
                message: "mock error".into(),
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

/// A valid template with one bound subject and scene usage off.
pub fn template() -> GenerationTemplate {
    let mut subject = ReferenceSubject::new(1, "Batman");
    subject.bind_image(png("batman-ref"));
    let options = GenerationOptions {
        use_scene: false,
        ..Default::default()
    };
    GenerationTemplate::build(&[subject], None, &options, Some(&ApiKey::new("test-key")))
        .expect("fixture template is valid")
}
