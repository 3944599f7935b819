//! completion bridge: ships a transcript to the remote model, streams the
//! reply back through a bounded inbox and folds the result into the session.
//!
//! never blocks the main thread: on native the request runs on a tiny tokio
//! runtime (no bevy pool blocking); on wasm it runs on bevy's async pool,
//! which yields to the browser/event loop.

use async_trait::async_trait;
use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use flume::{Receiver, Sender, TryRecvError};
use futures_lite::{Stream, StreamExt};
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider, StreamChoice, StreamDelta, StreamResponse};
use llm::LLMProvider;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{FailurePolicy, HelpDeskConfig};
use crate::credential::Credential;
use crate::error::{HelpDeskError, Result};
use crate::session::HelpDeskSession;
use crate::transcript::{Message, Role};
use crate::{CompletionDelta, CompletionFailed, CompletionFinished};

/// text fragments in arrival order; ends with the remote stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// anything that can turn a transcript into a stream of text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// `messages` is the full transcript, system message first.
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream>;
}

/// `llm` crate provider with the system instruction baked into the builder.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// openai-compatible provider: fixed model + temperature from `config`.
    pub fn build(config: &HelpDeskConfig, credential: &Credential, system_prompt: &str) -> Result<Self> {
        info!(
            target: "bevy_helpdesk",
            "build_provider: base_url='{}', model='{}', temperature={}",
            config.base_url, config.model, config.temperature
        );
        let provider = LLMBuilder::new()
            .backend(LLMBackend::OpenAI)
            .base_url(config.provider_base_url())
            .api_key(credential.expose().to_string())
            .model(config.model.clone())
            .temperature(config.temperature)
            .system(system_prompt.to_string())
            .build()
            .map_err(|e| HelpDeskError::Build(e.to_string()))?;
        Ok(Self::new(provider.into()))
    }
}

/// system entries travel through the builder, the rest as chat messages.
fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(ChatMessage::user().content(m.content.clone()).build()),
            Role::Assistant => Some(ChatMessage::assistant().content(m.content.clone()).build()),
        })
        .collect()
}

fn response_text(resp: StreamResponse) -> String {
    let StreamResponse { choices, .. } = resp;
    let mut out = String::new();
    for StreamChoice { delta: StreamDelta { content, .. } } in choices {
        if let Some(txt) = content {
            out.push_str(&txt);
        }
    }
    out
}

#[async_trait]
impl CompletionBackend for LlmBackend {
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        let chat = to_chat_messages(messages);
        let s = self.provider.chat_stream_struct(&chat).await?;
        Ok(Box::pin(s.map(|item| item.map(response_text).map_err(HelpDeskError::from))))
    }
}

type BuildFn = dyn Fn(&HelpDeskConfig, &Credential, &str) -> Result<Arc<dyn CompletionBackend>> + Send + Sync;

/// turns a resolved credential into a session backend.
/// the default builds an [`LlmBackend`]; tests swap in scripted ones.
#[derive(Resource, Clone)]
pub struct BackendFactory(Arc<BuildFn>);

impl BackendFactory {
    pub fn new(
        f: impl Fn(&HelpDeskConfig, &Credential, &str) -> Result<Arc<dyn CompletionBackend>> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    pub fn build(
        &self,
        config: &HelpDeskConfig,
        credential: &Credential,
        system_prompt: &str,
    ) -> Result<Arc<dyn CompletionBackend>> {
        (self.0)(config, credential, system_prompt)
    }
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new(|config, credential, system_prompt| {
            let backend = LlmBackend::build(config, credential, system_prompt)?;
            Ok(Arc::new(backend) as Arc<dyn CompletionBackend>)
        })
    }
}

/// on native we keep a tiny tokio runtime to drive `llm` futures.
/// we spawn onto this rt from compute tasks so neither the main thread
/// nor bevy's compute pools block.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct TokioRt(pub Arc<tokio::runtime::Runtime>);

#[cfg(not(target_arch = "wasm32"))]
impl TokioRt {
    pub fn new() -> std::io::Result<Self> {
        info!(target: "bevy_helpdesk", "initializing tokio multi-thread runtime (native)");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        Ok(Self(Arc::new(rt)))
    }
}

/// cross-thread inbox; producers send, main thread drains.
/// bounded to avoid unbounded growth when the frame stalls briefly.
#[derive(Resource, Clone)]
pub(crate) struct StreamInbox {
    pub(crate) tx: Sender<StreamMsg>,
    rx: Receiver<StreamMsg>,
}

impl Default for StreamInbox {
    fn default() -> Self {
        let (tx, rx) = flume::bounded(2048);
        Self { tx, rx }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum StreamMsg {
    Begin { entity: Entity },
    Delta { entity: Entity, text: String },
    Done { entity: Entity, text: String },
    Err { entity: Entity, error: HelpDeskError },
}

/// send to inbox (ignore disconnected)
fn push_inbox(tx: &Sender<StreamMsg>, msg: StreamMsg) {
    let _ = tx.send(msg);
}

// coalesce tiny deltas to ~60hz or >=64 chars
const MIN_CHARS: usize = 64;
const MAX_LATENCY: Duration = Duration::from_millis(16);

/// one request, start to finish. the full text only leaves through `Done`.
pub(crate) async fn run_completion(
    backend: Arc<dyn CompletionBackend>,
    messages: Vec<Message>,
    entity: Entity,
    tx: Sender<StreamMsg>,
) {
    let mut s = match backend.stream(&messages).await {
        Ok(s) => s,
        Err(error) => {
            error!(target: "bevy_helpdesk", "completion request failed: {}", error);
            push_inbox(&tx, StreamMsg::Err { entity, error });
            return;
        }
    };
    push_inbox(&tx, StreamMsg::Begin { entity });

    let mut full = String::new();
    let mut buf = String::new();
    let mut last_flush = Instant::now();
    while let Some(item) = s.next().await {
        match item {
            Ok(txt) => {
                if txt.is_empty() {
                    continue;
                }
                full.push_str(&txt);
                buf.push_str(&txt);
                let now = Instant::now();
                if buf.len() >= MIN_CHARS || now.duration_since(last_flush) >= MAX_LATENCY {
                    let chunk = std::mem::take(&mut buf);
                    push_inbox(&tx, StreamMsg::Delta { entity, text: chunk });
                    last_flush = now;
                }
            }
            Err(error) => {
                error!(target: "bevy_helpdesk", "streaming error after {} chars: {}", full.len(), error);
                // flush whatever we buffered before error
                if !buf.is_empty() {
                    push_inbox(&tx, StreamMsg::Delta { entity, text: std::mem::take(&mut buf) });
                }
                push_inbox(&tx, StreamMsg::Err { entity, error });
                return;
            }
        }
    }
    if !buf.is_empty() {
        push_inbox(&tx, StreamMsg::Delta { entity, text: buf });
    }
    info!(target: "bevy_helpdesk", "stream completed: final_len={}", full.len());
    push_inbox(&tx, StreamMsg::Done { entity, text: full });
}

/// hand one request to the async machinery.
pub(crate) fn spawn_completion(
    entity: Entity,
    backend: Arc<dyn CompletionBackend>,
    messages: Vec<Message>,
    inbox: &StreamInbox,
    #[cfg(not(target_arch = "wasm32"))] rt: &TokioRt,
) {
    let tx = inbox.tx.clone();
    let run = run_completion(backend, messages, entity, tx);
    let pool = AsyncComputeTaskPool::get();

    #[cfg(target_arch = "wasm32")]
    {
        // wasm path: just await directly (no tokio).
        pool.spawn(run).detach();
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        // native: hand off to tokio so bevy pools stay free.
        let rt = rt.0.clone();
        pool.spawn(async move {
            let _ = rt.spawn(run).await;
        })
        .detach();
    }
}

/// drains the inbox, updates sessions and emits user-facing events.
pub(crate) fn drain_completion_inbox(
    inbox: Res<StreamInbox>,
    config: Res<HelpDeskConfig>,
    mut sessions: Query<&mut HelpDeskSession>,
    mut ev_delta: EventWriter<CompletionDelta>,
    mut ev_done: EventWriter<CompletionFinished>,
    mut ev_err: EventWriter<CompletionFailed>,
    mut ev_exit: EventWriter<AppExit>,
) {
    // drain up to a cap per frame to avoid long frames on bursty streams
    const MAX_PER_FRAME: usize = 512;
    let mut drained = Vec::with_capacity(64);
    for _ in 0..MAX_PER_FRAME {
        match inbox.rx.try_recv() {
            Ok(m) => drained.push(m),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    if drained.is_empty() {
        return;
    }

    // aggregate deltas per entity so ui applies a single push per entity per frame
    let mut delta_map: HashMap<Entity, String> = HashMap::new();
    let mut dones: Vec<(Entity, String)> = Vec::new();
    let mut errs: Vec<(Entity, HelpDeskError)> = Vec::new();
    for msg in drained {
        match msg {
            StreamMsg::Begin { entity } => debug!(target: "bevy_helpdesk", "stream begin: {:?}", entity),
            StreamMsg::Delta { entity, text } => delta_map.entry(entity).or_default().push_str(&text),
            StreamMsg::Done { entity, text } => dones.push((entity, text)),
            StreamMsg::Err { entity, error } => errs.push((entity, error)),
        }
    }

    for (entity, text) in delta_map {
        ev_delta.write(CompletionDelta { entity, text });
    }
    // ensure deltas land before "done" for the same frame
    for (entity, text) in dones {
        let Ok(mut session) = sessions.get_mut(entity) else {
            debug!(target: "bevy_helpdesk", "completion for ended session {:?} dropped", entity);
            continue;
        };
        session.finish_turn(Some(&text));
        ev_done.write(CompletionFinished { entity, text });
    }
    for (entity, error) in errs {
        if let Ok(mut session) = sessions.get_mut(entity) {
            // no partial assistant message: the turn is discarded.
            session.finish_turn(None);
        }
        match config.failure_policy {
            FailurePolicy::Report => {
                warn!(target: "bevy_helpdesk", "turn discarded for {:?}: {}", entity, error);
                ev_err.write(CompletionFailed { entity, error });
            }
            FailurePolicy::Propagate => {
                error!(target: "bevy_helpdesk", "unrecovered completion failure for {:?}: {}", entity, error);
                ev_exit.write(AppExit::error());
            }
        }
    }
}
