//! bevy_helpdesk: a department help-desk chat as a bevy plugin.
//!
//! - one session = one entity carrying a [`HelpDeskSession`]; its transcript
//!   starts with a fixed system instruction and only ever grows.
//! - the api key comes from a secret store ([`Secrets`]) or manual entry;
//!   without one, nothing reaches the network.
//! - each turn sends the whole transcript to an openai-compatible endpoint
//!   through the `llm` crate, streams deltas back as bevy events and appends
//!   the assembled reply.
//! - never blocks the main thread: on native we spawn onto a tiny tokio
//!   runtime; on wasm we use bevy's async pool.
//!
//! drive a session by writing [`SessionInput`] events (or use
//! [`submit_text`], [`press_quick_action`], [`enter_credential`]) and read
//! the `Completion*` / [`SessionNotice`] events after [`HelpDeskSet::Drain`].

use bevy::app::AppExit;
use bevy::prelude::*;

pub mod bridge;
pub mod config;
pub mod credential;
pub mod department;
pub mod error;
pub mod quick;
pub mod scripted;
pub mod session;
pub mod transcript;

#[cfg(not(target_arch = "wasm32"))]
pub use bridge::TokioRt;
pub use bridge::{BackendFactory, CompletionBackend, FragmentStream, LlmBackend};
pub use config::{FailurePolicy, HelpDeskConfig};
pub use credential::{
    resolve_credential, ChainedSecrets, Credential, CredentialSource, EnvSecrets, SecretSource,
    Secrets, StaticSecrets, TomlSecrets,
};
pub use department::{DepartmentInfo, DEPARTMENT};
pub use error::{HelpDeskError, Result};
pub use quick::QuickAction;
pub use scripted::ScriptedBackend;
pub use session::{
    end_session, enter_credential, press_quick_action, spawn_session, submit_text,
    HelpDeskSession, SessionPhase,
};
pub use transcript::{render_transcript, Message, Role, Transcript};

/// system ordering so uis can run after we emit events
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum HelpDeskSet {
    /// credential resolution + input routing; completions start here
    Dispatch,
    /// streamed output is folded into sessions and emitted as events
    Drain,
}

/// the three things a user can do to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    SubmitText(String),
    QuickAction(QuickAction),
    /// masked-field entry; only used when the secret store had nothing.
    EnterCredential(String),
}

#[derive(Event, Clone, Debug)]
pub struct SessionInput {
    pub entity: Entity,
    pub action: SessionAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// no key yet; the session is halted until one is entered.
    CredentialRequired,
    Ready,
    /// a reply is still streaming for this session.
    Busy,
    BackendUnavailable(String),
}

#[derive(Event, Clone, Debug)]
pub struct SessionNotice {
    pub entity: Entity,
    pub notice: Notice,
}

#[derive(Event, Debug)]
pub struct CompletionStarted {
    pub entity: Entity,
}
#[derive(Event, Debug)]
pub struct CompletionDelta {
    pub entity: Entity,
    pub text: String,
}
#[derive(Event, Debug)]
pub struct CompletionFinished {
    pub entity: Entity,
    /// everything streamed, concatenated; also appended to the transcript.
    pub text: String,
}
#[derive(Event, Debug)]
pub struct CompletionFailed {
    pub entity: Entity,
    pub error: HelpDeskError,
}

/// bevy plugin: wires systems, events, resources.
///
/// `HelpDeskConfig`, `Secrets` and `BackendFactory` get defaults unless
/// inserted beforehand. on native, also inserts a tiny tokio runtime.
pub struct HelpDeskPlugin;

impl Plugin for HelpDeskPlugin {
    fn build(&self, app: &mut App) {
        info!(target: "bevy_helpdesk", "HelpDeskPlugin: build()");
        app.init_resource::<bridge::StreamInbox>()
            .init_resource::<HelpDeskConfig>()
            .init_resource::<Secrets>()
            .init_resource::<BackendFactory>()
            .add_event::<SessionInput>()
            .add_event::<SessionNotice>()
            .add_event::<CompletionStarted>()
            .add_event::<CompletionDelta>()
            .add_event::<CompletionFinished>()
            .add_event::<CompletionFailed>()
            .add_event::<AppExit>()
            .configure_sets(Update, (HelpDeskSet::Dispatch, HelpDeskSet::Drain).chain())
            .add_systems(
                Update,
                (session::resolve_new_sessions, session::dispatch_session_input)
                    .chain()
                    .in_set(HelpDeskSet::Dispatch),
            )
            .add_systems(Update, bridge::drain_completion_inbox.in_set(HelpDeskSet::Drain));

        #[cfg(not(target_arch = "wasm32"))]
        if app.world().get_resource::<TokioRt>().is_none() {
            app.insert_resource(TokioRt::new().expect("tokio runtime"));
        }
    }
}
