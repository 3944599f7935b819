//! one chat session = one entity with a [`HelpDeskSession`].
//!
//! lifecycle: [`spawn_session`] creates it (the credential is looked up in
//! the secret store on the next frame), [`SessionInput`] events mutate it,
//! [`end_session`] drops it together with its transcript.

use bevy::prelude::*;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use crate::bridge::TokioRt;
use crate::bridge::{spawn_completion, BackendFactory, CompletionBackend, StreamInbox};
use crate::config::HelpDeskConfig;
use crate::credential::{resolve_credential, Credential, CredentialSource, Secrets};
use crate::department::CREDENTIAL_PROMPT;
use crate::error::HelpDeskError;
use crate::quick::QuickAction;
use crate::transcript::{Message, Transcript};
use crate::{CompletionStarted, Notice, SessionAction, SessionInput, SessionNotice};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    AwaitingInput,
    AwaitingCompletion,
}

#[derive(Component)]
pub struct HelpDeskSession {
    transcript: Transcript,
    phase: SessionPhase,
    backend: Option<Arc<dyn CompletionBackend>>,
    credential_source: Option<CredentialSource>,
}

/// what a submission turned into.
pub(crate) enum Turn {
    Start {
        backend: Arc<dyn CompletionBackend>,
        messages: Vec<Message>,
    },
    Rejected(Notice),
    Ignored,
}

impl HelpDeskSession {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::new(system_prompt),
            phase: SessionPhase::AwaitingInput,
            backend: None,
            credential_source: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// false until a credential has been resolved and a backend built.
    pub fn has_credential(&self) -> bool {
        self.backend.is_some()
    }

    pub fn credential_source(&self) -> Option<CredentialSource> {
        self.credential_source
    }

    pub(crate) fn install_backend(&mut self, backend: Arc<dyn CompletionBackend>, source: CredentialSource) {
        self.backend = Some(backend);
        self.credential_source = Some(source);
    }

    /// appends the user message and hands back what the bridge needs.
    /// nothing is appended when the turn cannot start.
    pub(crate) fn begin_turn(&mut self, text: &str) -> Turn {
        if text.trim().is_empty() {
            return Turn::Ignored;
        }
        let Some(backend) = self.backend.clone() else {
            return Turn::Rejected(Notice::CredentialRequired);
        };
        if self.phase == SessionPhase::AwaitingCompletion {
            return Turn::Rejected(Notice::Busy);
        }
        self.transcript.push_user(text);
        self.phase = SessionPhase::AwaitingCompletion;
        Turn::Start { backend, messages: self.transcript.messages().to_vec() }
    }

    /// leave `AwaitingCompletion`; append the reply when there is one.
    pub(crate) fn finish_turn(&mut self, reply: Option<&str>) {
        if let Some(text) = reply {
            self.transcript.push_assistant(text);
        }
        self.phase = SessionPhase::AwaitingInput;
    }

    #[cfg(test)]
    pub(crate) fn awaiting(system_prompt: &str, question: &str) -> Self {
        let mut s = Self::new(system_prompt);
        s.transcript.push_user(question);
        s.phase = SessionPhase::AwaitingCompletion;
        s
    }
}

pub fn spawn_session(commands: &mut Commands, config: &HelpDeskConfig) -> Entity {
    let e = commands.spawn(HelpDeskSession::new(config.system_prompt.clone())).id();
    info!(target: "bevy_helpdesk", "session created: {:?}", e);
    e
}

pub fn end_session(commands: &mut Commands, entity: Entity) {
    info!(target: "bevy_helpdesk", "session ended: {:?}", entity);
    commands.entity(entity).despawn();
}

/// helper to submit chat-box text on a session entity.
pub fn submit_text(commands: &mut Commands, target: Entity, text: impl Into<String>) {
    commands.send_event(SessionInput { entity: target, action: SessionAction::SubmitText(text.into()) });
}

pub fn press_quick_action(commands: &mut Commands, target: Entity, action: QuickAction) {
    commands.send_event(SessionInput { entity: target, action: SessionAction::QuickAction(action) });
}

pub fn enter_credential(commands: &mut Commands, target: Entity, secret: impl Into<String>) {
    commands.send_event(SessionInput { entity: target, action: SessionAction::EnterCredential(secret.into()) });
}

impl Notice {
    /// inline text for the ui.
    pub fn message(&self) -> String {
        match self {
            Notice::CredentialRequired => CREDENTIAL_PROMPT.to_string(),
            Notice::Ready => "API key lista.".to_string(),
            Notice::Busy => "Espera a que termine la respuesta actual.".to_string(),
            Notice::BackendUnavailable(e) => format!("No se pudo configurar el servicio: {e}"),
        }
    }
}

/// builds the backend for a freshly resolved credential and reports the outcome.
fn install_credential(
    entity: Entity,
    session: &mut HelpDeskSession,
    resolved: Result<(Credential, CredentialSource), HelpDeskError>,
    config: &HelpDeskConfig,
    factory: &BackendFactory,
) -> Notice {
    let (credential, source) = match resolved {
        Ok(r) => r,
        Err(err) => {
            info!(target: "bevy_helpdesk", "session {:?}: {}", entity, err);
            return Notice::CredentialRequired;
        }
    };
    match factory.build(config, &credential, session.transcript.system_prompt()) {
        Ok(backend) => {
            info!(target: "bevy_helpdesk", "session {:?}: credential resolved ({:?})", entity, source);
            session.install_backend(backend, source);
            Notice::Ready
        }
        Err(err) => {
            error!(target: "bevy_helpdesk", "session {:?}: {}", entity, err);
            Notice::BackendUnavailable(err.to_string())
        }
    }
}

/// one secret-store lookup per new session.
pub(crate) fn resolve_new_sessions(
    mut q: Query<(Entity, &mut HelpDeskSession), Added<HelpDeskSession>>,
    secrets: Res<Secrets>,
    config: Res<HelpDeskConfig>,
    factory: Res<BackendFactory>,
    mut ev_notice: EventWriter<SessionNotice>,
) {
    for (entity, mut session) in &mut q {
        let resolved = resolve_credential(secrets.0.as_ref(), &config.secret_name, None);
        let notice = install_credential(entity, &mut session, resolved, &config, &factory);
        ev_notice.write(SessionNotice { entity, notice });
    }
}

/// routes submit-text / click-button / credential events to their session.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dispatch_session_input(
    mut ev_in: EventReader<SessionInput>,
    mut sessions: Query<&mut HelpDeskSession>,
    secrets: Res<Secrets>,
    config: Res<HelpDeskConfig>,
    factory: Res<BackendFactory>,
    inbox: Res<StreamInbox>,
    mut ev_notice: EventWriter<SessionNotice>,
    mut ev_start: EventWriter<CompletionStarted>,

    // native-only: small runtime to drive network futures from `llm`
    #[cfg(not(target_arch = "wasm32"))] rt: Res<TokioRt>,
) {
    for SessionInput { entity, action } in ev_in.read() {
        let entity = *entity;
        let Ok(mut session) = sessions.get_mut(entity) else {
            warn!(target: "bevy_helpdesk", "input for unknown session {:?} dropped", entity);
            continue;
        };

        let text = match action {
            SessionAction::EnterCredential(secret) => {
                if session.has_credential() {
                    debug!(target: "bevy_helpdesk", "session {:?} already has a credential", entity);
                    continue;
                }
                let resolved = resolve_credential(secrets.0.as_ref(), &config.secret_name, Some(secret.as_str()));
                let notice = install_credential(entity, &mut session, resolved, &config, &factory);
                ev_notice.write(SessionNotice { entity, notice });
                continue;
            }
            SessionAction::SubmitText(text) => text.as_str(),
            SessionAction::QuickAction(action) => {
                info!(target: "bevy_helpdesk", "quick action {:?} on {:?}", action, entity);
                action.prompt()
            }
        };

        match session.begin_turn(text) {
            Turn::Ignored => {}
            Turn::Rejected(notice) => {
                info!(target: "bevy_helpdesk", "session {:?}: turn rejected ({:?})", entity, notice);
                ev_notice.write(SessionNotice { entity, notice });
            }
            Turn::Start { backend, messages } => {
                info!(
                    target: "bevy_helpdesk",
                    "completion start: entity={:?} msgs={} (user_len={})",
                    entity, messages.len(), text.len()
                );
                ev_start.write(CompletionStarted { entity });
                #[cfg(not(target_arch = "wasm32"))]
                spawn_completion(entity, backend, messages, &inbox, &rt);
                #[cfg(target_arch = "wasm32")]
                spawn_completion(entity, backend, messages, &inbox);
            }
        }
    }
}
