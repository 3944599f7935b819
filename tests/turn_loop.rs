use bevy::prelude::*;
use bevy_helpdesk::{
    BackendFactory, CompletionBackend, CompletionFailed, HelpDeskConfig, HelpDeskError,
    HelpDeskPlugin, HelpDeskSession, Message, Notice, Role, ScriptedBackend, Secrets,
    SessionAction, SessionInput, SessionNotice, SessionPhase, StaticSecrets, render_transcript,
    spawn_session,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn app_with(secrets: StaticSecrets, backend: Arc<ScriptedBackend>) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(Secrets::new(secrets));
    app.insert_resource(BackendFactory::new(move |_, _, _| {
        Ok(backend.clone() as Arc<dyn CompletionBackend>)
    }));
    app.add_plugins(HelpDeskPlugin);
    app
}

fn new_session(app: &mut App) -> Entity {
    let config = app.world().resource::<HelpDeskConfig>().clone();
    let e = {
        let mut commands = app.world_mut().commands();
        spawn_session(&mut commands, &config)
    };
    app.world_mut().flush();
    app.update();
    e
}

fn session(app: &App, e: Entity) -> &HelpDeskSession {
    app.world().entity(e).get::<HelpDeskSession>().expect("session")
}

fn submit(app: &mut App, e: Entity, text: &str) {
    app.world_mut().send_event(SessionInput {
        entity: e,
        action: SessionAction::SubmitText(text.to_string()),
    });
    app.update();
}

fn wait_idle(app: &mut App, e: Entity) {
    for _ in 0..500 {
        if session(app, e).phase() == SessionPhase::AwaitingInput {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
        app.update();
    }
    panic!("turn never finished");
}

#[test]
fn empty_credential_then_question_never_calls_out() {
    let backend = Arc::new(ScriptedBackend::fragments(["nunca"]));
    let mut app = app_with(StaticSecrets::default(), backend.clone());
    let e = new_session(&mut app);

    app.world_mut().send_event(SessionInput {
        entity: e,
        action: SessionAction::EnterCredential(String::new()),
    });
    submit(&mut app, e, "¿Cómo inscribir un curso?");

    let notices: Vec<Notice> = app
        .world_mut()
        .resource_mut::<Events<SessionNotice>>()
        .drain()
        .map(|n| n.notice)
        .collect();
    assert!(notices.iter().all(|n| *n == Notice::CredentialRequired));
    assert_eq!(notices.len(), 3);
    assert_eq!(backend.calls(), 0);
    assert_eq!(session(&app, e).transcript().len(), 1);
}

#[test]
fn valid_credential_question_gets_one_user_then_one_assistant() {
    let backend = Arc::new(ScriptedBackend::fragments([
        "Ingresa al SIA ",
        "en las fechas del calendario académico.",
    ]));
    let mut app = app_with(
        StaticSecrets::default().with("OPENAI_API_KEY", "sk-test"),
        backend.clone(),
    );
    let e = new_session(&mut app);

    submit(&mut app, e, "¿Cómo inscribir un curso?");
    wait_idle(&mut app, e);

    let t = session(&app, e).transcript();
    assert_eq!(
        t.messages()[1..].to_vec(),
        vec![
            Message::user("¿Cómo inscribir un curso?"),
            Message::assistant("Ingresa al SIA en las fechas del calendario académico."),
        ]
    );
    assert_eq!(t.messages()[0].role, Role::System);
    assert!(!render_transcript(t).contains(t.system_prompt()));
    assert_eq!(backend.calls(), 1);
}

#[test]
fn failed_call_keeps_user_message_and_reports_inline() {
    let backend = Arc::new(ScriptedBackend::broken_after(["Hola, "], "connection reset"));
    let mut app = app_with(
        StaticSecrets::default().with("OPENAI_API_KEY", "sk-test"),
        backend,
    );
    let e = new_session(&mut app);

    submit(&mut app, e, "¿Dónde está ubicado el departamento?");
    let mut failures = Vec::new();
    for _ in 0..500 {
        failures.extend(
            app.world_mut()
                .resource_mut::<Events<CompletionFailed>>()
                .drain()
                .map(|f| f.error),
        );
        if !failures.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
        app.update();
    }

    assert_eq!(failures, vec![HelpDeskError::Provider("connection reset".into())]);
    let s = session(&app, e);
    assert_eq!(s.phase(), SessionPhase::AwaitingInput);
    assert_eq!(s.transcript().len(), 2);
    assert_eq!(s.transcript().last().role, Role::User);
}

#[test]
fn conversation_history_is_sent_in_order() {
    let backend = Arc::new(ScriptedBackend::fragments(["ok"]));
    let mut app = app_with(
        StaticSecrets::default().with("OPENAI_API_KEY", "sk-test"),
        backend.clone(),
    );
    let e = new_session(&mut app);

    submit(&mut app, e, "uno");
    wait_idle(&mut app, e);
    submit(&mut app, e, "dos");
    wait_idle(&mut app, e);

    let sent: Vec<(Role, String)> = backend
        .last_messages()
        .into_iter()
        .map(|m| (m.role, m.content))
        .collect();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].0, Role::System);
    assert_eq!(
        sent[1..].to_vec(),
        vec![
            (Role::User, "uno".to_string()),
            (Role::Assistant, "ok".to_string()),
            (Role::User, "dos".to_string()),
        ]
    );
    assert_eq!(session(&app, e).transcript().len(), 5);
}
