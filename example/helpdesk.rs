//! help-desk window for the math department.
//! - sidebar with the department contact card.
//! - masked api key field (skipped when `secrets.toml` / env already has it).
//! - chat box + three quick-question buttons.
//! - replies stream in below the transcript; errors show inline.
//!
//! env:
//!   OPENAI_API_KEY          (key; optional, can be typed in the window)
//!   LLM_BASE_URL            (default https://api.openai.com)
//!   LLM_MODEL               (default gpt-3.5-turbo)
//!   HELPDESK_FAILURE_POLICY (report | propagate)
//!   HELPDESK_OFFLINE=1      (canned replies, no network)

use bevy::input::keyboard::{KeyCode, KeyboardInput};
use bevy::prelude::*;
use bevy_helpdesk::department::{INPUT_PLACEHOLDER, TITLE, WELCOME};
use bevy_helpdesk::{
    BackendFactory, CompletionBackend, CompletionDelta, CompletionFailed, CompletionFinished,
    CompletionStarted, DEPARTMENT, HelpDeskConfig, HelpDeskPlugin, HelpDeskSession, HelpDeskSet,
    Notice, QuickAction, ScriptedBackend, SessionNotice, enter_credential, press_quick_action,
    render_transcript, spawn_session, submit_text,
};
use std::sync::Arc;

// ---------------------- ui tags ----------------------

#[derive(Component)]
struct HistoryText;
#[derive(Component)]
struct StreamText;
#[derive(Component)]
struct PromptText;
#[derive(Component)]
struct ApiKeyText;
#[derive(Component)]
struct NoticeText;

#[derive(Component, Copy, Clone)]
struct QuickButton(QuickAction);

#[derive(Component, Copy, Clone)]
struct TargetSession(Entity);

// ---------------------- app state ----------------------

#[derive(Resource, Default)]
struct PromptBuf(String);

#[derive(Resource, Default)]
struct KeyBuf(String);

#[derive(Resource)]
struct Focus(FocusField);
impl Default for Focus {
    fn default() -> Self {
        Self(FocusField::ApiKey)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FocusField {
    ApiKey,
    Prompt,
}

const BTN_IDLE: Color = Color::srgb(0.2, 0.2, 0.25);
const BTN_HOVER: Color = Color::srgb(0.25, 0.25, 0.3);
const BTN_PRESSED: Color = Color::srgb(0.3, 0.3, 0.35);

// ---------------------- main ----------------------

fn main() {
    let config = HelpDeskConfig::from_env();
    let offline = std::env::var("HELPDESK_OFFLINE").is_ok_and(|v| v == "1");

    let mut app = App::new();
    app.insert_resource(ClearColor(Color::srgb_u8(18, 18, 20)))
        .insert_resource(config)
        .insert_resource(PromptBuf::default())
        .insert_resource(KeyBuf::default())
        .insert_resource(Focus::default());
    if offline {
        info!(target: "helpdesk", "offline mode: canned replies");
        app.insert_resource(BackendFactory::new(|_, _, _| {
            let canned = ScriptedBackend::fragments([
                "Modo sin conexión: ",
                "para trámites escribe a decanatura_matematicas@unal.edu.co ",
                "o visita el Edificio 404, Oficina 201.",
            ]);
            Ok(Arc::new(canned) as Arc<dyn CompletionBackend>)
        }));
    }
    app.add_plugins(DefaultPlugins)
        .add_plugins(HelpDeskPlugin)
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                handle_text_input,
                btn_quick,
                refresh_key_text,
                refresh_prompt_text,
            )
                .before(HelpDeskSet::Dispatch),
        )
        // event readers should run after bevy_helpdesk emits events
        .add_systems(
            Update,
            (on_notice, on_started, on_delta, on_done, on_error, refresh_history)
                .chain()
                .after(HelpDeskSet::Drain),
        )
        .run();
}

// ---------------------- setup ui ----------------------

fn setup(mut commands: Commands, config: Res<HelpDeskConfig>) {
    commands.spawn(Camera2d);

    let session = spawn_session(&mut commands, &config);

    let style_22 = TextFont { font_size: 22.0, ..default() };
    let style_16 = TextFont { font_size: 16.0, ..default() };
    let style_14 = TextFont { font_size: 14.0, ..default() };

    // root: [sidebar | main]
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Row,
                column_gap: Val::Px(12.0),
                padding: UiRect::all(Val::Px(12.0)),
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|p| {
            // --- sidebar ---
            p.spawn((
                Node {
                    width: Val::Percent(28.0),
                    height: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(8.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.10, 0.10, 0.12)),
            ))
            .with_children(|c| {
                c.spawn((
                    Text::new("Información del Departamento"),
                    style_16.clone(),
                    TextColor(Color::WHITE),
                ));
                c.spawn((
                    Text::new(DEPARTMENT.sidebar_text()),
                    style_14.clone(),
                    TextColor(Color::srgb_u8(190, 210, 255)),
                ));
            });

            // --- main column ---
            p.spawn((
                Node {
                    width: Val::Percent(72.0),
                    height: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(8.0),
                    ..default()
                },
                BackgroundColor(Color::NONE),
            ))
            .with_children(|c| {
                c.spawn((Text::new(TITLE), style_22.clone(), TextColor(Color::WHITE)));
                c.spawn((
                    Text::new(WELCOME),
                    style_14.clone(),
                    TextColor(Color::srgb_u8(200, 200, 200)),
                ));
                c.spawn((
                    Text::new("API key: "),
                    style_14.clone(),
                    TextColor(Color::WHITE),
                    ApiKeyText,
                ));
                c.spawn((
                    Text::new(""),
                    style_14.clone(),
                    TextColor(Color::srgb_u8(255, 210, 120)),
                    NoticeText,
                    TargetSession(session),
                ));
                c.spawn((
                    Text::new(""),
                    style_16.clone(),
                    TextColor(Color::WHITE),
                    HistoryText,
                    TargetSession(session),
                ));
                c.spawn((
                    Text::new(""),
                    style_16.clone(),
                    TextColor(Color::srgb_u8(200, 200, 200)),
                    StreamText,
                    TargetSession(session),
                ));
                c.spawn((
                    Text::new("> "),
                    style_14.clone(),
                    TextColor(Color::WHITE),
                    PromptText,
                ));

                c.spawn((
                    Text::new("Consultas rápidas:"),
                    style_14.clone(),
                    TextColor(Color::srgb_u8(160, 160, 160)),
                ));
                // row: one button per quick action
                c.spawn((
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Auto,
                        column_gap: Val::Px(8.0),
                        flex_direction: FlexDirection::Row,
                        ..default()
                    },
                    BackgroundColor(Color::NONE),
                ))
                .with_children(|row| {
                    for action in QuickAction::ALL {
                        row.spawn((
                            Button,
                            Node {
                                height: Val::Px(30.0),
                                padding: UiRect::axes(Val::Px(10.0), Val::Px(4.0)),
                                align_items: AlignItems::Center,
                                justify_content: JustifyContent::Center,
                                ..default()
                            },
                            BackgroundColor(BTN_IDLE),
                            QuickButton(action),
                            TargetSession(session),
                        ))
                        .with_children(|b| {
                            b.spawn((
                                Text::new(action.label()),
                                style_14.clone(),
                                TextColor(Color::WHITE),
                            ));
                        });
                    }
                });
            });
        });
}

// ---------------------- input & buttons ----------------------

fn handle_text_input(
    mut commands: Commands,
    mut ev_kbd: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    mut focus: ResMut<Focus>,
    mut key_buf: ResMut<KeyBuf>,
    mut prompt: ResMut<PromptBuf>,
    q_target: Query<&TargetSession, With<HistoryText>>,
) {
    // switch focus with tab
    if keys.just_pressed(KeyCode::Tab) {
        focus.0 = match focus.0 {
            FocusField::ApiKey => FocusField::Prompt,
            FocusField::Prompt => FocusField::ApiKey,
        };
        info!(target: "helpdesk", "focus -> {:?}", focus.0);
    }

    for ev in ev_kbd.read() {
        if !ev.state.is_pressed() {
            continue;
        }
        if let Some(txt) = &ev.text {
            let s: String = txt.chars().filter(|c| !c.is_control()).collect();
            match focus.0 {
                FocusField::ApiKey => key_buf.0.push_str(&s),
                FocusField::Prompt => prompt.0.push_str(&s),
            }
        }
    }

    if keys.just_pressed(KeyCode::Backspace) {
        match focus.0 {
            FocusField::ApiKey => {
                key_buf.0.pop();
            }
            FocusField::Prompt => {
                prompt.0.pop();
            }
        }
    }

    if keys.just_pressed(KeyCode::Enter) {
        let Ok(TargetSession(e)) = q_target.single() else {
            return;
        };
        match focus.0 {
            FocusField::ApiKey => {
                info!(target: "helpdesk", "enter (api key) -> key_present={}", !key_buf.0.is_empty());
                enter_credential(&mut commands, *e, key_buf.0.clone());
                focus.0 = FocusField::Prompt;
            }
            FocusField::Prompt => {
                let msg = std::mem::take(&mut prompt.0);
                submit_text(&mut commands, *e, msg);
            }
        }
    }
}

fn btn_quick(
    mut commands: Commands,
    mut q: Query<
        (&Interaction, &QuickButton, &TargetSession, &mut BackgroundColor),
        Changed<Interaction>,
    >,
) {
    for (i, QuickButton(action), TargetSession(e), mut bg) in &mut q {
        match *i {
            Interaction::Pressed => {
                bg.0 = BTN_PRESSED;
                press_quick_action(&mut commands, *e, *action);
            }
            Interaction::Hovered => bg.0 = BTN_HOVER,
            Interaction::None => bg.0 = BTN_IDLE,
        }
    }
}

// ---------------------- text refresh ----------------------

fn refresh_key_text(
    key_buf: Res<KeyBuf>,
    focus: Res<Focus>,
    mut q: Query<&mut Text, With<ApiKeyText>>,
) {
    if key_buf.is_changed() || focus.is_changed() {
        if let Ok(mut t) = q.single_mut() {
            let caret = if matches!(focus.0, FocusField::ApiKey) { " |" } else { "" };
            // masked: never echo the key
            let masked = "*".repeat(key_buf.0.chars().count());
            t.0 = format!("API key: {}{}", masked, caret);
        }
    }
}

fn refresh_prompt_text(
    prompt: Res<PromptBuf>,
    focus: Res<Focus>,
    mut q_prompt: Query<&mut Text, With<PromptText>>,
) {
    if prompt.is_changed() || focus.is_changed() {
        if let Ok(mut t) = q_prompt.single_mut() {
            let caret = if matches!(focus.0, FocusField::Prompt) { " |" } else { "" };
            t.0 = if prompt.0.is_empty() && caret.is_empty() {
                format!("> {}", INPUT_PLACEHOLDER)
            } else {
                format!("> {}{}", prompt.0, caret)
            };
        }
    }
}

// ---------------------- session events ----------------------

fn on_notice(
    mut ev: EventReader<SessionNotice>,
    mut focus: ResMut<Focus>,
    mut q: Query<(&TargetSession, &mut Text), With<NoticeText>>,
) {
    for SessionNotice { entity, notice } in ev.read() {
        if *notice == Notice::Ready {
            focus.0 = FocusField::Prompt;
        }
        for (TargetSession(t), mut ui) in q.iter_mut() {
            if t == entity {
                ui.0 = notice.message();
            }
        }
    }
}

fn on_started(
    mut ev: EventReader<CompletionStarted>,
    mut q: Query<(&TargetSession, &mut Text), With<StreamText>>,
) {
    for CompletionStarted { entity } in ev.read() {
        for (TargetSession(t), mut ui) in q.iter_mut() {
            if t == entity {
                ui.0 = "assistant: ".to_string();
            }
        }
    }
}

fn on_delta(
    mut ev: EventReader<CompletionDelta>,
    mut q: Query<(&TargetSession, &mut Text), With<StreamText>>,
) {
    for CompletionDelta { entity, text } in ev.read() {
        for (TargetSession(t), mut ui) in q.iter_mut() {
            if t == entity {
                ui.0.push_str(text);
            }
        }
    }
}

fn on_done(
    mut ev: EventReader<CompletionFinished>,
    mut q: Query<(&TargetSession, &mut Text), With<StreamText>>,
) {
    // the reply now lives in the transcript; `refresh_history` shows it.
    for CompletionFinished { entity, .. } in ev.read() {
        for (TargetSession(t), mut ui) in q.iter_mut() {
            if t == entity {
                ui.0.clear();
            }
        }
    }
}

fn on_error(
    mut ev: EventReader<CompletionFailed>,
    mut q: Query<(&TargetSession, &mut Text), With<StreamText>>,
) {
    for CompletionFailed { entity, error } in ev.read() {
        error!(target: "helpdesk", "chat error (entity={:?}): {}", entity, error);
        for (TargetSession(t), mut ui) in q.iter_mut() {
            if t == entity {
                ui.0 = format!("Error al generar la respuesta: {}", error);
            }
        }
    }
}

fn refresh_history(
    q_sessions: Query<(Entity, &HelpDeskSession), Changed<HelpDeskSession>>,
    mut q_hist: Query<(&TargetSession, &mut Text), With<HistoryText>>,
) {
    for (entity, session) in &q_sessions {
        let out = render_transcript(session.transcript());
        for (TargetSession(t), mut h) in q_hist.iter_mut() {
            if *t == entity {
                h.0 = out.clone();
            }
        }
    }
}
