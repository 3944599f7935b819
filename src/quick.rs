//! canned questions behind the quick-action buttons.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    EnrollCourse,
    RequestCertificate,
    Location,
}

impl QuickAction {
    /// button order, left to right.
    pub const ALL: [QuickAction; 3] = [
        QuickAction::EnrollCourse,
        QuickAction::RequestCertificate,
        QuickAction::Location,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QuickAction::EnrollCourse => "📋 ¿Cómo inscribir un curso?",
            QuickAction::RequestCertificate => "📄 Solicitar certificado",
            QuickAction::Location => "📍 ¿Dónde está el departamento?",
        }
    }

    /// the user message appended when the button is pressed.
    pub fn prompt(&self) -> &'static str {
        match self {
            QuickAction::EnrollCourse => "¿Cómo inscribir un curso de matemáticas?",
            QuickAction::RequestCertificate => "¿Cómo solicito un certificado?",
            QuickAction::Location => "¿Dónde está ubicado el departamento?",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_are_distinct_questions() {
        let prompts: Vec<&str> = QuickAction::ALL.iter().map(|a| a.prompt()).collect();
        assert_eq!(prompts.len(), 3);
        for p in &prompts {
            assert!(p.starts_with('¿') && p.ends_with('?'), "{p}");
        }
        assert_ne!(prompts[0], prompts[1]);
        assert_ne!(prompts[1], prompts[2]);
        assert!(QuickAction::EnrollCourse.prompt().contains("inscribir"));
        assert!(QuickAction::RequestCertificate.prompt().contains("certificado"));
        assert!(QuickAction::Location.prompt().contains("ubicado"));
    }
}
