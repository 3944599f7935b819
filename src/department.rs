//! static facts about the department: the instruction seeded into every
//! transcript, the welcome text and the sidebar contact card.

/// behavioral instruction for the assistant. always the first transcript entry.
pub const SYSTEM_PROMPT: &str = "\
Eres un asistente virtual especializado del Departamento de Matemáticas de la UNAL.
Tu función es ayudar a estudiantes con trámites administrativos y consultas académicas.

Información importante que debes conocer:
- El departamento ofrece cursos de: Cálculo, Álgebra Lineal, Ecuaciones Diferenciales, etc.
- Trámites comunes: inscripción de asignaturas, solicitud de certificados, justificaciones, etc.
- Horario de atención: Lunes a Viernes 8am - 5pm
- Ubicación: Edificio 404, Oficina 201

IMPORTANTE: Responde SIEMPRE en español, de manera amable y profesional.
Si no sabes algo, sugiere al estudiante contactar directamente al departamento.";

pub const TITLE: &str = "Chatbot Oficial - Departamento de Matemáticas UNAL";

pub const WELCOME: &str = "\
¡Bienvenido al chatbot oficial del Departamento de Matemáticas de la UNAL!

Soy tu asistente virtual especializado en ayudarte con:
- Trámites académicos y administrativos
- Inscripciones a cursos de matemáticas
- Solicitud de certificados y constancias
- Preguntas frecuentes sobre el departamento
- Información sobre horarios y profesores
- Ubicación y contactos del departamento

¿En qué puedo ayudarte hoy?";

/// shown whenever a turn is attempted without a key.
pub const CREDENTIAL_PROMPT: &str = "Por favor, ingresa tu API key de OpenAI para continuar.";

pub const INPUT_PLACEHOLDER: &str = "Escribe tu consulta aquí...";

/// contact card rendered in the sidebar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepartmentInfo {
    pub name: &'static str,
    pub location: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub hours: &'static str,
}

pub const DEPARTMENT: DepartmentInfo = DepartmentInfo {
    name: "Departamento de Matemáticas UNAL",
    location: "Edificio 404, Oficina 201",
    phone: "(601) 3165000 ext. 16000",
    email: "decanatura_matematicas@unal.edu.co",
    hours: "Lunes a Viernes 8am - 5pm",
};

impl DepartmentInfo {
    pub fn sidebar_text(&self) -> String {
        format!(
            "{}\n- Ubicación: {}\n- Teléfono: {}\n- Email: {}\n- Horario: {}",
            self.name, self.location, self.phone, self.email, self.hours
        )
    }
}
