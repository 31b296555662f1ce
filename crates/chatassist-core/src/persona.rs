//! Persona catalog
//!
//! A persona is a named system prompt. The catalog is closed: it is fixed when
//! the registry is built and lookups of unknown ids fall back to the default.

use crate::error::ChatError;

/// Presentation token used by front ends to color a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaStyle {
    Blue,
    Green,
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub id: &'static str,
    pub display_name: &'static str,
    pub icon: char,
    pub style: PersonaStyle,
    pub system_prompt: &'static str,
}

pub const DEFAULT_PERSONA_ID: &str = "general";

const GENERAL_PROMPT: &str = "You are a friendly, helpful, and knowledgeable AI chatbot. \
You speak in clear and polite language. Always try to understand the user's intent and provide \
accurate, concise answers. If the user asks vague or confusing questions, politely ask clarifying \
questions. If the topic is sensitive or private, respond with care. Keep your tone warm, \
professional, and never rude. If you don't know something, admit it honestly instead of guessing. \
For general queries, include examples or step-by-step guidance when helpful. Always end your \
responses by asking if the user needs more help.";

const DEVELOPER_PROMPT: &str = "Tum ek AI assistant ho jo Hindi mein friendly aur asaan bhasha \
mein developers ko madad karta hai. Tumhara goal hai ki users ko code samajhne, likhne, ya \
troubleshoot karne mein help mile. Tum hamesha clear examples ke saath answer dete ho, aur agar \
user confuse ho to tum politely clarification maangte ho. Tum kabhi galat info guess nahi karte - \
agar kuch nahi pata ho to clearly bolte ho. Har response ke end mein puchte ho: \
'Kya aapko aur madad chahiye?'";

const SUPPORT_PROMPT: &str = "You are a customer support chatbot for Concise Chat Assist. \
Your job is to help users with their questions about our AI chatbot service, features, and \
troubleshooting. Be polite, concise, and always follow best practices. If a user's issue is \
outside your scope, guide them to contact human support. Always greet the user, summarize their \
question, provide a solution, and ask if their issue is resolved.";

/// The personas shipped with the client, in display order
pub fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: DEFAULT_PERSONA_ID,
            display_name: "General Assistant",
            icon: '✦',
            style: PersonaStyle::Blue,
            system_prompt: GENERAL_PROMPT,
        },
        Persona {
            id: "developer",
            display_name: "Developer Assistant (Hindi)",
            icon: '⌘',
            style: PersonaStyle::Green,
            system_prompt: DEVELOPER_PROMPT,
        },
        Persona {
            id: "support",
            display_name: "Customer Support",
            icon: '♥',
            style: PersonaStyle::Purple,
            system_prompt: SUPPORT_PROMPT,
        },
    ]
}

/// Synthetic assistant message that opens every session
pub fn greeting(persona: &Persona) -> String {
    format!(
        "Hello! I'm your {}. How can I help you today?",
        persona.display_name
    )
}

#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Build a registry from a fixed list. The first entry is the default.
    pub fn new(personas: Vec<Persona>) -> Result<Self, ChatError> {
        if personas.is_empty() {
            return Err(ChatError::invalid_argument(
                "persona registry needs at least one persona",
            ));
        }
        Ok(Self { personas })
    }

    pub fn builtin() -> Self {
        Self {
            personas: builtin_personas(),
        }
    }

    pub fn list(&self) -> &[Persona] {
        &self.personas
    }

    pub fn get(&self, id: &str) -> Result<&Persona, ChatError> {
        self.personas
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ChatError::not_found(format!("persona '{}'", id)))
    }

    pub fn default_persona(&self) -> &Persona {
        // Non-empty is checked at construction
        &self.personas[0]
    }

    /// Look up a persona, falling back to the default for unknown ids
    pub fn get_or_default(&self, id: &str) -> &Persona {
        match self.get(id) {
            Ok(persona) => persona,
            Err(err) => {
                let fallback = self.default_persona();
                tracing::warn!(error = %err, fallback = fallback.id, "Unknown persona, using default");
                fallback
            }
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.personas.iter().position(|p| p.id == id)
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_is_stable() {
        let registry = PersonaRegistry::builtin();
        let ids: Vec<&str> = registry.list().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["general", "developer", "support"]);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = PersonaRegistry::builtin();
        let err = registry.get("pirate").unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[test]
    fn test_get_or_default_falls_back() {
        let registry = PersonaRegistry::builtin();
        assert_eq!(registry.get_or_default("pirate").id, DEFAULT_PERSONA_ID);
        assert_eq!(registry.get_or_default("support").id, "support");
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = PersonaRegistry::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[test]
    fn test_first_persona_is_default() {
        let mut personas = builtin_personas();
        personas.reverse();
        let registry = PersonaRegistry::new(personas).unwrap();
        assert_eq!(registry.default_persona().id, "support");
        assert_eq!(registry.position("general"), Some(2));
    }

    #[test]
    fn test_greeting_names_persona() {
        let registry = PersonaRegistry::builtin();
        assert_eq!(
            greeting(registry.default_persona()),
            "Hello! I'm your General Assistant. How can I help you today?"
        );
    }
}
