pub mod ai;
pub mod config;
pub mod controller;
pub mod error;
pub mod persona;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use ai::{build_prompt, CompletionClient, GeminiClient, FALLBACK_REPLY};
pub use config::Config;
pub use controller::{ConversationController, PendingTurn, Session, TurnId, ERROR_REPLY};
pub use error::{ChatError, ErrorKind};
pub use persona::{greeting, Persona, PersonaRegistry, PersonaStyle};
pub use state::{ControllerState, Message, MessageId, Sender};
pub use transcript::Transcript;
