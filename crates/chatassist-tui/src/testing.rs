use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatassist_core::{ChatError, CompletionClient, Config, ConversationController, PersonaRegistry};

use crate::app::App;

/// Echoes the user text back, failing for any text containing "fail"
pub struct EchoClient;

#[async_trait]
impl CompletionClient for EchoClient {
    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String, ChatError> {
        if user_text.contains("fail") {
            Err(ChatError::request_failed("simulated transport error"))
        } else {
            Ok(format!("echo: {}", user_text))
        }
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub fn test_app() -> App {
    let controller =
        ConversationController::new(Arc::new(EchoClient), PersonaRegistry::builtin(), "general");
    App::new(controller, Config::new())
}

/// Let the spawned completion task finish and apply its result
pub async fn settle(app: &mut App) {
    for _ in 0..200 {
        if !app.is_waiting() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        app.poll_pending().await;
    }
    panic!("completion never settled");
}
