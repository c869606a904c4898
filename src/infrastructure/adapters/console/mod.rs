//! Console adapter - operator commands from stdin

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::application::errors::HostError;
use crate::application::services::CommandService;

/// Reads operator commands line by line and prints the replies
pub struct ConsoleAdapter {
    service: Arc<CommandService>,
    prompt: String,
}

impl ConsoleAdapter {
    pub fn new(service: Arc<CommandService>) -> Self {
        Self {
            service,
            prompt: "> ".to_string(),
        }
    }

    /// Run until `quit` or end of input
    pub async fn run(&self) -> Result<(), HostError> {
        tracing::info!("Starting console (type `{}help` for commands)", self.service.prefix());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(self.prompt.as_bytes()).await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                tracing::debug!("Console input closed");
                break;
            };

            if self.service.is_quit(&line) {
                break;
            }

            if let Some(reply) = self.reply(&line).await {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
        }

        Ok(())
    }

    /// Output for one line. Command errors are reported, not returned.
    pub async fn reply(&self, line: &str) -> Option<String> {
        match self.service.handle(line).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Command failed: {}", e);
                Some(format!("Error: {}", e))
            }
        }
    }
}
