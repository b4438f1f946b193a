//! System clipboard via `arboard`
//!
//! The platform clipboard handle lives on a dedicated thread; async callers
//! talk to it over a command queue. Keeping one long-lived handle also keeps
//! ownership of written selections on X11.

use super::{ClipboardError, ClipboardProvider};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Command {
    Read(oneshot::Sender<Result<String, ClipboardError>>),
    Write(String, oneshot::Sender<Result<(), ClipboardError>>),
}

/// Clipboard provider for the desktop clipboard
pub struct SystemClipboard {
    commands: mpsc::UnboundedSender<Command>,
}

impl SystemClipboard {
    /// Open the platform clipboard
    pub fn new() -> Result<Self, ClipboardError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel::<Command>();

        std::thread::Builder::new()
            .name("clipboard".to_string())
            .spawn(move || {
                let mut clipboard = match arboard::Clipboard::new() {
                    Ok(clipboard) => {
                        let _ = ready_tx.send(Ok(()));
                        clipboard
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(platform_error(e)));
                        return;
                    }
                };

                while let Some(command) = command_rx.blocking_recv() {
                    match command {
                        Command::Read(reply) => {
                            let _ = reply.send(clipboard.get_text().map_err(platform_error));
                        }
                        Command::Write(text, reply) => {
                            let _ = reply.send(clipboard.set_text(text).map_err(platform_error));
                        }
                    }
                }

                debug!("Clipboard worker stopped");
            })?;

        ready_rx.recv().map_err(|_| ClipboardError::Unavailable)??;

        Ok(Self { commands })
    }
}

fn platform_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ContentNotAvailable => ClipboardError::NoContent,
        other => ClipboardError::Platform(other.to_string()),
    }
}

#[async_trait]
impl ClipboardProvider for SystemClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Read(reply))
            .map_err(|_| ClipboardError::Unavailable)?;
        response.await.map_err(|_| ClipboardError::Unavailable)?
    }

    async fn write(&self, value: &str) -> Result<(), ClipboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Write(value.to_string(), reply))
            .map_err(|_| ClipboardError::Unavailable)?;
        response.await.map_err(|_| ClipboardError::Unavailable)?
    }

    fn name(&self) -> &str {
        "system"
    }
}
