//! Operator console on stdin

use crate::network::ServerHandle;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

pub const HELP: &str = "Commands: scores (print the score table), quit (stop the server), help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scores,
    Quit,
    Help,
    Unknown(String),
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield None.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim();
        if word.is_empty() {
            return None;
        }

        Some(match word.to_ascii_lowercase().as_str() {
            "scores" => ConsoleCommand::Scores,
            "quit" | "exit" => ConsoleCommand::Quit,
            "help" | "?" => ConsoleCommand::Help,
            _ => ConsoleCommand::Unknown(word.to_string()),
        })
    }
}

/// Reads commands from stdin until `quit`, end of input, or the server stops.
pub fn spawn_console(handle: ServerHandle) -> JoinHandle<()> {
    tokio::spawn(run_console(BufReader::new(tokio::io::stdin()), handle))
}

pub async fn run_console<R>(input: R, handle: ServerHandle)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                break;
            }
        };

        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };

        match command {
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Unknown(word) => {
                println!("Unknown command '{}'. Type 'help' for a list.", word)
            }
            ConsoleCommand::Quit => {
                handle.command(ConsoleCommand::Quit).await;
                break;
            }
            command => {
                if !handle.command(command).await {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ServerMessage;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("scores"), Some(ConsoleCommand::Scores));
        assert_eq!(ConsoleCommand::parse("  QUIT \n"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("help"), Some(ConsoleCommand::Help));
        assert_eq!(ConsoleCommand::parse("   "), None);
        assert_eq!(
            ConsoleCommand::parse("kick 3"),
            Some(ConsoleCommand::Unknown("kick 3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_console_forwards_server_commands() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ServerHandle::new(tx);

        let input: &[u8] = b"help\nbogus\n\nscores\nquit\nscores\n";
        run_console(input, handle).await;

        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Command(ConsoleCommand::Scores))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Command(ConsoleCommand::Quit))
        ));
        // Nothing after quit, and the handle is gone.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_console_stops_at_end_of_input() {
        let (tx, mut rx) = mpsc::channel(8);
        run_console(&b"scores"[..], ServerHandle::new(tx)).await;

        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Command(ConsoleCommand::Scores))
        ));
        assert!(rx.recv().await.is_none());
    }
}
