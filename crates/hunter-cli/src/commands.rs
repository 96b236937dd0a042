//! Command parsing for the chat REPL
//!
//! Plain text is a follow-up question; lines starting with `/` are commands.

use anyhow::{Result, bail};
use std::path::PathBuf;

/// Parsed line of REPL input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Follow-up question for the model
    Ask { question: String },
    /// Fetch fresh data and re-run the personas
    Refresh,
    /// Write the current verdicts as CSV
    Export { path: Option<PathBuf> },
    /// Forget the conversation history
    Clear,
    Help,
    Exit,
}

impl Command {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            bail!("Empty input");
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Command::Ask {
                question: input.to_string(),
            });
        };

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some((cmd, args)) = parts.split_first() else {
            bail!("Empty command");
        };

        match cmd.to_lowercase().as_str() {
            "refresh" | "reload" | "r" => Ok(Command::Refresh),
            "export" | "save" | "e" => Ok(Command::Export {
                path: args.first().map(PathBuf::from),
            }),
            "clear" | "cls" => Ok(Command::Clear),
            "help" | "h" | "?" => Ok(Command::Help),
            "exit" | "quit" | "q" => Ok(Command::Exit),
            other => bail!("Unknown command: /{other} (try /help)"),
        }
    }

    /// Get help text for all commands
    pub fn help_text() -> &'static str {
        r"
Chat Commands
=============

  <question>          Ask a follow-up question about the ticker
  /refresh, /r        Fetch fresh data and re-run the personas
  /export [file], /e  Save the verdicts as CSV (default: report_<TICKER>.csv)
  /clear, /cls        Forget the conversation so far
  /help, /h, /?       Show this help
  /exit, /quit, /q    Leave the chat
"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_question() {
        assert_eq!(
            Command::parse("  Why is the P/E so high?  ").unwrap(),
            Command::Ask {
                question: "Why is the P/E so high?".to_string()
            }
        );
    }

    #[test]
    fn test_commands_and_aliases() {
        assert_eq!(Command::parse("/refresh").unwrap(), Command::Refresh);
        assert_eq!(Command::parse("/R").unwrap(), Command::Refresh);
        assert_eq!(Command::parse("/clear").unwrap(), Command::Clear);
        assert_eq!(Command::parse("/?").unwrap(), Command::Help);
        assert_eq!(Command::parse("/quit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("/q").unwrap(), Command::Exit);
    }

    #[test]
    fn test_export_path() {
        assert_eq!(
            Command::parse("/export out/nvda.csv").unwrap(),
            Command::Export {
                path: Some(PathBuf::from("out/nvda.csv"))
            }
        );
        assert_eq!(Command::parse("/e").unwrap(), Command::Export { path: None });
    }

    #[test]
    fn test_invalid_input() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("/").is_err());
        assert!(Command::parse("/watchlist").is_err());
    }

    #[test]
    fn test_help_lists_commands() {
        let help = Command::help_text();
        for cmd in ["/refresh", "/export", "/clear", "/help", "/exit"] {
            assert!(help.contains(cmd), "missing {cmd}");
        }
    }
}
