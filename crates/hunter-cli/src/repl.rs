//! Interactive follow-up chat on an analysed ticker

use crate::commands::Command;
use crate::dashboard::{render_analyses, render_snapshot};
use anyhow::Result;
use hunter_analyst::{Analysis, Analyst, ChatSession, Report};
use hunter_market::{MarketService, StockSnapshot, Ticker};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

/// What the loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Report file used by `/export` without an argument
pub fn default_report_path(ticker: &Ticker) -> PathBuf {
    PathBuf::from(format!("report_{ticker}.csv"))
}

pub struct ChatRepl<'a> {
    market: &'a MarketService,
    analyst: &'a Analyst,
    snapshot: StockSnapshot,
    analyses: Vec<Analysis>,
    session: ChatSession,
}

impl<'a> ChatRepl<'a> {
    pub fn new(
        market: &'a MarketService,
        analyst: &'a Analyst,
        snapshot: StockSnapshot,
        analyses: Vec<Analysis>,
    ) -> Result<Self> {
        let session = ChatSession::new(analyst, &snapshot, &analyses)?;
        Ok(Self {
            market,
            analyst,
            snapshot,
            analyses,
            session,
        })
    }

    fn prompt(&self) -> String {
        format!("{}> ", self.snapshot.ticker)
    }

    pub async fn run(&mut self) -> Result<()> {
        println!(
            "💬 Ask anything about {}. Type /help for commands.\n",
            self.snapshot.ticker
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("{}", self.prompt());
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {e}");
                    continue;
                }
            }

            if input.trim().is_empty() {
                continue;
            }

            let command = match Command::parse(&input) {
                Ok(command) => command,
                Err(e) => {
                    eprintln!("{e}\n");
                    continue;
                }
            };

            match self.handle(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    println!("Goodbye!");
                    break;
                }
                Err(e) => eprintln!("Error: {e:#}\n"),
            }
        }

        info!(session = %self.session.id(), turns = self.session.conversation().len(), "Chat ended");
        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Ask { question } => {
                let answer = self.session.ask(&question).await?;
                println!("{answer}\n");
            }
            Command::Refresh => {
                let snapshot = self.market.refresh(&self.snapshot.ticker).await?;
                println!("{}", render_snapshot(&snapshot));
                let analyses = self.analyst.analyze_all(&snapshot).await;
                println!("{}\n", render_analyses(&analyses));

                self.session.reset_context(&snapshot, &analyses);
                self.snapshot = snapshot;
                self.analyses = analyses;
            }
            Command::Export { path } => {
                let path = path.unwrap_or_else(|| default_report_path(&self.snapshot.ticker));
                Report::from_analyses(&self.snapshot.ticker, &self.analyses).save(&path)?;
                println!("📥 Report saved to {}\n", path.display());
            }
            Command::Clear => {
                self.session.clear_history();
                println!("Conversation cleared.\n");
            }
            Command::Help => println!("{}", Command::help_text()),
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }
}
