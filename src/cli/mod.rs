//! CLI module for Switchboard
//!
//! Provides commands:
//! - `run`: Submit a request and follow it to the end
//! - `watch`: Print every bus event as a JSON line
//! - `answer` / `answer-agent`: Publish answers to waiting tasks or agents

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod answer;
mod run;
mod watch;

/// Switchboard multi-agent coordinator
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Plans requests and delegates them to a team of agents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Orchestrate a request, printing events as JSON lines
    Run {
        /// Request text
        request: String,
        /// Do not prompt on stdin for clarifications (answer with `answer` instead)
        #[arg(long)]
        no_input: bool,
    },
    /// Print every event on the bus as a JSON line
    Watch,
    /// Answer a task waiting for clarification
    Answer {
        /// Task id
        task_id: Uuid,
        /// Answer text
        text: String,
    },
    /// Answer a question asked by an agent
    AnswerAgent {
        /// Agent id
        agent_id: String,
        /// Answer text
        text: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = crate::app::load_config()?;
    match command {
        Commands::Run { request, no_input } => run::run(&config, request, !no_input).await,
        Commands::Watch => watch::run(&config).await,
        Commands::Answer { task_id, text } => answer::task(&config, task_id, text).await,
        Commands::AnswerAgent { agent_id, text } => answer::agent(&config, agent_id, text).await,
    }
}
