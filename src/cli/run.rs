//! `switchboard run`

use anyhow::{Context, Result};
use switchboard_core::{callback, Event, EventBus, EventKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::app::{bootstrap, config::AppConfig};

pub async fn run(config: &AppConfig, request: String, interactive: bool) -> Result<()> {
    let runtime = bootstrap(config).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let subscription = runtime
        .bus
        .subscribe(callback(move |event| {
            // receiver gone means we are shutting down
            let _ = tx.send(event.clone());
            Ok(())
        }))
        .await
        .context("Failed to subscribe to the event bus")?;

    let task_id = runtime.orchestrator.submit(request);
    eprintln!("task {}", task_id);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(event) = rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);

        if event.kind.task_id() != Some(task_id) {
            continue;
        }
        match &event.kind {
            EventKind::OrchestratorNeedsClarification { clarifications, .. } => {
                if interactive {
                    let answer = prompt(clarifications, &mut stdin).await?;
                    runtime
                        .orchestrator
                        .provide_clarification(task_id, answer)
                        .await?;
                } else {
                    eprintln!("answer with: switchboard answer {} \"<text>\"", task_id);
                }
            }
            EventKind::OrchestratorCompleted { .. } => break,
            EventKind::OrchestratorError { agent_id: None, .. } => break,
            _ => {}
        }
    }
    subscription.unsubscribe();

    print_snapshot(&runtime.orchestrator, task_id)
}

async fn prompt<R>(
    questions: &[String],
    stdin: &mut tokio::io::Lines<R>,
) -> Result<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    for question in questions {
        eprintln!("? {}", question);
    }
    eprint!("> ");

    match stdin.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => {
            warn!("stdin closed, answering with an empty line");
            Ok(String::new())
        }
    }
}

fn print_snapshot(orchestrator: &switchboard_core::Orchestrator, task_id: Uuid) -> Result<()> {
    let task = orchestrator
        .tasks()
        .get(task_id)
        .with_context(|| format!("task {} disappeared", task_id))?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}
