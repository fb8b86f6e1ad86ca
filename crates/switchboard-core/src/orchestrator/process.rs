//! Per-task orchestration
//!
//! ```text
//! pending -> running -> (waiting_for_clarification -> running)* -> completed
//!                   \-> error  (planning failure, clarification timeout or
//!                               limit, synthesis failure)
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::core::Orchestrator;
use super::planning::{parse_plan, Plan};
use crate::agents::{Agent, AgentContext, ReplyKey};
use crate::error::{Error, Result};
use crate::event_bus::EventKind;
use crate::task_store::{Clarification, TaskOutcome};

impl Orchestrator {
    /// Create a task and orchestrate it in the background.
    ///
    /// Poll [`TaskStore::get`](crate::TaskStore::get) or watch the bus for
    /// progress; the outcome is recorded on the task either way.
    pub fn submit(self: &Arc<Self>, request: impl Into<String>) -> Uuid {
        let task_id = self.tasks.create(request);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.orchestrate_task(task_id).await {
                debug!(task_id = %task_id, error = %e, "Background orchestration ended with error");
            }
        });
        task_id
    }

    /// Create a task and orchestrate it to the end.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::orchestrate_task`]
    pub async fn orchestrate(&self, request: impl Into<String>) -> Result<TaskOutcome> {
        let task_id = self.tasks.create(request);
        self.orchestrate_task(task_id).await
    }

    /// Run a pending task through planning, clarification rounds, delegation
    /// and synthesis.
    ///
    /// # Errors
    ///
    /// Fails if the task is unknown or not pending. Any later failure is
    /// recorded on the task (status `error`), announced with
    /// `orchestrator_error`, and returned.
    pub async fn orchestrate_task(&self, task_id: Uuid) -> Result<TaskOutcome> {
        let task = self.tasks.require(task_id)?;
        self.tasks.mark_running(task_id)?;
        info!(task_id = %task_id, "Orchestrating task");

        match self.run(task_id, &task.request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.abort(task_id, &e).await;
                Err(e)
            }
        }
    }

    /// Answer a task waiting for clarification.
    ///
    /// # Errors
    ///
    /// Fails if the task is unknown or already finished
    pub async fn provide_clarification(
        &self,
        task_id: Uuid,
        answer: impl Into<String>,
    ) -> Result<()> {
        let answer = answer.into();
        self.tasks.append_answer(task_id, answer.clone())?;
        self.emit(EventKind::TaskClarificationAnswer { task_id, answer })
            .await;
        Ok(())
    }

    async fn run(&self, task_id: Uuid, original: &str) -> Result<TaskOutcome> {
        let mut request = original.to_string();
        let mut rounds = 0u32;

        let plan = loop {
            self.emit(EventKind::OrchestratorStarted {
                task_id: Some(task_id),
                request: request.clone(),
            })
            .await;

            let plan = self.plan(&request).await?;
            if plan.clarifications.is_empty() {
                break plan;
            }

            if rounds >= self.config.max_clarification_rounds {
                return Err(Error::ClarificationLimit(self.config.max_clarification_rounds));
            }
            rounds += 1;

            let answer = self.await_clarification(task_id, &plan).await?;
            request = format!("{}\n\nClarification: {}", request, answer);
        };

        info!(task_id = %task_id, steps = plan.steps.len(), "Plan created");
        self.emit(EventKind::OrchestratorPlanCreated {
            task_id: Some(task_id),
            plan: plan.steps.clone(),
            analysis: plan.analysis.clone(),
        })
        .await;

        let outcomes = self.delegate(task_id, &request, &plan).await;
        let result = self
            .synthesize(&request, &plan.analysis, &outcomes)
            .await?;

        let outcome = TaskOutcome {
            success: true,
            result: result.clone(),
            agent_results: outcomes,
            analysis: plan.analysis,
        };
        self.tasks.complete(task_id, outcome.clone())?;
        self.emit(EventKind::OrchestratorCompleted {
            task_id: Some(task_id),
            result,
        })
        .await;

        info!(task_id = %task_id, "Task completed");
        Ok(outcome)
    }

    /// Planning goes through the orchestrator's own agent contract. A failed
    /// completion is fatal; unusable output only degrades the plan.
    async fn plan(&self, request: &str) -> Result<Plan> {
        let result = self.execute(request, &AgentContext::new(request)).await;
        if !result.success {
            return Err(Error::Planning(result.text().to_string()));
        }
        Ok(parse_plan(result.result.as_deref().unwrap_or_default()))
    }

    async fn await_clarification(&self, task_id: Uuid, plan: &Plan) -> Result<String> {
        // registered before the question goes out so an immediate answer is not missed
        let pending = self.replies.register(ReplyKey::Task(task_id))?;

        self.tasks.await_clarification(
            task_id,
            Clarification {
                questions: plan.clarifications.clone(),
                context: json!({ "analysis": plan.analysis }),
            },
        )?;
        info!(
            task_id = %task_id,
            questions = plan.clarifications.len(),
            "Waiting for clarification"
        );
        self.emit(EventKind::OrchestratorNeedsClarification {
            task_id: Some(task_id),
            clarifications: plan.clarifications.clone(),
        })
        .await;

        let answer = pending.wait(self.config.clarification_timeout()).await?;
        self.tasks.resume(task_id)?;
        debug!(task_id = %task_id, "Clarification received");
        Ok(answer)
    }

    async fn abort(&self, task_id: Uuid, failure: &Error) {
        let message = failure.to_string();
        error!(task_id = %task_id, error = %message, "Orchestration failed");

        if let Err(e) = self.tasks.fail(task_id, message.clone()) {
            warn!(task_id = %task_id, error = %e, "Could not record task failure");
        }
        self.emit(EventKind::OrchestratorError {
            task_id: Some(task_id),
            error: message,
            agent_id: None,
        })
        .await;
    }
}
