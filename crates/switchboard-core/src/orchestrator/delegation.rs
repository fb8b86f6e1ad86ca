//! Sequential step delegation

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::core::Orchestrator;
use super::planning::Plan;
use crate::agents::{AgentContext, AgentResult};
use crate::event_bus::EventKind;
use crate::task_store::StepOutcome;

impl Orchestrator {
    /// Run the plan's steps in plan order, one at a time.
    ///
    /// Dependencies resolve against results of earlier steps by step id;
    /// unknown ids are left out. A step naming an unregistered agent is
    /// reported and skipped.
    pub(super) async fn delegate(
        &self,
        task_id: Uuid,
        request: &str,
        plan: &Plan,
    ) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(plan.steps.len());
        let mut results: HashMap<&str, AgentResult> = HashMap::new();

        for step in &plan.steps {
            let Some(agent) = self.agents.get(&step.agent_id) else {
                warn!(task_id = %task_id, agent_id = %step.agent_id, step = %step.id, "Skipping step for unknown agent");
                self.emit(EventKind::OrchestratorError {
                    task_id: Some(task_id),
                    error: format!("Agent '{}' not found", step.agent_id),
                    agent_id: Some(step.agent_id.clone()),
                })
                .await;
                continue;
            };

            let dependencies: BTreeMap<String, AgentResult> = step
                .dependencies
                .iter()
                .filter_map(|dep| {
                    results
                        .get(dep.as_str())
                        .map(|result| (dep.clone(), result.clone()))
                })
                .collect();

            debug!(
                task_id = %task_id,
                step = %step.id,
                agent_id = %step.agent_id,
                dependencies = dependencies.len(),
                "Delegating step"
            );
            self.emit(EventKind::OrchestratorDelegating {
                task_id: Some(task_id),
                agent_id: step.agent_id.clone(),
                task: step.task.clone(),
            })
            .await;

            let context = AgentContext::new(request).with_dependencies(dependencies);
            let result = agent.execute(&step.task, &context).await;

            results.insert(step.id.as_str(), result.clone());
            outcomes.push(StepOutcome {
                step_id: step.id.clone(),
                agent_id: step.agent_id.clone(),
                result,
                completed_at: Utc::now(),
            });
        }

        outcomes
    }
}
