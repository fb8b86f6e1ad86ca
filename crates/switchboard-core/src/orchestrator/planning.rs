//! Plan types and parsing
//!
//! Planner output is free text that should contain one JSON object. The
//! outermost `{...}` span is parsed; anything unusable degrades to a plan
//! with no steps whose analysis is the raw text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outermost JSON object in a planner reply
static PLAN_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("PLAN_JSON is a compile-time constant"));

/// System prompt for the planning call
pub(crate) const PLANNING_PROMPT: &str = "You are the orchestrator of a team of specialist agents. \
Break the user's request into steps, each delegated to exactly one of the available agents. \
Order the steps so that every step comes after the steps it depends on. \
If the request is too ambiguous to plan, ask questions instead of planning.\n\
Reply with a single JSON object and nothing else:\n\
{\"analysis\": \"<your understanding of the request>\", \
\"steps\": [{\"id\": \"<unique step id>\", \"agentId\": \"<agent id>\", \"task\": \"<instructions>\", \"dependencies\": [\"<step id>\"]}], \
\"clarifications\": [\"<question for the user>\"]}";

/// One delegated step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// Step id, unique within the plan
    pub id: String,
    /// Agent the step is delegated to
    pub agent_id: String,
    /// Instructions for the agent
    pub task: String,
    /// Ids of earlier steps whose results this step needs
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A parsed plan; lives for one orchestration round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Planner's understanding of the request
    pub analysis: String,
    /// Steps in execution order
    pub steps: Vec<PlanStep>,
    /// Open questions for the caller
    pub clarifications: Vec<String>,
}

impl Plan {
    /// Plan with nothing but an analysis
    #[must_use]
    pub fn analysis_only(analysis: impl Into<String>) -> Self {
        Self {
            analysis: analysis.into(),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    clarifications: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "agent")]
    agent_id: String,
    task: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Parse planner output. Never fails.
///
/// Steps without an id are named `{agentId}_step`; repeated ids get `_2`,
/// `_3`, ... suffixes in plan order.
#[must_use]
pub fn parse_plan(raw: &str) -> Plan {
    let Some(span) = PLAN_JSON.find(raw) else {
        debug!("Planner reply contains no JSON object");
        return Plan::analysis_only(raw);
    };

    let parsed: RawPlan = match serde_json::from_str(span.as_str()) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "Unparseable plan, continuing with analysis only");
            return Plan::analysis_only(raw);
        }
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let steps = parsed
        .steps
        .into_iter()
        .map(|step| {
            let base = step
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("{}_step", step.agent_id));
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let id = if *count == 1 {
                base
            } else {
                format!("{}_{}", base, count)
            };

            PlanStep {
                id,
                agent_id: step.agent_id,
                task: step.task,
                dependencies: step.dependencies,
            }
        })
        .collect();

    Plan {
        analysis: parsed.analysis,
        steps,
        clarifications: parsed
            .clarifications
            .into_iter()
            .filter(|q| !q.trim().is_empty())
            .collect(),
    }
}
