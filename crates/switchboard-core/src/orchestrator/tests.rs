use super::*;
use crate::agents::{Agent, AgentContext, AgentResult};
use crate::error::Error;
use crate::event_bus::{EventBus, EventKind, MemoryEventBus, SharedEventBus};
use crate::task_store::TaskStatus;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchboard_llm::{MockProvider, MockReply};
use uuid::Uuid;

/// Agent that answers with a fixed text and remembers every context it saw
struct RecordingAgent {
    id: String,
    name: String,
    reply: String,
    seen: Mutex<Vec<(String, AgentContext)>>,
}

impl RecordingAgent {
    fn new(id: &str, name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: name.to_string(),
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(String, AgentContext)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> &str {
        "records what it is given"
    }

    async fn execute(&self, task: &str, context: &AgentContext) -> AgentResult {
        self.seen
            .lock()
            .unwrap()
            .push((task.to_string(), context.clone()));
        AgentResult::success(&self.id, &self.name, &self.reply)
    }
}

fn memory_bus() -> SharedEventBus {
    Arc::new(MemoryEventBus::default())
}

async fn orchestrator(
    bus: &SharedEventBus,
    provider: &Arc<MockProvider>,
    agents: Vec<Arc<dyn Agent>>,
    config: OrchestratorConfig,
) -> Arc<Orchestrator> {
    let mut builder = Orchestrator::builder(bus.clone(), provider.clone()).with_config(config);
    for agent in agents {
        builder = builder.with_agent(agent);
    }
    builder.build().await.unwrap()
}

fn event_types(bus: &SharedEventBus) -> Vec<&'static str> {
    bus.event_queue().iter().map(|e| e.event_type()).collect()
}

async fn wait_for_status(orchestrator: &Orchestrator, task_id: Uuid, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if orchestrator.tasks().get(task_id).map(|t| t.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("task {} never reached {}", task_id, status));
}

const TWO_STEP_PLAN: &str = r#"{"analysis": "code then design", "steps": [
    {"agentId": "code", "task": "T1", "dependencies": []},
    {"agentId": "design", "task": "T2", "dependencies": ["code_step"]}
], "clarifications": []}"#;

#[tokio::test]
async fn test_dependent_step_receives_earlier_result() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(TWO_STEP_PLAN);
    provider.push_text("all done");

    let code = RecordingAgent::new("code", "Coder", "fn main() {}");
    let design = RecordingAgent::new("design", "Designer", "a logo");
    let orch = orchestrator(
        &bus,
        &provider,
        vec![code.clone() as Arc<dyn Agent>, design.clone()],
        OrchestratorConfig::default(),
    )
    .await;

    let outcome = orch.orchestrate("Build a CLI").await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.result, "all done");
    assert_eq!(outcome.analysis, "code then design");
    let steps: Vec<&str> = outcome
        .agent_results
        .iter()
        .map(|o| o.step_id.as_str())
        .collect();
    assert_eq!(steps, vec!["code_step", "design_step"]);

    let (task, context) = design.seen().remove(0);
    assert_eq!(task, "T2");
    assert_eq!(context.original_request, "Build a CLI");
    let dep = context.dependencies.get("code_step").unwrap();
    assert_eq!(dep.result.as_deref(), Some("fn main() {}"));
    assert!(code.seen()[0].1.dependencies.is_empty());

    assert_eq!(
        event_types(&bus),
        vec![
            "orchestrator_started",
            "agent_started",
            "agent_thinking",
            "agent_completed",
            "orchestrator_plan_created",
            "orchestrator_delegating",
            "orchestrator_delegating",
            "orchestrator_completed",
        ]
    );
}

#[tokio::test]
async fn test_task_snapshot_after_completion() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(TWO_STEP_PLAN);
    provider.push_text("all done");
    let orch = orchestrator(
        &bus,
        &provider,
        vec![
            RecordingAgent::new("code", "Coder", "x") as Arc<dyn Agent>,
            RecordingAgent::new("design", "Designer", "y"),
        ],
        OrchestratorConfig::default(),
    )
    .await;

    let id = orch.tasks().create("Build a CLI");
    orch.orchestrate_task(id).await.unwrap();

    let task = orch.tasks().get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    assert!(task.clarification.is_none());
    assert_eq!(task.result.unwrap().agent_results.len(), 2);

    // a task only runs once
    assert!(matches!(
        orch.orchestrate_task(id).await,
        Err(Error::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_planner_sees_agent_roster() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"analysis": "nothing to do"}"#);
    let orch = orchestrator(
        &bus,
        &provider,
        vec![RecordingAgent::new("code", "Coder", "x") as Arc<dyn Agent>],
        OrchestratorConfig::default(),
    )
    .await;

    orch.orchestrate("Say hi").await.unwrap();

    let requests = provider.requests();
    let planning = &requests[0];
    let prompt = planning.last_user_content().unwrap();
    assert!(prompt.starts_with("Say hi"));
    assert!(prompt.contains("- code (Coder): records what it is given"));
    assert_eq!(planning.temperature, Some(0.2));
}

#[tokio::test]
async fn test_clarification_round_trip() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(
        r#"{"analysis": "unclear", "steps": [], "clarifications": ["Which language?"]}"#,
    );
    provider.push_text(r#"{"analysis": "clear now", "steps": []}"#);
    provider.push_text("parser written");
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let id = orch.submit("Write a parser");
    wait_for_status(&orch, id, TaskStatus::WaitingForClarification).await;

    let waiting = orch.tasks().get(id).unwrap();
    let clarification = waiting.clarification.unwrap();
    assert_eq!(clarification.questions, vec!["Which language?"]);
    assert_eq!(clarification.context["analysis"], "unclear");

    orch.provide_clarification(id, "Rust").await.unwrap();
    wait_for_status(&orch, id, TaskStatus::Completed).await;

    let task = orch.tasks().get(id).unwrap();
    assert_eq!(task.answers, vec!["Rust"]);
    assert_eq!(task.result.unwrap().analysis, "clear now");

    let replanned = provider.requests()[1]
        .last_user_content()
        .unwrap()
        .to_string();
    assert!(replanned.contains("Write a parser"));
    assert!(replanned.contains("Clarification: Rust"));

    let types = event_types(&bus);
    assert!(types.contains(&"orchestrator_needs_clarification"));
    assert!(types.contains(&"task_clarification_answer"));
    assert_eq!(
        types.iter().filter(|t| **t == "orchestrator_started").count(),
        2
    );
    assert_eq!(orch.replies().pending_count(), 0);
}

#[tokio::test]
async fn test_answer_from_bus_resumes_task() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"clarifications": ["Deadline?"]}"#);
    provider.push_text(r#"{"analysis": "ok"}"#);
    provider.push_text("scheduled");
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let id = orch.submit("Plan a release");
    wait_for_status(&orch, id, TaskStatus::WaitingForClarification).await;

    // an answer published by another process only reaches the bus
    bus.publish(EventKind::TaskClarificationAnswer {
        task_id: id,
        answer: "Friday".into(),
    })
    .await;
    wait_for_status(&orch, id, TaskStatus::Completed).await;

    assert!(provider.requests()[1]
        .last_user_content()
        .unwrap()
        .contains("Clarification: Friday"));
}

#[tokio::test]
async fn test_missing_agent_is_skipped() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(
        r#"{"analysis": "a", "steps": [
            {"agentId": "ghost", "task": "haunt"},
            {"agentId": "code", "task": "write"}
        ]}"#,
    );
    provider.push_text("partial");
    let code = RecordingAgent::new("code", "Coder", "written");
    let orch = orchestrator(
        &bus,
        &provider,
        vec![code.clone() as Arc<dyn Agent>],
        OrchestratorConfig::default(),
    )
    .await;

    let outcome = orch.orchestrate("Do both").await.unwrap();

    assert_eq!(outcome.agent_results.len(), 1);
    assert_eq!(outcome.agent_results[0].agent_id, "code");
    assert_eq!(code.seen().len(), 1);

    let queue = bus.event_queue();
    let error = queue
        .iter()
        .find(|e| e.event_type() == "orchestrator_error")
        .unwrap();
    assert_eq!(error.kind.agent_id(), Some("ghost"));
    match &error.kind {
        EventKind::OrchestratorError { error, .. } => {
            assert_eq!(error, "Agent 'ghost' not found")
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(queue.last().unwrap().event_type(), "orchestrator_completed");
}

#[tokio::test]
async fn test_malformed_plan_still_completes() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text("I would rather not plan.");
    provider.push_text("nothing was delegated");
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let id = orch.tasks().create("Anything");
    let outcome = orch.orchestrate_task(id).await.unwrap();

    assert_eq!(outcome.analysis, "I would rather not plan.");
    assert!(outcome.agent_results.is_empty());
    assert_eq!(outcome.result, "nothing was delegated");
    assert_eq!(orch.tasks().get(id).unwrap().status, TaskStatus::Completed);

    let synthesis = provider.requests()[1]
        .last_user_content()
        .unwrap()
        .to_string();
    assert!(synthesis.contains("I would rather not plan."));
}

#[tokio::test]
async fn test_failed_step_is_reported_to_synthesis() {
    struct Broken;

    #[async_trait]
    impl Agent for Broken {
        fn id(&self) -> &str {
            "broken"
        }
        fn name(&self) -> &str {
            "Broken"
        }
        fn role(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _task: &str, _context: &AgentContext) -> AgentResult {
            AgentResult::failure("broken", "Broken", "disk full")
        }
    }

    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"steps": [{"agentId": "broken", "task": "save"}]}"#);
    provider.push_text("could not save");
    let orch = orchestrator(
        &bus,
        &provider,
        vec![Arc::new(Broken) as Arc<dyn Agent>],
        OrchestratorConfig::default(),
    )
    .await;

    let outcome = orch.orchestrate("Save it").await.unwrap();

    assert!(outcome.success);
    assert!(!outcome.agent_results[0].result.success);
    assert!(provider.requests()[1]
        .last_user_content()
        .unwrap()
        .contains("[broken_step] Broken (broken): FAILED: disk full"));
}

#[tokio::test]
async fn test_concurrent_tasks_do_not_cross_answers() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new().with_responder(|request| {
        let prompt = request.last_user_content().unwrap_or_default();
        let reply = if prompt.starts_with("Original request:") {
            "done".to_string()
        } else if prompt.contains("Clarification:") {
            r#"{"analysis": "clear"}"#.to_string()
        } else {
            r#"{"analysis": "?", "clarifications": ["Which one?"]}"#.to_string()
        };
        Some(MockReply::Text(reply))
    }));
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let alpha = orch.submit("alpha request");
    let beta = orch.submit("beta request");
    wait_for_status(&orch, alpha, TaskStatus::WaitingForClarification).await;
    wait_for_status(&orch, beta, TaskStatus::WaitingForClarification).await;

    orch.provide_clarification(beta, "answer for beta").await.unwrap();
    wait_for_status(&orch, beta, TaskStatus::Completed).await;
    assert_eq!(
        orch.tasks().get(alpha).unwrap().status,
        TaskStatus::WaitingForClarification
    );

    orch.provide_clarification(alpha, "answer for alpha").await.unwrap();
    wait_for_status(&orch, alpha, TaskStatus::Completed).await;

    let replans: Vec<String> = provider
        .requests()
        .iter()
        .filter_map(|r| r.last_user_content())
        .filter(|p| p.contains("Clarification:"))
        .map(str::to_string)
        .collect();
    assert_eq!(replans.len(), 2);
    for prompt in replans {
        if prompt.starts_with("alpha") {
            assert!(prompt.contains("answer for alpha"));
            assert!(!prompt.contains("answer for beta"));
        } else {
            assert!(prompt.starts_with("beta"));
            assert!(prompt.contains("answer for beta"));
            assert!(!prompt.contains("answer for alpha"));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_clarification_timeout_fails_task() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"clarifications": ["Anyone there?"]}"#);
    let config = OrchestratorConfig::default().with_clarification_timeout(Duration::from_secs(60));
    let orch = orchestrator(&bus, &provider, vec![], config).await;

    let id = orch.tasks().create("Hello?");
    let err = orch.orchestrate_task(id).await.unwrap_err();

    assert!(matches!(err, Error::ClarificationTimeout { limit, .. } if limit == Duration::from_secs(60)));
    let task = orch.tasks().get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.clarification.is_none());
    assert_eq!(task.error.as_deref(), Some(err.to_string().as_str()));
    assert_eq!(bus.event_queue().last().unwrap().event_type(), "orchestrator_error");
    assert_eq!(orch.replies().pending_count(), 0);

    // late answers are refused
    assert!(orch.provide_clarification(id, "too late").await.is_err());
}

#[tokio::test]
async fn test_clarification_limit() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new().with_responder(|_| {
        Some(MockReply::Text(
            r#"{"clarifications": ["And what else?"]}"#.to_string(),
        ))
    }));
    let config = OrchestratorConfig::default().with_max_clarification_rounds(1);
    let orch = orchestrator(&bus, &provider, vec![], config).await;

    let id = orch.submit("Endless");
    wait_for_status(&orch, id, TaskStatus::WaitingForClarification).await;
    orch.provide_clarification(id, "more detail").await.unwrap();
    wait_for_status(&orch, id, TaskStatus::Error).await;

    let task = orch.tasks().get(id).unwrap();
    assert_eq!(
        task.error.as_deref(),
        Some(Error::ClarificationLimit(1).to_string().as_str())
    );
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn test_synthesis_failure_is_fatal() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"analysis": "a", "steps": []}"#);
    provider.push_failure("service unavailable");
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let id = orch.tasks().create("Summarize");
    let err = orch.orchestrate_task(id).await.unwrap_err();

    assert!(matches!(err, Error::Llm(_)));
    let task = orch.tasks().get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.unwrap().contains("service unavailable"));
    assert_eq!(
        event_types(&bus).last().copied(),
        Some("orchestrator_error")
    );
}

#[tokio::test]
async fn test_planning_failure_is_fatal() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_failure("model offline");
    let orch = orchestrator(&bus, &provider, vec![], OrchestratorConfig::default()).await;

    let err = orch.orchestrate("Anything").await.unwrap_err();

    assert!(matches!(err, Error::Planning(ref m) if m.contains("model offline")));
    let types = event_types(&bus);
    assert!(types.contains(&"agent_error"));
    assert_eq!(types.last().copied(), Some("orchestrator_error"));
    assert!(!types.contains(&"orchestrator_plan_created"));
}

#[tokio::test]
async fn test_orchestrator_is_an_agent() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text("plan text");
    let orch = orchestrator(
        &bus,
        &provider,
        vec![RecordingAgent::new("code", "Coder", "x") as Arc<dyn Agent>],
        OrchestratorConfig::default(),
    )
    .await;

    assert_eq!(orch.id(), ORCHESTRATOR_ID);
    assert_eq!(orch.descriptors().len(), 1);

    let result = orch.execute("Plan this", &AgentContext::new("Plan this")).await;
    assert!(result.success);
    assert_eq!(result.agent_id, "orchestrator");
    assert_eq!(result.result.as_deref(), Some("plan text"));
}

#[tokio::test]
async fn test_builder_rejects_bad_ids() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());

    let duplicate = Orchestrator::builder(bus.clone(), provider.clone())
        .with_agent(RecordingAgent::new("code", "A", "x"))
        .with_agent(RecordingAgent::new("code", "B", "y"))
        .build()
        .await;
    assert!(matches!(duplicate, Err(Error::Configuration(_))));

    let reserved = Orchestrator::builder(bus.clone(), provider.clone())
        .with_agent(RecordingAgent::new(ORCHESTRATOR_ID, "Impostor", "x"))
        .build()
        .await;
    assert!(matches!(reserved, Err(Error::Configuration(_))));
}

#[test]
fn test_config_defaults() {
    let config: OrchestratorConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.max_clarification_rounds, 3);
    assert_eq!(config.clarification_timeout(), Duration::from_secs(1800));
    assert!(config.synthesis_max_tokens.is_none());
}

#[test]
fn test_sub_second_clarification_timeout_is_kept() {
    let config = OrchestratorConfig::default().with_clarification_timeout(Duration::from_millis(250));
    assert_eq!(config.clarification_timeout_ms, 250);
    assert_eq!(config.clarification_timeout(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_clarification_wait_expires() {
    let bus = memory_bus();
    let provider = Arc::new(MockProvider::new());
    provider.push_text(r#"{"clarifications": ["Still there?"]}"#);
    let config = OrchestratorConfig::default().with_clarification_timeout(Duration::from_millis(250));
    let orch = orchestrator(&bus, &provider, vec![], config).await;

    let id = orch.tasks().create("Quick one");
    let err = orch.orchestrate_task(id).await.unwrap_err();

    assert!(matches!(err, Error::ClarificationTimeout { limit, .. } if limit == Duration::from_millis(250)));
    assert_eq!(orch.tasks().get(id).unwrap().status, TaskStatus::Error);
}
