use super::*;
use crate::agents::AgentResult;
use crate::error::Error;
use std::sync::Arc;

fn clarification(q: &str) -> Clarification {
    Clarification {
        questions: vec![q.to_string()],
        context: serde_json::json!({ "analysis": "needs detail" }),
    }
}

fn outcome() -> TaskOutcome {
    TaskOutcome {
        success: true,
        result: "done".to_string(),
        agent_results: Vec::new(),
        analysis: "trivial".to_string(),
    }
}

#[test]
fn test_create_and_get() {
    let store = TaskStore::new();
    let id = store.create("build a site");

    let task = store.get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.request, "build a site");
    assert!(task.result.is_none());
    assert!(store.get(uuid::Uuid::new_v4()).is_none());
}

#[test]
fn test_happy_path() {
    let store = TaskStore::new();
    let id = store.create("req");

    store.mark_running(id).unwrap();
    store.complete(id, outcome()).unwrap();

    let task = store.get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.unwrap().result, "done");
}

#[test]
fn test_clarification_round_trip() {
    let store = TaskStore::new();
    let id = store.create("req");
    store.mark_running(id).unwrap();

    store.await_clarification(id, clarification("which color?")).unwrap();
    let waiting = store.get(id).unwrap();
    assert_eq!(waiting.status, TaskStatus::WaitingForClarification);
    assert_eq!(waiting.clarification.unwrap().questions, vec!["which color?"]);

    store.append_answer(id, "blue").unwrap();
    store.resume(id).unwrap();
    let running = store.get(id).unwrap();
    assert_eq!(running.status, TaskStatus::Running);
    assert!(running.clarification.is_none());
    assert_eq!(running.answers, vec!["blue"]);

    // the running <-> waiting edge may repeat
    store.await_clarification(id, clarification("which shade?")).unwrap();
    store.resume(id).unwrap();
}

#[test]
fn test_invalid_transitions() {
    let store = TaskStore::new();
    let id = store.create("req");

    assert!(matches!(
        store.complete(id, outcome()),
        Err(Error::InvalidTransition {
            from: TaskStatus::Pending,
            to: TaskStatus::Completed
        })
    ));
    assert!(store.resume(id).is_err());

    store.mark_running(id).unwrap();
    store.fail(id, "boom").unwrap();
    assert!(store.mark_running(id).is_err());
    assert!(store.fail(id, "again").is_err());
    assert!(store.append_answer(id, "late").is_err());

    let task = store.get(id).unwrap();
    assert_eq!(task.error.as_deref(), Some("boom"));
}

#[test]
fn test_fail_clears_clarification() {
    let store = TaskStore::new();
    let id = store.create("req");
    store.mark_running(id).unwrap();
    store.await_clarification(id, clarification("?")).unwrap();

    store.fail(id, "no answer").unwrap();
    let task = store.get(id).unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.clarification.is_none());
}

#[test]
fn test_unknown_task() {
    let store = TaskStore::new();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(store.mark_running(id), Err(Error::TaskNotFound(x)) if x == id));
    assert!(matches!(store.append_answer(id, "a"), Err(Error::TaskNotFound(_))));
    assert!(store.require(id).is_err());
}

#[test]
fn test_status_graph() {
    use TaskStatus::*;
    assert!(Pending.can_transition_to(Running));
    assert!(WaitingForClarification.can_transition_to(Running));
    assert!(!Completed.can_transition_to(Running));
    assert!(!Running.can_transition_to(Pending));
    assert!(!TaskStatus::Error.can_transition_to(Completed));
    assert!(Completed.is_terminal() && TaskStatus::Error.is_terminal());
    assert_eq!(WaitingForClarification.to_string(), "waiting_for_clarification");
}

#[test]
fn test_list_and_prune() {
    let store = TaskStore::new();
    let old = store.create("first");
    let live = store.create("second");
    store.mark_running(old).unwrap();
    store.complete(old, outcome()).unwrap();
    store.mark_running(live).unwrap();

    let listed = store.list();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].created_at >= listed[1].created_at);

    // nothing is old enough yet
    assert_eq!(store.prune_finished(chrono::Duration::hours(1)), 0);
    // negative age puts the cutoff in the future: every finished task goes
    assert_eq!(store.prune_finished(chrono::Duration::seconds(-1)), 1);
    assert!(store.get(old).is_none());
    assert!(store.get(live).is_some());
}

#[test]
fn test_snapshot_serialization() {
    let store = TaskStore::new();
    let id = store.create("req");
    store.mark_running(id).unwrap();
    store
        .complete(
            id,
            TaskOutcome {
                agent_results: vec![StepOutcome {
                    step_id: "code_step".to_string(),
                    agent_id: "code".to_string(),
                    result: AgentResult::success("code", "Coder", "fn main() {}"),
                    completed_at: chrono::Utc::now(),
                }],
                ..outcome()
            },
        )
        .unwrap();

    let json = serde_json::to_value(store.get(id).unwrap()).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["result"]["agentResults"][0]["stepId"], "code_step");
    assert_eq!(json["result"]["agentResults"][0]["result"]["agentName"], "Coder");
    assert!(json.get("clarification").is_none());
}

#[test]
fn test_readers_never_see_partial_clarification() {
    let store = Arc::new(TaskStore::new());
    let id = store.create("req");
    store.mark_running(id).unwrap();

    let reader = {
        let store = store.clone();
        std::thread::spawn(move || {
            for _ in 0..10_000 {
                let task = store.get(id).unwrap();
                if task.status == TaskStatus::WaitingForClarification {
                    assert!(task.clarification.is_some());
                } else {
                    assert!(task.clarification.is_none());
                }
            }
        })
    };

    for _ in 0..1_000 {
        store.await_clarification(id, clarification("?")).unwrap();
        store.resume(id).unwrap();
    }
    reader.join().unwrap();
}
