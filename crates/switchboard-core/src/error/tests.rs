use super::*;

#[test]
fn test_transition_message() {
    let err = Error::InvalidTransition {
        from: TaskStatus::Completed,
        to: TaskStatus::Running,
    };
    assert_eq!(
        err.to_string(),
        "invalid task transition: completed -> running"
    );
}

#[test]
fn test_timeout_message() {
    let err = Error::ClarificationTimeout {
        key: "task-1".to_string(),
        limit: Duration::from_millis(1_800_000),
    };
    assert_eq!(err.to_string(), "no answer for 'task-1' within 1800s");

    let err = Error::ClarificationTimeout {
        key: "task-2".to_string(),
        limit: Duration::from_millis(250),
    };
    assert_eq!(err.to_string(), "no answer for 'task-2' within 250ms");
}

#[test]
fn test_from_llm_error() {
    let err: Error = switchboard_llm::Error::RateLimited.into();
    assert!(matches!(err, Error::Llm(_)));
    assert!(!err.is_transient());
}

#[test]
fn test_redis_errors_are_transient() {
    assert!(Error::Redis("connection refused".into()).is_transient());
    assert!(!Error::Bus("closed".into()).is_transient());
}
