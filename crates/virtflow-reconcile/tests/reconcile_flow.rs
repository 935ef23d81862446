//! End-to-end reconciliation flows against a scripted in-memory provider

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use virtflow_reconcile::{
    MutationAck, NormalizedOutput, Phase, PollConfig, ProviderError, ProviderOps,
    ReconcileError, ReconcileRequest, RemoteSnapshot, RemoteTaskHandle, ResourceConfig,
    TaskError, TaskStatus, TeardownPolicy, UpdateDisposition, reconcile,
};

/// In-memory provider that replays scripted responses and records which
/// operations the dispatcher invoked
struct ScriptedProvider {
    create_ack: Mutex<Option<Result<MutationAck, ProviderError>>>,
    update_result: Mutex<Option<Result<UpdateDisposition, ProviderError>>>,
    delete_results: Mutex<VecDeque<Result<(), ProviderError>>>,
    read_result: Mutex<Option<Result<RemoteSnapshot, ProviderError>>>,
    task_script: Mutex<VecDeque<TaskStatus>>,
    running_counts: Mutex<VecDeque<usize>>,
    policy: TeardownPolicy,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            create_ack: Mutex::new(None),
            update_result: Mutex::new(None),
            delete_results: Mutex::new(VecDeque::new()),
            read_result: Mutex::new(None),
            task_script: Mutex::new(VecDeque::new()),
            running_counts: Mutex::new(VecDeque::new()),
            policy: TeardownPolicy::Destroy,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn on_create(self, ack: MutationAck) -> Self {
        *self.create_ack.lock().unwrap() = Some(Ok(ack));
        self
    }

    fn fail_create(self, err: ProviderError) -> Self {
        *self.create_ack.lock().unwrap() = Some(Err(err));
        self
    }

    fn on_update(self, disposition: UpdateDisposition) -> Self {
        *self.update_result.lock().unwrap() = Some(Ok(disposition));
        self
    }

    fn on_delete(self, results: Vec<Result<(), ProviderError>>) -> Self {
        *self.delete_results.lock().unwrap() = results.into();
        self
    }

    fn on_read(self, snapshot: RemoteSnapshot) -> Self {
        *self.read_result.lock().unwrap() = Some(Ok(snapshot));
        self
    }

    fn with_task_script(self, statuses: Vec<TaskStatus>) -> Self {
        *self.task_script.lock().unwrap() = statuses.into();
        self
    }

    fn with_running_counts(self, counts: Vec<usize>) -> Self {
        *self.running_counts.lock().unwrap() = counts.into();
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ProviderOps for ScriptedProvider {
    fn kind(&self) -> &str {
        "scripted"
    }

    async fn create(&self, _: &ResourceConfig) -> Result<MutationAck, ProviderError> {
        self.record("create");
        self.create_ack
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(MutationAck::Complete))
    }

    async fn update(&self, _: &ResourceConfig) -> Result<UpdateDisposition, ProviderError> {
        self.record("update");
        self.update_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(UpdateDisposition::Applied(MutationAck::Complete)))
    }

    async fn delete(&self) -> Result<(), ProviderError> {
        self.record("delete");
        self.delete_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn read(&self) -> Result<RemoteSnapshot, ProviderError> {
        self.record("read");
        self.read_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(RemoteSnapshot::new()))
    }

    async fn query_task(&self, _: &RemoteTaskHandle) -> Result<TaskStatus, ProviderError> {
        self.record("query_task");
        Ok(self
            .task_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TaskStatus::Running))
    }

    async fn query_running_tasks(&self) -> Result<usize, ProviderError> {
        self.record("query_running_tasks");
        Ok(self.running_counts.lock().unwrap().pop_front().unwrap_or(0))
    }

    fn teardown(&self) -> TeardownPolicy {
        self.policy
    }

    fn poll_budget(&self, _: Option<&RemoteTaskHandle>) -> PollConfig {
        PollConfig::default()
    }

    fn output_defaults(&self) -> Vec<(String, serde_json::Value)> {
        vec![("on_boot".to_string(), json!(false))]
    }
}

fn vm_config() -> ResourceConfig {
    ResourceConfig::new("vm", "web-01", json!({"name": "web-01", "cores": 4}))
}

fn task_handle() -> RemoteTaskHandle {
    RemoteTaskHandle::new("UPID:pve1:0000C3E0:1234:0:qmcreate:100:root@pam:")
}

#[tokio::test]
async fn test_create_without_task_normalizes_immediately() {
    let ops = ScriptedProvider::new()
        .on_create(MutationAck::Complete)
        .on_read(
            RemoteSnapshot::new()
                .with_remote_id("100")
                .with_attribute("cores", json!(4))
                .with_attribute("status", json!("stopped")),
        );

    let req = ReconcileRequest::new(Phase::Create, vm_config());
    let output = reconcile(&req, &ops).await.unwrap();

    assert_eq!(ops.calls(), vec!["create", "read"]);
    assert_eq!(output.remote_id.as_deref(), Some("100"));
    // Remote, desired, and static default all land in one record
    assert_eq!(output.get::<u32>("cores"), Some(4));
    assert_eq!(output.get::<String>("name").as_deref(), Some("web-01"));
    assert_eq!(output.get::<bool>("on_boot"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_create_task_failure_skips_the_read() {
    let ops = ScriptedProvider::new()
        .on_create(MutationAck::Queued(task_handle()))
        .with_task_script(vec![
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Failed("storage 'local-lvm' is full".to_string()),
        ]);

    let req = ReconcileRequest::new(Phase::Create, vm_config());
    let err = reconcile(&req, &ops).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Task(TaskError::Failed(_))));
    let calls = ops.calls();
    assert_eq!(calls.iter().filter(|c| **c == "query_task").count(), 3);
    assert!(!calls.contains(&"read"));
}

#[tokio::test(start_paused = true)]
async fn test_create_settles_queued_task_well_under_budget() {
    let ops = ScriptedProvider::new()
        .on_create(MutationAck::Queued(task_handle()))
        .with_task_script(vec![
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Succeeded,
        ])
        .on_read(RemoteSnapshot::new().with_remote_id("100"));

    let started = Instant::now();
    let req = ReconcileRequest::new(Phase::Create, vm_config());
    let output = reconcile(&req, &ops).await.unwrap();

    // Succeeded on the fifth poll: ~8s of waiting, not the 300s budget
    assert_eq!(started.elapsed(), Duration::from_secs(8));
    assert_eq!(output.remote_id.as_deref(), Some("100"));
    assert_eq!(*ops.calls().last().unwrap(), "read");
}

#[tokio::test(start_paused = true)]
async fn test_create_background_work_waits_for_quiesce() {
    let ops = ScriptedProvider::new()
        .on_create(MutationAck::Background)
        .with_running_counts(vec![2, 1, 0])
        .on_read(RemoteSnapshot::new().with_remote_id("backup-01"));

    let req = ReconcileRequest::new(Phase::Create, vm_config());
    let output = reconcile(&req, &ops).await.unwrap();

    let calls = ops.calls();
    assert_eq!(
        calls.iter().filter(|c| **c == "query_running_tasks").count(),
        3
    );
    assert_eq!(output.remote_id.as_deref(), Some("backup-01"));
}

#[tokio::test]
async fn test_delete_of_absent_target_returns_retired_output() {
    let ops = ScriptedProvider::new().on_delete(vec![Err(ProviderError::NotFound(
        "vm 100 does not exist".to_string(),
    ))]);

    let req = ReconcileRequest::new(Phase::Delete, vm_config())
        .with_previous(NormalizedOutput::retired());
    let output = reconcile(&req, &ops).await.unwrap();

    assert!(output.is_retired());
    assert_eq!(ops.calls(), vec!["delete"]);
}

#[tokio::test]
async fn test_unsupported_update_degenerates_to_a_read() {
    let ops = ScriptedProvider::new()
        .on_update(UpdateDisposition::Unsupported)
        .on_read(RemoteSnapshot::new().with_attribute("acl_present", json!(true)));

    let req = ReconcileRequest::new(Phase::Update, vm_config());
    let output = reconcile(&req, &ops).await.unwrap();

    assert_eq!(ops.calls(), vec!["update", "read"]);
    assert_eq!(output.get::<bool>("acl_present"), Some(true));
    // Desired config still projects into the output
    assert_eq!(output.get::<u32>("cores"), Some(4));
}

#[tokio::test]
async fn test_update_without_previous_output_does_not_fault() {
    let ops = ScriptedProvider::new()
        .on_update(UpdateDisposition::Applied(MutationAck::Complete))
        .on_read(RemoteSnapshot::new().with_remote_id("100"));

    // Orchestrator gap: phase is Update but no previous output survived
    let req = ReconcileRequest::new(Phase::Update, vm_config());
    let output = reconcile(&req, &ops).await.unwrap();

    assert_eq!(output.remote_id.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_rejected_create_propagates_verbatim() {
    let ops = ScriptedProvider::new()
        .fail_create(ProviderError::Rejected("VM 100 already exists".to_string()));

    let req = ReconcileRequest::new(Phase::Create, vm_config());
    let err = reconcile(&req, &ops).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Provider(ProviderError::Rejected(message)) if message.contains("already exists")
    ));
    // Nothing after the failed mutation
    assert_eq!(ops.calls(), vec!["create"]);
}

#[tokio::test]
async fn test_each_phase_invokes_only_its_documented_operations() {
    for (phase, forbidden) in [
        (Phase::Create, vec!["update", "delete"]),
        (Phase::Update, vec!["create", "delete"]),
        (Phase::Delete, vec!["create", "update", "read"]),
    ] {
        let ops = ScriptedProvider::new();
        let req = ReconcileRequest::new(phase, vm_config());
        reconcile(&req, &ops).await.unwrap();

        let calls = ops.calls();
        for op in forbidden {
            assert!(
                !calls.contains(&op),
                "{phase} must not invoke {op}, but calls were {calls:?}"
            );
        }
    }
}
