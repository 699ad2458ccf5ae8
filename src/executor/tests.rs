//! Executor Core Tests
//!
//! Exercises the admission/queueing/execution engine end to end with
//! in-process job functions plus shell scripts under a temp directory.
//!
//! ## Test Scopes
//! - **Registration**: handler table semantics, duplicate rejection.
//! - **Queue discipline**: mutual exclusion, FIFO order, consumer restart.
//! - **Blocking strategies**: serial, discard-newer, cancel-and-replace.
//! - **Cancellation**: kill of active runs, no-op kills, drained queues.
//! - **Script strategy**: source materialization, execution, failure codes.

#[cfg(test)]
mod tests {
    use crate::admin::protocol::HandleCallbackParam;
    use crate::config::ExecutorConfig;
    use crate::executor::error::ExecutorError;
    use crate::executor::protocol::{TriggerParam, FAIL_CODE, SUCCESS_CODE};
    use crate::executor::registry::JobRegistry;
    use crate::executor::reporter::ResultReporter;
    use crate::executor::strategy::{parse_input_params, ExecutionStrategy};
    use crate::executor::types::JobHandlerFn;
    use std::future::Future;
    use std::path::Path;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_util::sync::CancellationToken;

    fn test_config(dir: &Path) -> ExecutorConfig {
        ExecutorConfig::new("test-executor")
            .glue_source_dir(dir.join("gluesource"))
            .log_dir(dir.join("logs"))
    }

    fn test_registry(dir: &Path) -> (Arc<JobRegistry>, UnboundedReceiver<HandleCallbackParam>) {
        let (reporter, rx) = ResultReporter::channel();
        (JobRegistry::new(&test_config(dir), reporter), rx)
    }

    fn handler_fn<F, Fut>(f: F) -> JobHandlerFn
    where
        F: Fn(crate::executor::types::RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Arc::new(move |ctx| {
            Box::pin(f(ctx)) as Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        })
    }

    fn function_trigger(job_id: i32, log_id: i64, handler: &str, strategy: &str) -> TriggerParam {
        TriggerParam {
            job_id,
            executor_handler: handler.to_string(),
            executor_block_strategy: strategy.to_string(),
            log_id,
            log_date_time: 1_700_000_000_000 + log_id,
            glue_type: "BEAN".to_string(),
            ..Default::default()
        }
    }

    fn script_trigger(job_id: i32, log_id: i64, glue_type: &str, source: &str) -> TriggerParam {
        TriggerParam {
            job_id,
            executor_block_strategy: "SERIAL_EXECUTION".to_string(),
            log_id,
            log_date_time: 1_700_000_000_000 + log_id,
            glue_type: glue_type.to_string(),
            glue_source: source.to_string(),
            glue_updatetime: 100,
            ..Default::default()
        }
    }

    async fn next_callback(rx: &mut UnboundedReceiver<HandleCallbackParam>) -> HandleCallbackParam {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for callback")
            .expect("callback channel closed")
    }

    async fn wait_until(condition: impl Fn() -> bool, what: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting: {}",
                what
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    // ============================================================
    // TEST 1: Registration semantics
    // ============================================================

    #[tokio::test]
    async fn register_and_execute_function_job() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        registry
            .register_job(
                "count_job",
                handler_fn(move |_ctx| {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();
        assert!(registry.has_handler("count_job"));
        assert_eq!(registry.handler_count(), 1);

        registry
            .admit(function_trigger(1, 10, "count_job", "SERIAL_EXECUTION"))
            .await
            .unwrap();

        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 10);
        assert_eq!(callback.handle_code, SUCCESS_CODE);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_handler_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _rx) = test_registry(dir.path());

        registry
            .register_job("twice", handler_fn(|_ctx| async { Ok(()) }))
            .unwrap();
        let second = registry.register_job("twice", handler_fn(|_ctx| async { Ok(()) }));

        assert!(matches!(second, Err(ExecutorError::DuplicateHandler(_))));
    }

    #[tokio::test]
    async fn unknown_handler_fails_admission() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let result = registry
            .admit(function_trigger(2, 20, "no_such_job", "SERIAL_EXECUTION"))
            .await;

        assert!(matches!(result, Err(ExecutorError::HandlerNotFound(_))));
        // No queue was created, so nothing ever runs for this job
        assert!(!registry.has_running(2));

        // The coordinator still gets told, as a hard failure
        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 20);
        assert_eq!(callback.handle_code, FAIL_CODE);
    }

    #[tokio::test]
    async fn unsupported_glue_type_fails_admission() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _rx) = test_registry(dir.path());

        let result = registry
            .admit(script_trigger(3, 30, "GLUE_RUBY", "puts 1"))
            .await;

        assert!(matches!(
            result,
            Err(ExecutorError::UnsupportedGlueType(tag)) if tag == "GLUE_RUBY"
        ));
    }

    // ============================================================
    // TEST 2: Queue discipline
    // ============================================================

    #[tokio::test]
    async fn serial_triggers_execute_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        registry
            .register_job(
                "ordered",
                handler_fn(move |ctx| {
                    let order = order_clone.clone();
                    async move {
                        order.lock().unwrap().push(ctx.log_id);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        for log_id in 1..=3 {
            registry
                .admit(function_trigger(4, log_id, "ordered", "SERIAL_EXECUTION"))
                .await
                .unwrap();
        }

        for _ in 0..3 {
            next_callback(&mut rx).await;
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrent_admits_never_overlap_execution() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let in_flight = Arc::new(AtomicI32::new(0));
        let max_in_flight = Arc::new(AtomicI32::new(0));
        let in_flight_clone = in_flight.clone();
        let max_clone = max_in_flight.clone();
        registry
            .register_job(
                "exclusive",
                handler_fn(move |_ctx| {
                    let in_flight = in_flight_clone.clone();
                    let max_in_flight = max_clone.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        let admits = (1..=5).map(|log_id| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .admit(function_trigger(5, log_id, "exclusive", "SERIAL_EXECUTION"))
                    .await
                    .unwrap();
            })
        });
        for admit in admits {
            admit.await.unwrap();
        }

        for _ in 0..5 {
            next_callback(&mut rx).await;
        }
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consumer_restarts_after_queue_drains() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        registry
            .register_job("restart", handler_fn(|_ctx| async { Ok(()) }))
            .unwrap();

        registry
            .admit(function_trigger(6, 1, "restart", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        next_callback(&mut rx).await;
        wait_until(|| !registry.has_running(6), "first run drained").await;

        // The consumer exited; a new trigger must win the Idle -> Running
        // transition again and run.
        registry
            .admit(function_trigger(6, 2, "restart", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 2);
        assert_eq!(callback.handle_code, SUCCESS_CODE);
    }

    #[tokio::test]
    async fn has_running_tracks_queue_state() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let release = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(AtomicBool::new(false));
        let release_clone = release.clone();
        let started_clone = started.clone();
        registry
            .register_job(
                "busy",
                handler_fn(move |_ctx| {
                    let release = release_clone.clone();
                    let started = started_clone.clone();
                    async move {
                        started.store(true, Ordering::SeqCst);
                        release.notified().await;
                        Ok(())
                    }
                }),
            )
            .unwrap();

        assert!(!registry.has_running(7));

        registry
            .admit(function_trigger(7, 70, "busy", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        wait_until(|| started.load(Ordering::SeqCst), "handler started").await;
        assert!(registry.has_running(7));

        release.notify_one();
        next_callback(&mut rx).await;
        wait_until(|| !registry.has_running(7), "queue drained").await;
    }

    // ============================================================
    // TEST 3: Blocking strategies
    // ============================================================

    #[tokio::test]
    async fn discard_later_rejects_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let release = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let release_clone = release.clone();
        let started_clone = started.clone();
        let executed_clone = executed.clone();
        registry
            .register_job(
                "discard",
                handler_fn(move |ctx| {
                    let release = release_clone.clone();
                    let started = started_clone.clone();
                    let executed = executed_clone.clone();
                    async move {
                        executed.lock().unwrap().push(ctx.log_id);
                        started.store(true, Ordering::SeqCst);
                        release.notified().await;
                        Ok(())
                    }
                }),
            )
            .unwrap();

        registry
            .admit(function_trigger(8, 1, "discard", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        wait_until(|| started.load(Ordering::SeqCst), "first run started").await;

        // Second trigger arrives while the first is still running
        let rejected = registry
            .admit(function_trigger(8, 2, "discard", "DISCARD_LATER"))
            .await;
        match rejected {
            Err(e @ ExecutorError::BlockStrategyRejection { job_id }) => {
                assert_eq!(job_id, 8);
                assert!(e.is_temporary());
            }
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }

        // The rejection reports immediately, with the soft status code
        let soft = next_callback(&mut rx).await;
        assert_eq!(soft.log_id, 2);
        assert_eq!(soft.handle_code, SUCCESS_CODE);
        assert!(soft.handle_msg.contains("discarded"));

        release.notify_one();
        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 1);
        // The discarded trigger never executed
        assert_eq!(*executed.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cover_early_replaces_active_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let started = Arc::new(AtomicBool::new(false));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let started_clone = started.clone();
        let saw_cancel_clone = saw_cancel.clone();
        let executed_clone = executed.clone();
        registry
            .register_job(
                "cover",
                handler_fn(move |ctx| {
                    let started = started_clone.clone();
                    let saw_cancel = saw_cancel_clone.clone();
                    let executed = executed_clone.clone();
                    async move {
                        executed.lock().unwrap().push(ctx.log_id);
                        if ctx.log_id == 1 {
                            started.store(true, Ordering::SeqCst);
                            ctx.cancelled().await;
                            saw_cancel.store(true, Ordering::SeqCst);
                        }
                        Ok(())
                    }
                }),
            )
            .unwrap();

        registry
            .admit(function_trigger(9, 1, "cover", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        wait_until(|| started.load(Ordering::SeqCst), "first run started").await;

        // Queue one behind the active run, then cover: the active run is
        // cancelled and the queued one is dropped with it
        registry
            .admit(function_trigger(9, 3, "cover", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        registry
            .admit(function_trigger(9, 2, "cover", "COVER_EARLY"))
            .await
            .unwrap();

        let first = next_callback(&mut rx).await;
        let second = next_callback(&mut rx).await;
        assert_eq!(first.log_id, 1);
        assert_eq!(second.log_id, 2);
        assert!(saw_cancel.load(Ordering::SeqCst));
        assert_eq!(*executed.lock().unwrap(), vec![1, 2]);
    }

    // ============================================================
    // TEST 4: Cancellation
    // ============================================================

    #[tokio::test]
    async fn kill_cancels_active_run() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        let started = Arc::new(AtomicBool::new(false));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let started_clone = started.clone();
        let saw_cancel_clone = saw_cancel.clone();
        registry
            .register_job(
                "cancellable",
                handler_fn(move |ctx| {
                    let started = started_clone.clone();
                    let saw_cancel = saw_cancel_clone.clone();
                    async move {
                        started.store(true, Ordering::SeqCst);
                        ctx.cancelled().await;
                        saw_cancel.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        registry
            .admit(function_trigger(10, 100, "cancellable", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        wait_until(|| started.load(Ordering::SeqCst), "run started").await;

        registry.cancel(10);

        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 100);
        assert!(saw_cancel.load(Ordering::SeqCst));
        wait_until(|| !registry.has_running(10), "queue drained after kill").await;
    }

    #[tokio::test]
    async fn kill_of_unknown_job_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        registry.cancel(4242);

        assert!(!registry.has_running(4242));
        assert!(rx.try_recv().is_err());
    }

    // ============================================================
    // TEST 5: Failure containment
    // ============================================================

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        registry
            .register_job(
                "panicky",
                handler_fn(|_ctx| async { panic!("boom in job") }),
            )
            .unwrap();

        registry
            .admit(function_trigger(11, 1, "panicky", "SERIAL_EXECUTION"))
            .await
            .unwrap();

        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.handle_code, FAIL_CODE);
        assert!(callback.handle_msg.contains("boom in job"));

        // The consumer survived; the same queue keeps serving triggers
        registry
            .admit(function_trigger(11, 2, "panicky", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.log_id, 2);
        assert_eq!(callback.handle_code, FAIL_CODE);
    }

    #[tokio::test]
    async fn handler_error_reports_failure_code() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        registry
            .register_job(
                "failing",
                handler_fn(|_ctx| async { Err(anyhow::anyhow!("intentional error")) }),
            )
            .unwrap();

        registry
            .admit(function_trigger(12, 1, "failing", "SERIAL_EXECUTION"))
            .await
            .unwrap();

        let callback = next_callback(&mut rx).await;
        assert_eq!(callback.handle_code, FAIL_CODE);
        assert!(callback.handle_msg.contains("intentional error"));
    }

    // ============================================================
    // TEST 6: Reporter code mapping
    // ============================================================

    #[tokio::test]
    async fn reporter_distinguishes_soft_and_hard_outcomes() {
        let (reporter, mut rx) = ResultReporter::channel();

        reporter.report(1, 11, Ok(()));
        reporter.report(
            2,
            22,
            Err(&ExecutorError::BlockStrategyRejection { job_id: 9 }),
        );
        reporter.report(3, 33, Err(&ExecutorError::HandlerFailed("broken".to_string())));

        let success = rx.recv().await.unwrap();
        assert_eq!(success.handle_code, SUCCESS_CODE);
        assert_eq!(success.handle_msg, "success");

        let soft = rx.recv().await.unwrap();
        assert_eq!(soft.handle_code, SUCCESS_CODE);
        assert!(soft.handle_msg.contains("discarded"));

        let hard = rx.recv().await.unwrap();
        assert_eq!(hard.handle_code, FAIL_CODE);
        assert!(hard.handle_msg.contains("broken"));
    }

    // ============================================================
    // TEST 7: Parameter parsing
    // ============================================================

    #[test]
    fn input_params_parse_key_value_pairs() {
        let params = parse_input_params("a=1,b=2");
        assert_eq!(params.len(), 2);
        assert_eq!(params["a"], "1");
        assert_eq!(params["b"], "2");
    }

    #[test]
    fn input_params_drop_malformed_segments() {
        let params = parse_input_params("a=1,,c");
        assert_eq!(params.len(), 1);
        assert_eq!(params["a"], "1");
    }

    #[test]
    fn input_params_empty_string_is_empty_map() {
        assert!(parse_input_params("").is_empty());
    }

    #[test]
    fn input_params_last_occurrence_wins() {
        let params = parse_input_params("a=1,a=2");
        assert_eq!(params.len(), 1);
        assert_eq!(params["a"], "2");
    }

    // ============================================================
    // TEST 8: Script strategy
    // ============================================================

    #[tokio::test]
    async fn script_source_write_is_idempotent_per_version() {
        let dir = tempfile::tempdir().unwrap();
        let glue_dir = dir.path().join("gluesource");
        let strategy = ExecutionStrategy::script(glue_dir.clone(), dir.path().join("logs"));

        let mut first = script_trigger(7, 1, "GLUE_SHELL", "echo one");
        first.glue_updatetime = 100;
        strategy.parse(&first).await.unwrap();

        // Same version with different source: the first write stays
        let mut replay = script_trigger(7, 2, "GLUE_SHELL", "echo two");
        replay.glue_updatetime = 100;
        strategy.parse(&replay).await.unwrap();

        let v100 = glue_dir.join("7_100.sh");
        assert_eq!(std::fs::read_to_string(&v100).unwrap(), "echo one");

        // New version stamp: a second, independent file
        let mut updated = script_trigger(7, 3, "GLUE_SHELL", "echo three");
        updated.glue_updatetime = 200;
        strategy.parse(&updated).await.unwrap();

        let v200 = glue_dir.join("7_200.sh");
        assert_eq!(std::fs::read_to_string(&v200).unwrap(), "echo three");
        assert_eq!(std::fs::read_dir(&glue_dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn script_job_runs_and_logs_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let strategy =
            ExecutionStrategy::script(dir.path().join("gluesource"), log_dir.clone());

        let trigger = script_trigger(21, 210, "GLUE_SHELL", "echo hello-from-script");
        let request = strategy.parse(&trigger).await.unwrap();
        let outcome = strategy
            .execute(21, &request, CancellationToken::new())
            .await;
        assert!(outcome.is_ok());

        let log_path =
            crate::joblog::log_file_path(&log_dir, chrono::Local::now(), 210);
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("hello-from-script"));
    }

    #[tokio::test]
    async fn script_nonzero_exit_is_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = ExecutionStrategy::script(
            dir.path().join("gluesource"),
            dir.path().join("logs"),
        );

        let trigger = script_trigger(22, 220, "GLUE_SHELL", "exit 3");
        let request = strategy.parse(&trigger).await.unwrap();
        let outcome = strategy
            .execute(22, &request, CancellationToken::new())
            .await;

        assert!(matches!(outcome, Err(ExecutorError::ProcessFailure(_))));
    }

    // ============================================================
    // TEST 9: Registry reset
    // ============================================================

    #[tokio::test]
    async fn reset_clears_queues_and_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, mut rx) = test_registry(dir.path());

        registry
            .register_job("resettable", handler_fn(|_ctx| async { Ok(()) }))
            .unwrap();
        registry
            .admit(function_trigger(13, 1, "resettable", "SERIAL_EXECUTION"))
            .await
            .unwrap();
        next_callback(&mut rx).await;

        registry.reset();

        assert!(!registry.has_handler("resettable"));
        assert!(!registry.has_running(13));
        // Registration works again, as if the process had just started
        registry
            .register_job("resettable", handler_fn(|_ctx| async { Ok(()) }))
            .unwrap();
    }
}
