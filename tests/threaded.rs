use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rulebook::{
    all_rules, by_ids, fact, rule_ref, CollectingPublisher, Facts, ResultCode, RuleRepositoryBuilder,
    RuleResult, RuleSelector, ThreadExecutor, TokioExecutor, ValidationContext, Validator,
};

fn slow_counter(calls: &Arc<AtomicUsize>) -> RuleRepositoryBuilder {
    let calls = Arc::clone(calls);
    RuleRepositoryBuilder::new().rule("slow", move |r| {
        r.validate_with(move |_, facts| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(if facts.as_i64() == Some(1) {
                RuleResult::ok()
            } else {
                RuleResult::failed_because("not one")
            })
        })
    })
}

#[test]
fn racing_branches_share_one_execution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let publisher = Arc::new(CollectingPublisher::new());
    let ctx = ValidationContext::builder(Arc::new(slow_counter(&calls).build().unwrap()))
        .publisher(publisher.clone())
        .build();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mut branch = ctx.branch();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let executor = Arc::clone(branch.executor());
                let rule = branch.repository().get_rule("slow").unwrap();
                barrier.wait();
                executor.validate(&mut branch, &rule, &Facts::Int(1))
            })
        })
        .collect();

    let results: Vec<RuleResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(RuleResult::is_ok));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(publisher.started_count(), 1);
    assert_eq!(publisher.finished_count(), 1);
}

#[test]
fn validators_are_shared_across_threads() {
    let repository = RuleRepositoryBuilder::new()
        .rule("eligible_age", |r| r.when(fact("age").gte(18_i64)))
        .rule("active_account", |r| r.when(fact("status").eq("active")))
        .rule("can_proceed", |r| {
            r.when(rule_ref("eligible_age").and(rule_ref("active_account")))
        })
        .build()
        .unwrap();
    let validator = Arc::new(Validator::builder(repository).build());

    let inputs = [(25_i64, "active"), (30, "inactive"), (15, "active"), (40, "active")];
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|(age, status)| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                let facts = Facts::map([("age", Facts::from(age)), ("status", Facts::from(status))]);
                validator
                    .validate(&facts, &by_ids(["can_proceed"]))
                    .unwrap()
                    .entries_for("can_proceed")
                    .severity()
            })
        })
        .collect();

    let results: Vec<Option<ResultCode>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![
            Some(ResultCode::Ok),
            Some(ResultCode::Failed),
            Some(ResultCode::Failed),
            Some(ResultCode::Ok),
        ]
    );
}

#[test]
fn thread_executor_runs_async_bodies() {
    let calls = Arc::new(AtomicUsize::new(0));
    let validator = Validator::builder(slow_counter(&calls).build().unwrap())
        .tasks(Arc::new(ThreadExecutor::default()))
        .build();
    let selector: Arc<dyn RuleSelector> = Arc::new(all_rules());
    let report = futures::executor::block_on(validator.validate_async(Facts::Int(2), selector)).unwrap();
    assert_eq!(report.severity(), Some(ResultCode::Failed));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_fan_out_on_tokio_matches_sync() {
    let repository = RuleRepositoryBuilder::new()
        .rule("positive", |r| r.when(rulebook::this().gt(0_i64)))
        .rule("all_positive", |r| r.dispatch().on("values/*", by_ids(["positive"])).build())
        .build()
        .unwrap();
    let executor = TokioExecutor::current().unwrap();
    let validator = Validator::builder(repository)
        .tasks(Arc::new(executor))
        .build();

    let facts = Facts::map([("values", Facts::list((0_i64..20).map(|i| i - 3)))]);
    let selector: Arc<dyn RuleSelector> = Arc::new(by_ids(["all_positive"]));
    let async_report = validator.validate_async(facts.clone(), selector).await.unwrap();

    let sync_validator = validator.clone();
    let sync_report = tokio::task::spawn_blocking(move || {
        sync_validator.validate(&facts, &by_ids(["all_positive"])).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(async_report.sorted(), sync_report.sorted());
    assert_eq!(async_report.filter_severity(ResultCode::Failed).len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_async_waiters_share_the_owner_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = ValidationContext::builder(Arc::new(slow_counter(&calls).build().unwrap()))
        .tasks(Arc::new(TokioExecutor::current().unwrap()))
        .build();
    let executor = Arc::clone(ctx.executor());
    let rule = ctx.repository().get_rule("slow").unwrap();

    let pending: Vec<_> = (0..6)
        .map(|_| tokio::spawn(executor.validate_async(ctx.branch(), Arc::clone(&rule), Facts::Int(7))))
        .collect();
    let mut results = Vec::new();
    for handle in pending {
        results.push(handle.await.unwrap());
    }
    assert!(results.iter().all(|r| r == &RuleResult::failed_because("not one")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[derive(Debug)]
struct Connection {
    id: usize,
}

#[test]
fn racing_branches_build_one_extension() {
    let opened = Arc::new(AtomicUsize::new(0));
    let repository = RuleRepositoryBuilder::new().build().unwrap();
    let ctx = ValidationContext::builder(Arc::new(repository)).build();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let branch = ctx.branch();
            let barrier = Arc::clone(&barrier);
            let opened = Arc::clone(&opened);
            thread::spawn(move || {
                barrier.wait();
                branch.extension_with(|| {
                    let id = opened.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    Connection { id }
                })
            })
        })
        .collect();

    let connections: Vec<Arc<Connection>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert!(connections.iter().all(|c| Arc::ptr_eq(c, &connections[0])));
    assert_eq!(connections[0].id, 0);
}
