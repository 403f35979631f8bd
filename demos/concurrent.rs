//! Fans a dispatching rule out over a tokio runtime and compares the outcome
//! with the blocking path.

use std::sync::Arc;

use rulebook::{by_ids, this, Facts, RuleRepositoryBuilder, RuleSelector, TokioExecutor, Validator};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt().init();

    let repository = RuleRepositoryBuilder::new()
        .rule("in_stock", |r| r.when(this().gt(0_i64)))
        .rule("inventory", |r| r.dispatch().on("stock/*", by_ids(["in_stock"])).build())
        .build()
        .expect("rule ids are unique");
    let validator = Validator::builder(repository)
        .tasks(Arc::new(TokioExecutor::current().expect("running inside a runtime")))
        .build();

    let facts = Facts::map([("stock", Facts::list([4_i64, 0, 12, 7, 0, 1]))]);
    let selector: Arc<dyn RuleSelector> = Arc::new(by_ids(["inventory"]));
    let report = validator
        .validate_async(facts.clone(), selector)
        .await
        .expect("every selected rule exists");
    println!("async: {report}");

    let blocking = validator.clone();
    let sync_report = tokio::task::spawn_blocking(move || blocking.validate(&facts, &by_ids(["inventory"])))
        .await
        .expect("blocking task completes")
        .expect("every selected rule exists");
    println!("sync:  {sync_report}");
    println!("same outcome: {}", report == sync_report);
}
