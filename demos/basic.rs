use std::sync::Arc;

use rulebook::{by_ids, fact, rule_ref, Facts, ResultCode, RuleRepositoryBuilder, TracingPublisher, Validator};

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let repository = RuleRepositoryBuilder::new()
        .rule("eligible_age", |r| r.when(fact("user/age").gte(18_i64)))
        .rule("active_account", |r| {
            r.when_with_reason(fact("user/status").eq("active"), "account is not active")
        })
        .rule("can_proceed", |r| {
            r.when(rule_ref("eligible_age").and(rule_ref("active_account")))
        })
        .build()
        .expect("rule ids are unique");

    let validator = Validator::builder(repository)
        .publisher(Arc::new(TracingPublisher))
        .build();

    let facts = Facts::map([(
        "user",
        Facts::map([("age", Facts::from(25_i64)), ("status", Facts::from("suspended"))]),
    )]);

    let report = validator
        .validate(&facts, &by_ids(["can_proceed"]))
        .expect("every selected rule exists");

    println!("{report}");
    for entry in report.filter_severity(ResultCode::Failed).sorted().iter() {
        println!("  {entry}");
    }
}
