//! Validates every node of a tree with a rule that dispatches to itself.

use rulebook::{by_ids, fact, Facts, ResultCode, RuleRepositoryBuilder, Validator};

fn node(name: &str, children: Vec<Facts>) -> Facts {
    Facts::map([("name", Facts::from(name)), ("children", Facts::List(children.into()))])
}

fn main() {
    tracing_subscriber::fmt().init();

    let repository = RuleRepositoryBuilder::new()
        .rule("named", |r| r.when(fact("name").neq("")))
        .rule("tree", |r| {
            r.dispatch()
                .on("", by_ids(["named"]))
                .on("children/*", by_ids(["tree"]))
                .build()
        })
        .build()
        .expect("rule ids are unique");
    let validator = Validator::builder(repository).build();

    let tree = node(
        "root",
        vec![
            node("left", vec![node("leaf", Vec::new())]),
            node("", vec![node("deep", vec![node("", Vec::new())])]),
        ],
    );

    let report = validator
        .validate(&tree, &by_ids(["tree"]))
        .expect("every selected rule exists");
    println!("{report}");
    for entry in report.filter_severity(ResultCode::Failed).entries_for("named").sorted().iter() {
        println!("unnamed node at /{}", entry.path());
    }
}
