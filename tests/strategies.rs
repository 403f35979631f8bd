#![allow(dead_code)]

use proptest::prelude::*;
use rulebook::{
    fact, rule_ref, Condition, Facts, ResultCode, ResultReason, RuleRepositoryBuilder, RuleResult,
};

// --- Fixed facts schema ---
// user/age    : int (0..=120)
// user/status : text, one of {"active", "inactive", "suspended"}
// user/banned : bool
// user/region : text, one of {"us-east", "us-west", "eu", "ap"}

const STATUSES: &[&str] = &["active", "inactive", "suspended"];
const REGIONS: &[&str] = &["us-east", "us-west", "eu", "ap"];
const KEYS: &[&str] = &["a", "b", "c", "items", "name"];

/// Generate facts that align with the fixed schema.
pub fn arb_user() -> impl Strategy<Value = Facts> {
    (
        0_i64..=120,
        prop::sample::select(STATUSES),
        any::<bool>(),
        prop::sample::select(REGIONS),
    )
        .prop_map(|(age, status, banned, region)| {
            Facts::map([(
                "user",
                Facts::map([
                    ("age", Facts::from(age)),
                    ("status", Facts::from(status)),
                    ("banned", Facts::from(banned)),
                    ("region", Facts::from(region)),
                ]),
            )])
        })
}

// --- Arbitrary facts graphs ---

fn arb_scalar() -> impl Strategy<Value = Facts> {
    prop_oneof![
        Just(Facts::Null),
        any::<bool>().prop_map(Facts::from),
        (-50_i64..50).prop_map(Facts::from),
        "[a-z]{0,4}".prop_map(Facts::from),
    ]
}

/// Nested lists and maps with scalar leaves, at most `depth` levels deep.
pub fn arb_facts(depth: u32) -> impl Strategy<Value = Facts> {
    arb_scalar().prop_recursive(depth, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Facts::list),
            prop::collection::btree_map(prop::sample::select(KEYS), inner, 0..4)
                .prop_map(|entries| Facts::map(entries)),
        ]
    })
}

/// Number of nodes in a facts graph, the root included.
pub fn count_nodes(facts: &Facts) -> usize {
    let children: usize = match facts {
        Facts::List(items) => items.iter().map(count_nodes).sum(),
        Facts::Map(entries) => entries.values().map(count_nodes).sum(),
        _ => 0,
    };
    1 + children
}

// --- Path strings ---

/// Path strings in the default syntax, including empty segments and
/// wildcard look-alikes.
pub fn arb_path_text() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        "[a-z0-9]{0,3}",
        Just("*".to_owned()),
        Just("**".to_owned()),
        Just("a*".to_owned()),
        Just("***".to_owned()),
    ];
    prop::collection::vec(segment, 0..5).prop_map(|segments| segments.join("/"))
}

/// Concrete (wildcard-free) path strings over the keys used by `arb_facts`.
pub fn arb_concrete_path() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        prop::sample::select(KEYS).prop_map(str::to_owned),
        (0_usize..4).prop_map(|i| i.to_string()),
    ];
    prop::collection::vec(segment, 1..4).prop_map(|segments| segments.join("/"))
}

// --- Results ---

pub fn arb_code() -> impl Strategy<Value = ResultCode> {
    prop_oneof![
        Just(ResultCode::Ok),
        Just(ResultCode::Skipped),
        Just(ResultCode::Failed),
    ]
}

pub fn arb_result() -> impl Strategy<Value = RuleResult> {
    (arb_code(), prop::option::of("[a-z]{1,6}"))
        .prop_map(|(code, reason)| RuleResult::new(code, reason.map(ResultReason::message)))
}

// --- Rule repositories ---

/// Generate a leaf comparison on a random field of the schema.
fn arb_leaf_condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        (0_i64..=120, 0_u8..6).prop_map(|(val, op)| {
            let f = fact("user/age");
            match op {
                0 => f.eq(val),
                1 => f.neq(val),
                2 => f.gt(val),
                3 => f.gte(val),
                4 => f.lt(val),
                _ => f.lte(val),
            }
        }),
        (prop::sample::select(STATUSES), any::<bool>()).prop_map(|(val, is_eq)| {
            if is_eq {
                fact("user/status").eq(val)
            } else {
                fact("user/status").neq(val)
            }
        }),
        any::<bool>().prop_map(|val| fact("user/banned").eq(val)),
        prop::sample::select(REGIONS).prop_map(|val| fact("user/region").eq(val)),
    ]
}

/// A composite condition tree (AND, OR, XOR, NOT of leaves), bounded depth.
fn arb_condition(max_depth: u32) -> impl Strategy<Value = Condition> {
    arb_leaf_condition().prop_recursive(max_depth, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.xor(b)),
            inner.prop_map(|c| !c),
        ]
    })
}

/// A generated rule: id plus condition.
#[derive(Debug, Clone)]
pub struct GenRule {
    pub id: String,
    pub condition: Condition,
}

/// A generated acyclic repository.
#[derive(Debug, Clone)]
pub struct GenRepository {
    pub rules: Vec<GenRule>,
}

impl GenRepository {
    #[must_use]
    pub fn builder(&self) -> RuleRepositoryBuilder {
        let mut builder = RuleRepositoryBuilder::new();
        for rule in &self.rules {
            let condition = rule.condition.clone();
            builder = builder.rule(&rule.id, move |r| r.when(condition));
        }
        builder
    }
}

/// Leaf rules over the schema, then rules chaining earlier ones with
/// `rule_ref`. Every reference points backwards, so the graph is acyclic.
pub fn arb_repository() -> impl Strategy<Value = GenRepository> {
    (2_usize..=5, 1_usize..=3).prop_flat_map(|(n_leaves, n_chained)| {
        (
            prop::collection::vec(arb_condition(2), n_leaves),
            prop::collection::vec((any::<bool>(), any::<bool>(), 0..n_leaves, 0..n_leaves), n_chained),
        )
            .prop_map(|(leaf_conditions, chains)| {
                let mut rules: Vec<GenRule> = leaf_conditions
                    .into_iter()
                    .enumerate()
                    .map(|(i, condition)| GenRule {
                        id: format!("leaf_{i}"),
                        condition,
                    })
                    .collect();
                for (i, (is_and, negate, a, b)) in chains.into_iter().enumerate() {
                    let ref_a = rule_ref(&rules[a].id);
                    let ref_b = rule_ref(&rules[b].id);
                    let combined = if is_and { ref_a.and(ref_b) } else { ref_a.or(ref_b) };
                    rules.push(GenRule {
                        id: format!("chain_{i}"),
                        condition: if negate { !combined } else { combined },
                    });
                }
                GenRepository { rules }
            })
    })
}
