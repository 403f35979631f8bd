//! A memoizing business-rule validation engine.
//!
//! Rules are declared with builders, stored in a [`RuleRepository`] and run
//! by a [`Validator`] against nested [`Facts`]. Every call produces a
//! [`Report`] of per-rule outcomes (ok, skipped or failed) with the path of
//! the validated value.
//!
//! ```
//! use rulebook::{all_rules, fact, rule_ref, Facts, ResultCode, RuleRepositoryBuilder, Validator};
//!
//! let repository = RuleRepositoryBuilder::new()
//!     .rule("age_ok", |r| r.when(fact("age").gte(18_i64)))
//!     .rule("active", |r| r.when(fact("status").eq("active")))
//!     .rule("allowed", |r| r.when(rule_ref("age_ok").and(rule_ref("active"))))
//!     .build()
//!     .unwrap();
//! let validator = Validator::builder(repository).build();
//!
//! let facts = Facts::map([("age", Facts::from(20_i64)), ("status", Facts::from("inactive"))]);
//! let report = validator.validate(&facts, &all_rules()).unwrap();
//! assert_eq!(report.severity(), Some(ResultCode::Failed));
//! assert_eq!(report.filter_severity(ResultCode::Failed).len(), 2);
//! ```

mod cache;
mod compose;
mod events;
mod executor;
mod extensions;
pub mod path;
mod reporter;
mod tasks;
mod types;
mod validator;

pub use compose::{DispatchingRule, DispatchingRuleBuilder, Forwarding, SelectorRule};
pub use events::{CollectingPublisher, EventPublisher, NoopPublisher, RuleEvent, TracingPublisher};
pub use executor::{ExecutorConfig, RuleExecutor};
pub use extensions::{ExtensionFactories, Extensions};
pub use path::{PathResolver, PathSyntax, Resolved};
pub use reporter::{AllOkReporter, CollectingReporter, Reporter};
#[cfg(feature = "tokio")]
pub use tasks::TokioExecutor;
pub use tasks::{InlineExecutor, Job, TaskExecutor, ThreadExecutor};
pub use types::{
    AllRules, CategorySelector, CategorySelectorBuilder, ChainSelector, CompareOp, Component,
    CompositeRuleRepository, Condition, ConditionRule, ContextBuilder, Facts, FilteredRuleRepository,
    FnRule, FromFacts, IdSelector, Metadata, MutableRuleRepository, Operand, Path, PathFrame,
    PatternSelector, PredicateSelector, Record, Report, ReportEntry, RepositoryListener, ResultCode,
    ResultReason, Rule, RuleBuilder, RuleCondition, RuleFrame, RuleId, RuleInfo, RuleRef,
    RuleRepository, RuleRepositoryBuilder, RuleResult, RuleSelector, SimpleRuleRepository,
    ValidationContext, ValidationError, Value, all_rules, by_ids, by_pattern, by_predicate, fact,
    literal, meta, param, rule_ref, rules, this,
};
pub use validator::{Validator, ValidatorBuilder};
