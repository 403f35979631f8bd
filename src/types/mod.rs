mod condition;
mod context;
mod error;
mod facts;
mod path;
mod report;
mod repository;
mod result;
mod rule;
mod selector;
mod value;

pub use condition::{
    CompareOp, Condition, Operand, RuleCondition, RuleRef, fact, literal, meta, param, rule_ref,
    rules, this,
};
pub use context::{ContextBuilder, PathFrame, RuleFrame, ValidationContext};
pub use error::ValidationError;
pub use facts::{Facts, FromFacts, Record};
pub use path::{Component, Path};
pub(crate) use path::parse_index;
pub use report::{Report, ReportEntry};
pub use repository::{
    CompositeRuleRepository, FilteredRuleRepository, MutableRuleRepository, RepositoryListener,
    RuleRepository, RuleRepositoryBuilder, SimpleRuleRepository,
};
pub use result::{ResultCode, ResultReason, RuleResult};
pub use rule::{ConditionRule, FnRule, Metadata, Rule, RuleBuilder, RuleId, RuleInfo};
pub use selector::{
    AllRules, CategorySelector, CategorySelectorBuilder, ChainSelector, IdSelector,
    PatternSelector, PredicateSelector, RuleSelector, all_rules, by_ids, by_pattern, by_predicate,
};
pub use value::Value;
