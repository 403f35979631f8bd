use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::condition::Condition;
use super::context::ValidationContext;
use super::error::ValidationError;
use super::facts::Facts;
use super::result::RuleResult;
use super::selector::RuleSelector;
use crate::compose::{DispatchingRuleBuilder, SelectorRule};

/// Rule identifier. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(Arc<str>);

impl RuleId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        RuleId(Arc::from(value))
    }
}

impl From<String> for RuleId {
    fn from(value: String) -> Self {
        RuleId(Arc::from(value))
    }
}

impl From<&RuleId> for RuleId {
    fn from(value: &RuleId) -> Self {
        value.clone()
    }
}

/// Key/value annotations attached to a rule and readable from conditions via
/// [`meta`](crate::meta).
pub type Metadata = BTreeMap<String, Facts>;

/// The descriptive part shared by every rule.
#[derive(Debug, Clone)]
pub struct RuleInfo {
    id: RuleId,
    facts_type: Option<String>,
    metadata: Metadata,
    preconditions: Vec<Condition>,
}

impl RuleInfo {
    pub fn new(id: impl Into<RuleId>) -> Self {
        Self {
            id: id.into(),
            facts_type: None,
            metadata: Metadata::new(),
            preconditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// The kind of facts the rule expects. Advisory only.
    #[must_use]
    pub fn facts_type(&self) -> Option<&str> {
        self.facts_type.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn preconditions(&self) -> &[Condition] {
        &self.preconditions
    }
}

/// A named validation over one facts value.
///
/// Rules are immutable and identified by id. The executor evaluates the
/// preconditions before calling [`Rule::validate`]; implementations only
/// provide the body.
pub trait Rule: fmt::Debug + Send + Sync + 'static {
    fn info(&self) -> &RuleInfo;

    fn id(&self) -> &RuleId {
        self.info().id()
    }

    fn facts_type(&self) -> Option<&str> {
        self.info().facts_type()
    }

    fn metadata(&self) -> &Metadata {
        self.info().metadata()
    }

    fn preconditions(&self) -> &[Condition] {
        self.info().preconditions()
    }

    /// Run the rule body on the calling thread.
    ///
    /// # Errors
    ///
    /// Any error is turned into a [`Failed`](crate::ResultCode::Failed) result
    /// by the executor.
    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<RuleResult, ValidationError>;

    /// Run the rule body asynchronously. The default submits [`Rule::validate`]
    /// to the context's task executor.
    fn validate_async(
        self: Arc<Self>,
        ctx: ValidationContext,
        facts: Facts,
    ) -> BoxFuture<'static, Result<RuleResult, ValidationError>> {
        crate::tasks::run_body(self, ctx, facts)
    }
}

/// Ok when the condition holds, otherwise Failed.
#[derive(Debug, Clone)]
pub struct ConditionRule {
    info: RuleInfo,
    condition: Condition,
    reason: Option<String>,
}

impl ConditionRule {
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }
}

impl Rule for ConditionRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<RuleResult, ValidationError> {
        if self.condition.test(ctx, facts)? {
            return Ok(RuleResult::ok());
        }
        Ok(match &self.reason {
            Some(reason) => RuleResult::failed_because(reason.clone()),
            None => RuleResult::failed_because(format!("condition not satisfied: {}", self.condition)),
        })
    }
}

type RuleBody = dyn Fn(&mut ValidationContext, &Facts) -> Result<RuleResult, ValidationError> + Send + Sync;

/// A rule whose body is a closure.
#[derive(Clone)]
pub struct FnRule {
    info: RuleInfo,
    body: Arc<RuleBody>,
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("info", &self.info).finish_non_exhaustive()
    }
}

impl Rule for FnRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<RuleResult, ValidationError> {
        (self.body)(ctx, facts)
    }
}

/// Builder for the standard rule shapes.
///
/// # Example
///
/// ```
/// use rulebook::{RuleBuilder, fact};
///
/// let rule = RuleBuilder::new("adult")
///     .facts_type("person")
///     .metadata("min_age", 18_i64)
///     .precondition(fact("age").is_not_null())
///     .when(fact("age").gte(18_i64));
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    info: RuleInfo,
}

impl RuleBuilder {
    pub fn new(id: impl Into<RuleId>) -> Self {
        Self {
            info: RuleInfo::new(id),
        }
    }

    #[must_use]
    pub fn facts_type(mut self, facts_type: impl Into<String>) -> Self {
        self.info.facts_type = Some(facts_type.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Facts>) -> Self {
        self.info.metadata.insert(key.into(), value.into());
        self
    }

    /// Add a precondition. Preconditions run in insertion order; the first
    /// one that does not hold skips the rule.
    #[must_use]
    pub fn precondition(mut self, condition: impl Into<Condition>) -> Self {
        self.info.preconditions.push(condition.into());
        self
    }

    #[must_use]
    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    /// Finish as a rule that is Ok when `condition` holds.
    #[must_use]
    pub fn when(self, condition: impl Into<Condition>) -> ConditionRule {
        ConditionRule {
            info: self.info,
            condition: condition.into(),
            reason: None,
        }
    }

    /// Like [`RuleBuilder::when`] with a fixed failure reason.
    #[must_use]
    pub fn when_with_reason(self, condition: impl Into<Condition>, reason: impl Into<String>) -> ConditionRule {
        ConditionRule {
            info: self.info,
            condition: condition.into(),
            reason: Some(reason.into()),
        }
    }

    /// Finish with a closure body.
    #[must_use]
    pub fn validate_with<F>(self, body: F) -> FnRule
    where
        F: Fn(&mut ValidationContext, &Facts) -> Result<RuleResult, ValidationError> + Send + Sync + 'static,
    {
        FnRule {
            info: self.info,
            body: Arc::new(body),
        }
    }

    /// Continue as a rule that dispatches sub-paths of the facts to selectors.
    #[must_use]
    pub fn dispatch(self) -> DispatchingRuleBuilder {
        DispatchingRuleBuilder::new(self.info)
    }

    /// Finish as a rule that applies `selector` to the same facts.
    #[must_use]
    pub fn select(self, selector: impl RuleSelector + 'static) -> SelectorRule {
        SelectorRule::new(self.info, Arc::new(selector))
    }
}
