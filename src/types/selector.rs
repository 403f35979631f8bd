use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use super::context::ValidationContext;
use super::error::ValidationError;
use super::facts::Facts;
use super::repository::RuleRepository;
use super::rule::{Rule, RuleId};
use super::value::Value;

/// Picks the ordered list of rules to run for some facts.
pub trait RuleSelector: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns [`ValidationError::RuleNotFound`] when a named rule is missing,
    /// or any error raised while evaluating a selection key.
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError>;
}

impl<S: RuleSelector + ?Sized> RuleSelector for Arc<S> {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        (**self).select_rules(repository, ctx, facts)
    }
}

/// Selects rules by id, in the order given. Unknown ids are an error.
#[derive(Debug, Clone)]
pub struct IdSelector {
    ids: Vec<RuleId>,
}

impl IdSelector {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RuleId>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[RuleId] {
        &self.ids
    }
}

impl RuleSelector for IdSelector {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        self.ids.iter().map(|id| repository.get_rule(id.as_str())).collect()
    }
}

/// Selects every rule whose whole id matches a regular expression, in
/// repository order.
#[derive(Debug, Clone)]
pub struct PatternSelector {
    pattern: Regex,
}

impl PatternSelector {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSelectorPattern`] if `pattern` is not
    /// a valid regular expression.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let pattern = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { pattern })
    }
}

impl RuleSelector for PatternSelector {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        repository
            .rule_ids()
            .into_iter()
            .filter(|id| self.pattern.is_match(id.as_str()))
            .map(|id| repository.get_rule(id.as_str()))
            .collect()
    }
}

type RulePredicate = dyn Fn(&dyn Rule) -> bool + Send + Sync;

/// Selects every rule satisfying a predicate, in repository order.
#[derive(Clone)]
pub struct PredicateSelector {
    label: String,
    predicate: Arc<RulePredicate>,
}

impl PredicateSelector {
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Rule) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PredicateSelector").field(&self.label).finish()
    }
}

impl RuleSelector for PredicateSelector {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        let mut selected = Vec::new();
        for id in repository.rule_ids() {
            let rule = repository.get_rule(id.as_str())?;
            if (self.predicate)(rule.as_ref()) {
                selected.push(rule);
            }
        }
        Ok(selected)
    }
}

/// Selects every rule in the repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllRules;

impl RuleSelector for AllRules {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        repository
            .rule_ids()
            .iter()
            .map(|id| repository.get_rule(id.as_str()))
            .collect()
    }
}

/// Ordered union of several selectors. A rule picked twice is kept at its
/// first position.
#[derive(Debug, Clone, Default)]
pub struct ChainSelector {
    selectors: Vec<Arc<dyn RuleSelector>>,
}

impl ChainSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, selector: impl RuleSelector + 'static) -> Self {
        self.selectors.push(Arc::new(selector));
        self
    }
}

impl RuleSelector for ChainSelector {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for selector in &self.selectors {
            for rule in selector.select_rules(repository, ctx, facts)? {
                if seen.insert(rule.id().clone()) {
                    selected.push(rule);
                }
            }
        }
        Ok(selected)
    }
}

/// Chooses a selector from a table keyed by a value computed from the facts.
///
/// Built with [`CategorySelector::on`]; the builder only produces a selector
/// once the fallback is given with [`CategorySelectorBuilder::otherwise`].
#[derive(Debug, Clone)]
pub struct CategorySelector {
    key: Value<Facts>,
    cases: IndexMap<Facts, Arc<dyn RuleSelector>>,
    otherwise: Arc<dyn RuleSelector>,
}

#[derive(Debug, Clone)]
pub struct CategorySelectorBuilder {
    key: Value<Facts>,
    cases: IndexMap<Facts, Arc<dyn RuleSelector>>,
}

impl CategorySelector {
    pub fn on(key: impl Into<Value<Facts>>) -> CategorySelectorBuilder {
        CategorySelectorBuilder {
            key: key.into(),
            cases: IndexMap::new(),
        }
    }
}

impl CategorySelectorBuilder {
    /// Map a key value to a selector. A repeated key replaces the earlier case.
    #[must_use]
    pub fn case(mut self, key: impl Into<Facts>, selector: impl RuleSelector + 'static) -> Self {
        self.cases.insert(key.into(), Arc::new(selector));
        self
    }

    #[must_use]
    pub fn otherwise(self, selector: impl RuleSelector + 'static) -> CategorySelector {
        CategorySelector {
            key: self.key,
            cases: self.cases,
            otherwise: Arc::new(selector),
        }
    }
}

impl RuleSelector for CategorySelector {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<Arc<dyn Rule>>, ValidationError> {
        let key = self.key.evaluate(ctx, facts)?;
        let selector = self.cases.get(&key).unwrap_or(&self.otherwise);
        selector.select_rules(repository, ctx, facts)
    }
}

/// Select rules by id.
pub fn by_ids<I, S>(ids: I) -> IdSelector
where
    I: IntoIterator<Item = S>,
    S: Into<RuleId>,
{
    IdSelector::new(ids)
}

/// Select rules whose id matches `pattern`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidSelectorPattern`] for an invalid regex.
pub fn by_pattern(pattern: &str) -> Result<PatternSelector, ValidationError> {
    PatternSelector::new(pattern)
}

pub fn by_predicate<F>(label: &str, predicate: F) -> PredicateSelector
where
    F: Fn(&dyn Rule) -> bool + Send + Sync + 'static,
{
    PredicateSelector::new(label, predicate)
}

#[must_use]
pub fn all_rules() -> AllRules {
    AllRules
}
