use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::error::ValidationError;
use super::rule::{Rule, RuleBuilder, RuleId};

/// Notified when the rules of a repository change.
pub trait RepositoryListener: Send + Sync {
    fn rules_changed(&self, ids: &[RuleId]);
}

/// Id to rule lookup.
pub trait RuleRepository: fmt::Debug + Send + Sync {
    fn knows_rule_id(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// Returns [`ValidationError::RuleNotFound`] for an unknown id.
    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError>;

    /// Every id, in registration order.
    fn rule_ids(&self) -> Vec<RuleId>;

    /// Register a change listener.
    ///
    /// The default drops `listener`: an immutable repository never changes,
    /// so there is nothing to notify. Repositories whose rules can change
    /// must override this.
    fn subscribe(&self, listener: Arc<dyn RepositoryListener>) {
        drop(listener);
    }
}

impl<R: RuleRepository + ?Sized> RuleRepository for Arc<R> {
    fn knows_rule_id(&self, id: &str) -> bool {
        (**self).knows_rule_id(id)
    }

    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError> {
        (**self).get_rule(id)
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        (**self).rule_ids()
    }

    fn subscribe(&self, listener: Arc<dyn RepositoryListener>) {
        (**self).subscribe(listener);
    }
}

fn not_found(id: &str) -> ValidationError {
    ValidationError::RuleNotFound { id: id.to_owned() }
}

fn index_rules(
    rules: impl IntoIterator<Item = Arc<dyn Rule>>,
) -> Result<IndexMap<RuleId, Arc<dyn Rule>>, ValidationError> {
    let mut indexed = IndexMap::new();
    for rule in rules {
        let id = rule.id().clone();
        if indexed.contains_key(&id) {
            return Err(ValidationError::DuplicateRuleId { id: id.to_string() });
        }
        indexed.insert(id, rule);
    }
    Ok(indexed)
}

/// An immutable repository.
#[derive(Debug, Clone, Default)]
pub struct SimpleRuleRepository {
    rules: IndexMap<RuleId, Arc<dyn Rule>>,
}

impl SimpleRuleRepository {
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRuleId`] if two rules share an id.
    pub fn new(rules: impl IntoIterator<Item = Arc<dyn Rule>>) -> Result<Self, ValidationError> {
        Ok(Self {
            rules: index_rules(rules)?,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleRepository for SimpleRuleRepository {
    fn knows_rule_id(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError> {
        self.rules.get(id).cloned().ok_or_else(|| not_found(id))
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.keys().cloned().collect()
    }
}

/// Builder for a [`SimpleRuleRepository`].
///
/// # Example
///
/// ```
/// use rulebook::{RuleRepositoryBuilder, fact, rule_ref};
///
/// let repository = RuleRepositoryBuilder::new()
///     .rule("age_ok", |r| r.when(fact("age").gte(18_i64)))
///     .rule("active", |r| r.when(fact("status").eq("active")))
///     .rule("allowed", |r| r.when(rule_ref("age_ok").and(rule_ref("active"))))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleRepositoryBuilder {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRepositoryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a rule. The closure finishes the [`RuleBuilder`] into any rule
    /// shape (`when`, `validate_with`, `dispatch`, `select`).
    #[must_use]
    pub fn rule<R: Rule>(mut self, id: &str, f: impl FnOnce(RuleBuilder) -> R) -> Self {
        self.rules.push(Arc::new(f(RuleBuilder::new(id))));
        self
    }

    #[must_use]
    pub fn add(mut self, rule: impl Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    #[must_use]
    pub fn add_shared(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRuleId`] if two rules share an id.
    pub fn build(self) -> Result<SimpleRuleRepository, ValidationError> {
        SimpleRuleRepository::new(self.rules)
    }
}

/// Several repositories seen as one. Ids must be unique across members.
#[derive(Debug, Clone)]
pub struct CompositeRuleRepository {
    members: Vec<Arc<dyn RuleRepository>>,
}

impl CompositeRuleRepository {
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRuleId`] if two members know the
    /// same id.
    pub fn new(members: Vec<Arc<dyn RuleRepository>>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for member in &members {
            for id in member.rule_ids() {
                if !seen.insert(id.clone()) {
                    return Err(ValidationError::DuplicateRuleId { id: id.to_string() });
                }
            }
        }
        Ok(Self { members })
    }
}

impl RuleRepository for CompositeRuleRepository {
    fn knows_rule_id(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.knows_rule_id(id))
    }

    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError> {
        self.members
            .iter()
            .find(|m| m.knows_rule_id(id))
            .ok_or_else(|| not_found(id))?
            .get_rule(id)
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        self.members.iter().flat_map(|m| m.rule_ids()).collect()
    }

    fn subscribe(&self, listener: Arc<dyn RepositoryListener>) {
        for member in &self.members {
            member.subscribe(Arc::clone(&listener));
        }
    }
}

/// A repository rules can be added to and removed from while in use.
#[derive(Default)]
pub struct MutableRuleRepository {
    rules: RwLock<IndexMap<RuleId, Arc<dyn Rule>>>,
    listeners: Mutex<Vec<Arc<dyn RepositoryListener>>>,
}

impl fmt::Debug for MutableRuleRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableRuleRepository")
            .field("rules", &self.rules.read().keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl MutableRuleRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRuleId`] if the id is taken.
    pub fn register(&self, rule: impl Rule) -> Result<(), ValidationError> {
        self.register_all([Arc::new(rule) as Arc<dyn Rule>])
    }

    /// Register a batch of rules. Either every rule is added or, on a
    /// duplicate id within the batch or against the repository, none is.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRuleId`].
    pub fn register_all(&self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) -> Result<(), ValidationError> {
        let batch = index_rules(rules)?;
        let ids: Vec<RuleId> = batch.keys().cloned().collect();
        {
            let mut registered = self.rules.write();
            if let Some(id) = ids.iter().find(|id| registered.contains_key(*id)) {
                return Err(ValidationError::DuplicateRuleId { id: id.to_string() });
            }
            registered.extend(batch);
        }
        debug!(count = ids.len(), "registered rules");
        self.notify(&ids);
        Ok(())
    }

    /// Remove a rule, returning it if it was registered.
    pub fn remove(&self, id: &str) -> Option<Arc<dyn Rule>> {
        let removed = self.rules.write().shift_remove(id);
        if let Some(rule) = &removed {
            debug!(rule = %rule.id(), "removed rule");
            self.notify(&[rule.id().clone()]);
        }
        removed
    }

    /// Number of subscribed change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify(&self, ids: &[RuleId]) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.rules_changed(ids);
        }
    }
}

impl RuleRepository for MutableRuleRepository {
    fn knows_rule_id(&self, id: &str) -> bool {
        self.rules.read().contains_key(id)
    }

    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError> {
        self.rules.read().get(id).cloned().ok_or_else(|| not_found(id))
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.read().keys().cloned().collect()
    }

    fn subscribe(&self, listener: Arc<dyn RepositoryListener>) {
        self.listeners.lock().push(listener);
    }
}

type RuleFilter = dyn Fn(&dyn Rule) -> bool + Send + Sync;

/// Hides the rules of another repository that fail a filter.
#[derive(Clone)]
pub struct FilteredRuleRepository {
    inner: Arc<dyn RuleRepository>,
    filter: Arc<RuleFilter>,
}

impl FilteredRuleRepository {
    pub fn new<F>(inner: Arc<dyn RuleRepository>, filter: F) -> Self
    where
        F: Fn(&dyn Rule) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            filter: Arc::new(filter),
        }
    }
}

impl fmt::Debug for FilteredRuleRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredRuleRepository")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl RuleRepository for FilteredRuleRepository {
    fn knows_rule_id(&self, id: &str) -> bool {
        self.get_rule(id).is_ok()
    }

    fn get_rule(&self, id: &str) -> Result<Arc<dyn Rule>, ValidationError> {
        let rule = self.inner.get_rule(id)?;
        if (self.filter)(rule.as_ref()) {
            Ok(rule)
        } else {
            Err(not_found(id))
        }
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        self.inner
            .rule_ids()
            .into_iter()
            .filter(|id| self.knows_rule_id(id.as_str()))
            .collect()
    }

    fn subscribe(&self, listener: Arc<dyn RepositoryListener>) {
        self.inner.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::{fact, Condition};

    fn always(id: &str) -> Arc<dyn Rule> {
        Arc::new(RuleBuilder::new(id).when(Condition::Constant(true)))
    }

    #[test]
    fn builder_collects_rules_in_order() {
        let repo = RuleRepositoryBuilder::new()
            .rule("b", |r| r.when(fact("x").eq(1_i64)))
            .rule("a", |r| r.when(Condition::Constant(true)))
            .build()
            .unwrap();
        assert_eq!(repo.len(), 2);
        assert_eq!(
            repo.rule_ids(),
            vec![RuleId::from("b"), RuleId::from("a")]
        );
        assert!(repo.knows_rule_id("a"));
        assert!(!repo.knows_rule_id("c"));
    }

    #[test]
    fn builder_rejects_duplicates() {
        let result = RuleRepositoryBuilder::new()
            .rule("same", |r| r.when(Condition::Constant(true)))
            .rule("same", |r| r.when(Condition::Constant(false)))
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::DuplicateRuleId { id }) if id == "same"
        ));
    }

    #[test]
    fn get_unknown_rule() {
        let repo = SimpleRuleRepository::default();
        assert!(repo.is_empty());
        assert!(matches!(
            repo.get_rule("missing"),
            Err(ValidationError::RuleNotFound { id }) if id == "missing"
        ));
    }

    #[test]
    fn composite_lookup_and_duplicates() {
        let first: Arc<dyn RuleRepository> = Arc::new(SimpleRuleRepository::new([always("a")]).unwrap());
        let second: Arc<dyn RuleRepository> = Arc::new(SimpleRuleRepository::new([always("b")]).unwrap());
        let composite = CompositeRuleRepository::new(vec![first.clone(), second]).unwrap();
        assert_eq!(composite.rule_ids(), vec![RuleId::from("a"), RuleId::from("b")]);
        assert_eq!(composite.get_rule("b").unwrap().id().as_str(), "b");
        assert!(composite.get_rule("c").is_err());

        let clash: Arc<dyn RuleRepository> = Arc::new(SimpleRuleRepository::new([always("a")]).unwrap());
        assert!(matches!(
            CompositeRuleRepository::new(vec![first, clash]),
            Err(ValidationError::DuplicateRuleId { id }) if id == "a"
        ));
    }

    struct Counter(AtomicUsize);

    impl RepositoryListener for Counter {
        fn rules_changed(&self, ids: &[RuleId]) {
            self.0.fetch_add(ids.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn mutable_repository_notifies() {
        let repo = MutableRuleRepository::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        repo.subscribe(counter.clone());

        repo.register(RuleBuilder::new("a").when(Condition::Constant(true)))
            .unwrap();
        repo.register_all([always("b"), always("c")]).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
        assert_eq!(repo.rule_ids().len(), 3);

        assert!(repo.remove("b").is_some());
        assert!(repo.remove("b").is_none());
        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
        assert!(!repo.knows_rule_id("b"));
    }

    #[test]
    fn mutable_batch_is_all_or_nothing() {
        let repo = MutableRuleRepository::new();
        repo.register_all([always("a")]).unwrap();
        let err = repo.register_all([always("b"), always("a")]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRuleId { id } if id == "a"));
        assert!(!repo.knows_rule_id("b"));
        let err = repo.register_all([always("c"), always("c")]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRuleId { id } if id == "c"));
        assert!(!repo.knows_rule_id("c"));
    }

    #[test]
    fn filtered_repository_hides_rules() {
        let inner: Arc<dyn RuleRepository> = Arc::new(
            RuleRepositoryBuilder::new()
                .rule("keep", |r| r.metadata("tier", "gold").when(Condition::Constant(true)))
                .rule("drop", |r| r.when(Condition::Constant(true)))
                .build()
                .unwrap(),
        );
        let filtered = FilteredRuleRepository::new(inner, |rule| rule.metadata().contains_key("tier"));
        assert_eq!(filtered.rule_ids(), vec![RuleId::from("keep")]);
        assert!(filtered.knows_rule_id("keep"));
        assert!(!filtered.knows_rule_id("drop"));
        assert!(matches!(
            filtered.get_rule("drop"),
            Err(ValidationError::RuleNotFound { .. })
        ));
    }
}
