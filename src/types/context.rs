use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::facts::Facts;
use super::path::Path;
use super::repository::RuleRepository;
use super::rule::{Rule, RuleId};
use crate::cache::ResultCache;
use crate::events::{EventPublisher, TracingPublisher};
use crate::executor::RuleExecutor;
use crate::extensions::{ExtensionFactories, Extensions};
use crate::path::PathResolver;
use crate::reporter::{CollectingReporter, Reporter};
use crate::tasks::{InlineExecutor, TaskExecutor};

/// One entry of the path stack: the facts a path was resolved against and
/// the path itself.
#[derive(Debug, Clone)]
pub struct PathFrame {
    parent: Facts,
    path: Path,
}

impl PathFrame {
    #[must_use]
    pub fn parent(&self) -> &Facts {
        &self.parent
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One entry of the rule stack: a rule being validated and its facts.
#[derive(Debug, Clone)]
pub struct RuleFrame {
    rule: Arc<dyn Rule>,
    facts: Facts,
}

impl RuleFrame {
    #[must_use]
    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }
}

struct Shared {
    executor: Arc<RuleExecutor>,
    repository: Arc<dyn RuleRepository>,
    resolver: Arc<PathResolver>,
    publisher: Arc<dyn EventPublisher>,
    reporter: Arc<dyn Reporter>,
    tasks: Arc<dyn TaskExecutor>,
    parameters: HashMap<String, Facts>,
    cache: ResultCache,
    extensions: Extensions,
}

/// The activation record of one validation call.
///
/// Cloning is shallow: the clone shares the result cache, the extension
/// registry and every collaborator, but owns its path and rule stacks.
/// Concurrent branches each work on their own clone (see
/// [`ValidationContext::branch`]).
#[derive(Clone)]
pub struct ValidationContext {
    shared: Arc<Shared>,
    path_stack: Vec<PathFrame>,
    rule_stack: Vec<RuleFrame>,
}

/// Stack heights, used to unwind a context after a caught panic.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StackMark {
    paths: usize,
    rules: usize,
}

impl ValidationContext {
    pub fn builder(repository: Arc<dyn RuleRepository>) -> ContextBuilder {
        ContextBuilder {
            repository,
            executor: None,
            resolver: None,
            publisher: None,
            reporter: None,
            tasks: None,
            parameters: HashMap::new(),
            factories: ExtensionFactories::new(),
        }
    }

    /// A copy for a concurrent branch.
    #[must_use]
    pub fn branch(&self) -> Self {
        self.clone()
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<RuleExecutor> {
        &self.shared.executor
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn RuleRepository> {
        &self.shared.repository
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<PathResolver> {
        &self.shared.resolver
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<dyn EventPublisher> {
        &self.shared.publisher
    }

    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.shared.reporter
    }

    #[must_use]
    pub fn tasks(&self) -> &Arc<dyn TaskExecutor> {
        &self.shared.tasks
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Facts> {
        self.shared.parameters.get(name)
    }

    #[must_use]
    pub fn parameters(&self) -> &HashMap<String, Facts> {
        &self.shared.parameters
    }

    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.shared.extensions
    }

    /// The shared extension of type `T`, created by its registered factory on
    /// first use.
    #[must_use]
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.shared.extensions.get::<T>()
    }

    /// The shared extension of type `T`, created with `init` if absent.
    pub fn extension_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.shared.extensions.get_or_insert_with(init)
    }

    #[must_use]
    pub fn path_stack(&self) -> &[PathFrame] {
        &self.path_stack
    }

    /// The paths on the stack, outermost first.
    #[must_use]
    pub fn paths(&self) -> Vec<Path> {
        self.path_stack.iter().map(|frame| frame.path.clone()).collect()
    }

    /// The location of the current facts relative to the top-level facts.
    #[must_use]
    pub fn current_path(&self) -> Path {
        self.path_stack
            .iter()
            .fold(Path::root(), |acc, frame| acc.join(&frame.path))
    }

    #[must_use]
    pub fn rule_stack(&self) -> &[RuleFrame] {
        &self.rule_stack
    }

    /// The innermost rule being validated.
    #[must_use]
    pub fn current_rule(&self) -> Option<&Arc<dyn Rule>> {
        self.rule_stack.last().map(|frame| &frame.rule)
    }

    /// Whether `rule` is already being validated against equal facts on this
    /// branch.
    #[must_use]
    pub fn is_validating(&self, rule: &RuleId, facts: &Facts) -> bool {
        self.rule_stack
            .iter()
            .any(|frame| frame.rule.id() == rule && &frame.facts == facts)
    }

    pub(crate) fn cache(&self) -> &ResultCache {
        &self.shared.cache
    }

    pub(crate) fn push_path(&mut self, parent: Facts, path: Path) {
        self.path_stack.push(PathFrame { parent, path });
    }

    pub(crate) fn pop_path(&mut self) {
        self.path_stack.pop();
    }

    pub(crate) fn push_rule(&mut self, rule: Arc<dyn Rule>, facts: Facts) {
        self.rule_stack.push(RuleFrame { rule, facts });
    }

    pub(crate) fn pop_rule(&mut self) {
        self.rule_stack.pop();
    }

    pub(crate) fn mark(&self) -> StackMark {
        StackMark {
            paths: self.path_stack.len(),
            rules: self.rule_stack.len(),
        }
    }

    pub(crate) fn restore(&mut self, mark: StackMark) {
        self.path_stack.truncate(mark.paths);
        self.rule_stack.truncate(mark.rules);
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<&str> = self
            .rule_stack
            .iter()
            .map(|frame| frame.rule.id().as_str())
            .collect();
        f.debug_struct("ValidationContext")
            .field("path", &self.current_path().to_string())
            .field("rules", &rules)
            .field("parameters", &self.shared.parameters)
            .field("cached", &self.shared.cache.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`ValidationContext`]. Every collaborator except the
/// repository has a default.
#[must_use]
pub struct ContextBuilder {
    repository: Arc<dyn RuleRepository>,
    executor: Option<Arc<RuleExecutor>>,
    resolver: Option<Arc<PathResolver>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    reporter: Option<Arc<dyn Reporter>>,
    tasks: Option<Arc<dyn TaskExecutor>>,
    parameters: HashMap<String, Facts>,
    factories: ExtensionFactories,
}

impl ContextBuilder {
    pub fn executor(mut self, executor: Arc<RuleExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn resolver(mut self, resolver: Arc<PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn tasks(mut self, tasks: Arc<dyn TaskExecutor>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Facts>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Facts>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn extension_factories(mut self, factories: ExtensionFactories) -> Self {
        self.factories = factories;
        self
    }

    pub fn build(self) -> ValidationContext {
        ValidationContext {
            shared: Arc::new(Shared {
                executor: self.executor.unwrap_or_default(),
                repository: self.repository,
                resolver: self.resolver.unwrap_or_default(),
                publisher: self
                    .publisher
                    .unwrap_or_else(|| Arc::new(TracingPublisher)),
                reporter: self
                    .reporter
                    .unwrap_or_else(|| Arc::new(CollectingReporter::new())),
                tasks: self.tasks.unwrap_or_else(|| Arc::new(InlineExecutor)),
                parameters: self.parameters,
                cache: ResultCache::default(),
                extensions: Extensions::new(self.factories),
            }),
            path_stack: Vec::new(),
            rule_stack: Vec::new(),
        }
    }
}
