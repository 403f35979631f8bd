use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::events::{EventPublisher, TracingPublisher};
use crate::executor::{ExecutorConfig, RuleExecutor};
use crate::extensions::ExtensionFactories;
use crate::path::PathResolver;
use crate::reporter::{AllOkReporter, CollectingReporter, Reporter};
use crate::tasks::{InlineExecutor, TaskExecutor};
use crate::types::{
    Facts, Report, RuleRepository, RuleSelector, ValidationContext, ValidationError,
};

/// Entry point: validates facts against a repository, one fresh
/// [`ValidationContext`] per call.
///
/// # Example
///
/// ```
/// use rulebook::{all_rules, fact, RuleRepositoryBuilder, Validator};
///
/// let repository = RuleRepositoryBuilder::new()
///     .rule("age_ok", |r| r.when(fact("age").gte(18_i64)))
///     .build()
///     .unwrap();
/// let validator = Validator::builder(repository).build();
///
/// let facts = rulebook::Facts::map([("age", 21_i64)]);
/// let report = validator.validate(&facts, &all_rules()).unwrap();
/// assert!(report.is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    repository: Arc<dyn RuleRepository>,
    executor: Arc<RuleExecutor>,
    resolver: Arc<PathResolver>,
    publisher: Arc<dyn EventPublisher>,
    tasks: Arc<dyn TaskExecutor>,
    factories: ExtensionFactories,
    parameters: HashMap<String, Facts>,
}

impl Validator {
    pub fn builder(repository: impl RuleRepository + 'static) -> ValidatorBuilder {
        ValidatorBuilder::new(Arc::new(repository))
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn RuleRepository> {
        &self.repository
    }

    /// A fresh context wired to this validator, reporting to `reporter`.
    /// `parameters` are layered over the validator's defaults.
    pub fn context<I, K, V>(&self, reporter: Arc<dyn Reporter>, parameters: I) -> ValidationContext
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Facts>,
    {
        ValidationContext::builder(Arc::clone(&self.repository))
            .executor(Arc::clone(&self.executor))
            .resolver(Arc::clone(&self.resolver))
            .publisher(Arc::clone(&self.publisher))
            .reporter(reporter)
            .tasks(Arc::clone(&self.tasks))
            .extension_factories(self.factories.clone())
            .parameters(self.parameters.clone())
            .parameters(parameters)
            .build()
    }

    /// # Errors
    ///
    /// Fails when the selector fails (for example an unknown rule id). Rule
    /// failures are reported, not returned.
    pub fn validate(&self, facts: &Facts, selector: &dyn RuleSelector) -> Result<Report, ValidationError> {
        self.validate_with(facts, selector, Vec::<(String, Facts)>::new())
    }

    /// [`Validator::validate`] with call parameters.
    ///
    /// # Errors
    ///
    /// Fails when the selector fails.
    pub fn validate_with<I, K, V>(
        &self,
        facts: &Facts,
        selector: &dyn RuleSelector,
        parameters: I,
    ) -> Result<Report, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Facts>,
    {
        let reporter = Arc::new(CollectingReporter::new());
        let mut ctx = self.context(reporter.clone(), parameters);
        self.executor.validate_selector(&mut ctx, selector, facts)?;
        Ok(reporter.take())
    }

    /// Whether every selected rule (and everything they triggered) is Ok.
    ///
    /// # Errors
    ///
    /// Fails when the selector fails.
    pub fn is_valid(&self, facts: &Facts, selector: &dyn RuleSelector) -> Result<bool, ValidationError> {
        let reporter = Arc::new(AllOkReporter::new());
        let mut ctx = self.context(reporter.clone(), Vec::<(String, Facts)>::new());
        self.executor.validate_selector(&mut ctx, selector, facts)?;
        Ok(reporter.is_ok())
    }

    /// Asynchronous [`Validator::validate`]. Rule bodies run on the
    /// configured task executor.
    pub fn validate_async(
        &self,
        facts: Facts,
        selector: Arc<dyn RuleSelector>,
    ) -> BoxFuture<'static, Result<Report, ValidationError>> {
        self.validate_async_with(facts, selector, Vec::<(String, Facts)>::new())
    }

    pub fn validate_async_with<I, K, V>(
        &self,
        facts: Facts,
        selector: Arc<dyn RuleSelector>,
        parameters: I,
    ) -> BoxFuture<'static, Result<Report, ValidationError>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Facts>,
    {
        let reporter = Arc::new(CollectingReporter::new());
        let ctx = self.context(reporter.clone(), parameters);
        let pending = self.executor.validate_selector_async(ctx, selector, facts);
        async move {
            pending.await?;
            Ok(reporter.take())
        }
        .boxed()
    }
}

/// Builder for a [`Validator`]. Only the repository is required.
#[derive(Debug)]
#[must_use]
pub struct ValidatorBuilder {
    repository: Arc<dyn RuleRepository>,
    config: ExecutorConfig,
    resolver: Option<PathResolver>,
    publisher: Option<Arc<dyn EventPublisher>>,
    tasks: Option<Arc<dyn TaskExecutor>>,
    factories: ExtensionFactories,
    parameters: HashMap<String, Facts>,
}

impl ValidatorBuilder {
    pub fn new(repository: Arc<dyn RuleRepository>) -> Self {
        Self {
            repository,
            config: ExecutorConfig::default(),
            resolver: None,
            publisher: None,
            tasks: None,
            factories: ExtensionFactories::new(),
            parameters: HashMap::new(),
        }
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn tasks(mut self, tasks: Arc<dyn TaskExecutor>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Register a default constructor for the extension type `T`.
    pub fn extension<T, F>(mut self, factory: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories.register(factory);
        self
    }

    /// A parameter present in every validation call unless overridden.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Facts>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Validator {
        debug!(
            rules = self.repository.rule_ids().len(),
            max_depth = self.config.max_depth,
            "validator ready"
        );
        Validator {
            repository: self.repository,
            executor: Arc::new(RuleExecutor::new(self.config)),
            resolver: Arc::new(self.resolver.unwrap_or_default()),
            publisher: self.publisher.unwrap_or_else(|| Arc::new(TracingPublisher)),
            tasks: self.tasks.unwrap_or_else(|| Arc::new(InlineExecutor)),
            factories: self.factories,
            parameters: self.parameters,
        }
    }
}
