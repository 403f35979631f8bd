use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::{debug, trace, warn};

use crate::cache::{self, CacheKey, Claim, Completion, PendingResult};
use crate::events::RuleEvent;
use crate::path::Resolved;
use crate::tasks::panic_message;
use crate::types::{Facts, Path, Rule, RuleResult, RuleSelector, ValidationContext, ValidationError};

const SOURCE: &str = "RuleExecutor";

/// Limits applied to every rule invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum height of the rule stack. Deeper invocations fail with
    /// [`ValidationError::RecursionLimit`].
    pub max_depth: usize,
    /// Fail a rule that is re-entered with equal facts on the same branch.
    pub detect_cycles: bool,
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_cycle_detection(mut self, detect_cycles: bool) -> Self {
        self.detect_cycles = detect_cycles;
        self
    }

    fn admit(self, ctx: &ValidationContext, rule: &dyn Rule, cyclic: bool) -> Result<(), ValidationError> {
        let depth = ctx.rule_stack().len();
        if depth >= self.max_depth || (self.detect_cycles && cyclic) {
            return Err(ValidationError::RecursionLimit {
                rule: rule.id().to_string(),
                depth,
            });
        }
        Ok(())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            detect_cycles: true,
        }
    }
}

/// Runs rules against facts with preconditions, memoization, events and
/// reporting.
///
/// Every invocation goes through the same steps: recursion check,
/// preconditions (false skips the rule), a single-flight lookup in the
/// context's result cache, and on a miss the body itself, wrapped in
/// `Started`/`Finished` events. Errors and panics raised by a body become
/// Failed results and never reach the caller. Every outcome is handed to the
/// context's [`Reporter`](crate::Reporter).
#[derive(Debug, Default)]
pub struct RuleExecutor {
    config: ExecutorConfig,
}

impl RuleExecutor {
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Validate one rule against `facts` on the calling thread.
    pub fn validate(&self, ctx: &mut ValidationContext, rule: &Arc<dyn Rule>, facts: &Facts) -> RuleResult {
        let cyclic = ctx.is_validating(rule.id(), facts);
        let result = match self.config.admit(ctx, rule.as_ref(), cyclic) {
            Err(err) => {
                warn!(rule = %rule.id(), path = %ctx.current_path(), "{err}");
                RuleResult::from_error(&err)
            }
            Ok(()) => {
                ctx.push_rule(Arc::clone(rule), facts.clone());
                let result = run(ctx, rule, facts, cyclic);
                ctx.pop_rule();
                result
            }
        };
        report(ctx, rule.as_ref(), facts, &result);
        result
    }

    /// Select rules for `facts` and validate each of them, in selection order.
    ///
    /// # Errors
    ///
    /// Fails only when the selector fails; rule outcomes are always results.
    pub fn validate_selector(
        &self,
        ctx: &mut ValidationContext,
        selector: &dyn RuleSelector,
        facts: &Facts,
    ) -> Result<Vec<RuleResult>, ValidationError> {
        let rules = selector.select_rules(ctx.repository().as_ref(), ctx, facts)?;
        trace!(selector = ?selector, selected = rules.len(), "rules selected");
        Ok(rules.iter().map(|rule| self.validate(ctx, rule, facts)).collect())
    }

    /// Validate `rule` against the value at `path` inside `parent`.
    ///
    /// Returns `None` without touching the cache or publishing anything when
    /// the path does not resolve.
    pub fn validate_for_path(
        &self,
        ctx: &mut ValidationContext,
        rule: &Arc<dyn Rule>,
        parent: &Facts,
        path: &Path,
    ) -> Option<RuleResult> {
        let Resolved::Found(value) = ctx.resolver().resolve(parent, path) else {
            trace!(rule = %rule.id(), path = %path, "path not found, nothing to validate");
            return None;
        };
        ctx.push_path(parent.clone(), path.clone());
        let result = self.validate(ctx, rule, &value);
        ctx.pop_path();
        Some(result)
    }

    /// # Errors
    ///
    /// Fails only when the selector fails.
    pub fn validate_selector_for_path(
        &self,
        ctx: &mut ValidationContext,
        selector: &dyn RuleSelector,
        parent: &Facts,
        path: &Path,
    ) -> Result<Vec<RuleResult>, ValidationError> {
        let Resolved::Found(value) = ctx.resolver().resolve(parent, path) else {
            return Ok(Vec::new());
        };
        ctx.push_path(parent.clone(), path.clone());
        let results = self.validate_selector(ctx, selector, &value);
        ctx.pop_path();
        results
    }

    pub fn validate_for_paths(
        &self,
        ctx: &mut ValidationContext,
        rule: &Arc<dyn Rule>,
        parent: &Facts,
        paths: &[Path],
    ) -> Vec<RuleResult> {
        paths
            .iter()
            .filter_map(|path| self.validate_for_path(ctx, rule, parent, path))
            .collect()
    }

    /// # Errors
    ///
    /// Stops at the first selector failure.
    pub fn validate_selector_for_paths(
        &self,
        ctx: &mut ValidationContext,
        selector: &dyn RuleSelector,
        parent: &Facts,
        paths: &[Path],
    ) -> Result<Vec<RuleResult>, ValidationError> {
        let mut results = Vec::new();
        for path in paths {
            results.extend(self.validate_selector_for_path(ctx, selector, parent, path)?);
        }
        Ok(results)
    }

    /// Asynchronous [`RuleExecutor::validate`]. The body runs through
    /// [`Rule::validate_async`], by default on the context's task executor.
    pub fn validate_async(
        &self,
        ctx: ValidationContext,
        rule: Arc<dyn Rule>,
        facts: Facts,
    ) -> BoxFuture<'static, RuleResult> {
        validate_rule_async(self.config, ctx, rule, facts)
    }

    /// Asynchronous [`RuleExecutor::validate_selector`]. Every selected rule
    /// starts on its own branch; results come back in selection order.
    pub fn validate_selector_async(
        &self,
        ctx: ValidationContext,
        selector: Arc<dyn RuleSelector>,
        facts: Facts,
    ) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
        validate_selector_async(self.config, ctx, selector, facts)
    }

    pub fn validate_for_path_async(
        &self,
        ctx: ValidationContext,
        rule: Arc<dyn Rule>,
        parent: Facts,
        path: Path,
    ) -> BoxFuture<'static, Option<RuleResult>> {
        let config = self.config;
        let Resolved::Found(value) = ctx.resolver().resolve(&parent, &path) else {
            return future::ready(None).boxed();
        };
        let mut ctx = ctx;
        ctx.push_path(parent, path);
        validate_rule_async(config, ctx, rule, value).map(Some).boxed()
    }

    pub fn validate_selector_for_path_async(
        &self,
        ctx: ValidationContext,
        selector: Arc<dyn RuleSelector>,
        parent: Facts,
        path: Path,
    ) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
        selector_for_path_async(self.config, ctx, selector, parent, path)
    }

    /// Start every path as its own branch, then join in path order.
    pub fn validate_for_paths_async(
        &self,
        ctx: ValidationContext,
        rule: Arc<dyn Rule>,
        parent: Facts,
        paths: Vec<Path>,
    ) -> BoxFuture<'static, Vec<RuleResult>> {
        let branches: Vec<_> = paths
            .into_iter()
            .map(|path| self.validate_for_path_async(ctx.branch(), Arc::clone(&rule), parent.clone(), path))
            .collect();
        future::join_all(branches)
            .map(|results| results.into_iter().flatten().collect())
            .boxed()
    }

    pub fn validate_selector_for_paths_async(
        &self,
        ctx: ValidationContext,
        selector: Arc<dyn RuleSelector>,
        parent: Facts,
        paths: Vec<Path>,
    ) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
        selector_for_paths_async(self.config, ctx, selector, parent, paths)
    }
}

/// Run `f` on `ctx`, turning a panic into [`ValidationError::Panicked`] and
/// unwinding the context's stacks to where they were before the call.
pub(crate) fn guarded<T>(
    ctx: &mut ValidationContext,
    f: impl FnOnce(&mut ValidationContext) -> Result<T, ValidationError>,
) -> Result<T, ValidationError> {
    let mark = ctx.mark();
    match panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            ctx.restore(mark);
            Err(ValidationError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        }
    }
}

pub(crate) fn validate_selector_async(
    config: ExecutorConfig,
    ctx: ValidationContext,
    selector: Arc<dyn RuleSelector>,
    facts: Facts,
) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
    let rules = match selector.select_rules(ctx.repository().as_ref(), &ctx, &facts) {
        Ok(rules) => rules,
        Err(err) => return future::ready(Err(err)).boxed(),
    };
    let branches: Vec<_> = rules
        .into_iter()
        .map(|rule| validate_rule_async(config, ctx.branch(), rule, facts.clone()))
        .collect();
    future::join_all(branches).map(Ok::<_, ValidationError>).boxed()
}

pub(crate) fn selector_for_path_async(
    config: ExecutorConfig,
    ctx: ValidationContext,
    selector: Arc<dyn RuleSelector>,
    parent: Facts,
    path: Path,
) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
    let Resolved::Found(value) = ctx.resolver().resolve(&parent, &path) else {
        return future::ready(Ok(Vec::new())).boxed();
    };
    let mut ctx = ctx;
    ctx.push_path(parent, path);
    validate_selector_async(config, ctx, selector, value)
}

pub(crate) fn selector_for_paths_async(
    config: ExecutorConfig,
    ctx: ValidationContext,
    selector: Arc<dyn RuleSelector>,
    parent: Facts,
    paths: Vec<Path>,
) -> BoxFuture<'static, Result<Vec<RuleResult>, ValidationError>> {
    let branches: Vec<_> = paths
        .into_iter()
        .map(|path| selector_for_path_async(config, ctx.branch(), Arc::clone(&selector), parent.clone(), path))
        .collect();
    future::join_all(branches)
        .map(|outcomes| {
            let mut results = Vec::new();
            for outcome in outcomes {
                results.extend(outcome?);
            }
            Ok(results)
        })
        .boxed()
}

fn validate_rule_async(
    config: ExecutorConfig,
    mut ctx: ValidationContext,
    rule: Arc<dyn Rule>,
    facts: Facts,
) -> BoxFuture<'static, RuleResult> {
    async move {
        let cyclic = ctx.is_validating(rule.id(), &facts);
        let result = match config.admit(&ctx, rule.as_ref(), cyclic) {
            Err(err) => {
                warn!(rule = %rule.id(), path = %ctx.current_path(), "{err}");
                RuleResult::from_error(&err)
            }
            Ok(()) => {
                ctx.push_rule(Arc::clone(&rule), facts.clone());
                let result = run_async(&mut ctx, &rule, &facts, cyclic).await;
                ctx.pop_rule();
                result
            }
        };
        report(&ctx, rule.as_ref(), &facts, &result);
        result
    }
    .boxed()
}

fn preconditions_hold(ctx: &mut ValidationContext, rule: &dyn Rule, facts: &Facts) -> Result<bool, ValidationError> {
    guarded(ctx, |ctx| {
        for condition in rule.preconditions() {
            if !condition.test(ctx, facts)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

/// Outcome of the steps shared by the sync and async paths, before the body.
enum Gate {
    Done(RuleResult),
    Owner(Completion),
    Wait(PendingResult),
}

fn gate(ctx: &mut ValidationContext, rule: &Arc<dyn Rule>, facts: &Facts, cyclic: bool) -> Gate {
    match preconditions_hold(ctx, rule.as_ref(), facts) {
        Ok(true) => {}
        Ok(false) => {
            trace!(rule = %rule.id(), "precondition not met, skipped");
            return Gate::Done(RuleResult::skipped());
        }
        Err(err) => {
            debug!(rule = %rule.id(), error = %err, "precondition failed");
            return Gate::Done(RuleResult::from_error(&err));
        }
    }
    match ctx.cache().claim(CacheKey::new(rule.id().clone(), facts.clone())) {
        Claim::Owner(completion) => Gate::Owner(completion),
        // Waiting on our own unfinished slot would never return.
        Claim::Cached(pending) if cyclic && pending.peek().is_none() => {
            let err = ValidationError::RecursionLimit {
                rule: rule.id().to_string(),
                depth: ctx.rule_stack().len(),
            };
            warn!(rule = %rule.id(), "{err}");
            Gate::Done(RuleResult::from_error(&err))
        }
        Claim::Cached(pending) => Gate::Wait(pending),
    }
}

fn started(ctx: &ValidationContext, rule: &dyn Rule, facts: &Facts) -> Instant {
    ctx.publisher().publish(
        SOURCE,
        &RuleEvent::Started {
            rule: rule.id().clone(),
            path_stack: ctx.paths(),
            facts: facts.clone(),
        },
    );
    Instant::now()
}

fn finished(ctx: &ValidationContext, rule: &dyn Rule, facts: &Facts, result: &RuleResult, since: Instant) {
    ctx.publisher().publish(
        SOURCE,
        &RuleEvent::Finished {
            rule: rule.id().clone(),
            path_stack: ctx.paths(),
            facts: facts.clone(),
            result: result.clone(),
            duration: since.elapsed(),
        },
    );
}

fn body_result(rule: &dyn Rule, outcome: Result<RuleResult, ValidationError>) -> RuleResult {
    outcome.unwrap_or_else(|err| {
        debug!(rule = %rule.id(), error = %err, "rule body failed");
        RuleResult::from_error(&err)
    })
}

fn run(ctx: &mut ValidationContext, rule: &Arc<dyn Rule>, facts: &Facts, cyclic: bool) -> RuleResult {
    match gate(ctx, rule, facts, cyclic) {
        Gate::Done(result) => result,
        Gate::Wait(pending) => cache::wait(pending),
        Gate::Owner(completion) => {
            let since = started(ctx, rule.as_ref(), facts);
            let result = body_result(rule.as_ref(), guarded(ctx, |ctx| rule.validate(ctx, facts)));
            finished(ctx, rule.as_ref(), facts, &result, since);
            completion.complete(result.clone());
            result
        }
    }
}

async fn run_async(ctx: &mut ValidationContext, rule: &Arc<dyn Rule>, facts: &Facts, cyclic: bool) -> RuleResult {
    match gate(ctx, rule, facts, cyclic) {
        Gate::Done(result) => result,
        Gate::Wait(pending) => pending.await,
        Gate::Owner(completion) => {
            let since = started(ctx, rule.as_ref(), facts);
            let body = Arc::clone(rule).validate_async(ctx.branch(), facts.clone());
            let outcome = match AssertUnwindSafe(body).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(ValidationError::Panicked {
                    message: panic_message(payload.as_ref()),
                }),
            };
            let result = body_result(rule.as_ref(), outcome);
            finished(ctx, rule.as_ref(), facts, &result, since);
            completion.complete(result.clone());
            result
        }
    }
}

fn report(ctx: &ValidationContext, rule: &dyn Rule, facts: &Facts, result: &RuleResult) {
    ctx.reporter().add(ctx, facts, &ctx.current_path(), rule, result);
}
