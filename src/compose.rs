//! Rules built from other rules: path dispatch and selector forwarding.

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::trace;

use crate::path::PathResolver;
use crate::types::{
    Facts, Path, Rule, RuleInfo, RuleResult, RuleSelector, ValidationContext, ValidationError,
};

/// How a composite folds the results of the rules it forwarded to.
pub trait Forwarding {
    /// The result when nothing was forwarded.
    fn neutral_result(&self) -> RuleResult {
        RuleResult::ok()
    }

    fn merge_results(&self, a: RuleResult, b: RuleResult) -> RuleResult {
        a.merge(b)
    }

    fn forward(&self, results: Vec<RuleResult>) -> RuleResult {
        results
            .into_iter()
            .reduce(|a, b| self.merge_results(a, b))
            .unwrap_or_else(|| self.neutral_result())
    }
}

#[derive(Debug, Clone)]
struct Binding {
    patterns: Vec<String>,
    selector: Arc<dyn RuleSelector>,
}

impl Binding {
    fn paths(&self, resolver: &PathResolver, facts: &Facts) -> Result<Vec<Path>, ValidationError> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            patterns.push(resolver.parse(pattern)?);
        }
        Ok(resolver.resolve_patterns(facts, &patterns).collect())
    }
}

/// Validates sub-paths of its facts with the selectors bound to them and
/// merges everything into one result.
///
/// A binding may select the dispatching rule itself, which is how recursive
/// data such as trees is validated:
///
/// ```
/// use rulebook::{by_ids, fact, RuleRepositoryBuilder};
///
/// let repository = RuleRepositoryBuilder::new()
///     .rule("named", |r| r.when(fact("name").is_not_null()))
///     .rule("node", |r| {
///         r.dispatch()
///             .on("", by_ids(["named"]))
///             .on("children/*", by_ids(["node"]))
///             .build()
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DispatchingRule {
    info: RuleInfo,
    bindings: Vec<Binding>,
    default_result: RuleResult,
}

impl Forwarding for DispatchingRule {
    fn neutral_result(&self) -> RuleResult {
        self.default_result.clone()
    }
}

impl Rule for DispatchingRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<RuleResult, ValidationError> {
        let executor = Arc::clone(ctx.executor());
        let resolver = Arc::clone(ctx.resolver());
        let mut results = Vec::new();
        for binding in &self.bindings {
            let paths = binding.paths(&resolver, facts)?;
            trace!(rule = %self.info.id(), patterns = ?binding.patterns, matched = paths.len(), "dispatching");
            results.extend(executor.validate_selector_for_paths(ctx, binding.selector.as_ref(), facts, &paths)?);
        }
        Ok(self.forward(results))
    }

    fn validate_async(
        self: Arc<Self>,
        ctx: ValidationContext,
        facts: Facts,
    ) -> BoxFuture<'static, Result<RuleResult, ValidationError>> {
        let executor = Arc::clone(ctx.executor());
        let resolver = Arc::clone(ctx.resolver());
        let mut branches = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let paths = match binding.paths(&resolver, &facts) {
                Ok(paths) => paths,
                Err(err) => return future::ready(Err(err)).boxed(),
            };
            branches.push(executor.validate_selector_for_paths_async(
                ctx.branch(),
                Arc::clone(&binding.selector),
                facts.clone(),
                paths,
            ));
        }
        async move {
            let mut results = Vec::new();
            for outcome in future::join_all(branches).await {
                results.extend(outcome?);
            }
            Ok(self.forward(results))
        }
        .boxed()
    }
}

/// Builder returned by [`RuleBuilder::dispatch`](crate::RuleBuilder::dispatch).
#[derive(Debug, Clone)]
#[must_use]
pub struct DispatchingRuleBuilder {
    info: RuleInfo,
    bindings: Vec<Binding>,
    default_result: RuleResult,
}

impl DispatchingRuleBuilder {
    pub fn new(info: RuleInfo) -> Self {
        Self {
            info,
            bindings: Vec::new(),
            default_result: RuleResult::ok(),
        }
    }

    /// Validate every path matching any of `patterns` with `selector`.
    /// Bindings run in the order they are added.
    pub fn bind<I, S>(mut self, patterns: I, selector: impl RuleSelector + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings.push(Binding {
            patterns: patterns.into_iter().map(Into::into).collect(),
            selector: Arc::new(selector),
        });
        self
    }

    pub fn on(self, pattern: &str, selector: impl RuleSelector + 'static) -> Self {
        self.bind([pattern], selector)
    }

    /// The result when no binding matched anything. Ok unless set.
    pub fn default_result(mut self, result: RuleResult) -> Self {
        self.default_result = result;
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchingRule {
        DispatchingRule {
            info: self.info,
            bindings: self.bindings,
            default_result: self.default_result,
        }
    }
}

/// Applies a selector to its own facts and merges the selected rules'
/// results.
#[derive(Debug, Clone)]
pub struct SelectorRule {
    info: RuleInfo,
    selector: Arc<dyn RuleSelector>,
}

impl SelectorRule {
    pub fn new(info: RuleInfo, selector: Arc<dyn RuleSelector>) -> Self {
        Self { info, selector }
    }

    #[must_use]
    pub fn selector(&self) -> &Arc<dyn RuleSelector> {
        &self.selector
    }
}

impl Forwarding for SelectorRule {}

impl Rule for SelectorRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<RuleResult, ValidationError> {
        let executor = Arc::clone(ctx.executor());
        let results = executor.validate_selector(ctx, self.selector.as_ref(), facts)?;
        Ok(self.forward(results))
    }

    fn validate_async(
        self: Arc<Self>,
        ctx: ValidationContext,
        facts: Facts,
    ) -> BoxFuture<'static, Result<RuleResult, ValidationError>> {
        let pending = ctx
            .executor()
            .validate_selector_async(ctx.branch(), Arc::clone(&self.selector), facts);
        async move { Ok(self.forward(pending.await?)) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::types::{by_ids, fact, Condition, ResultCode, RuleBuilder, RuleRepositoryBuilder};

    fn context(builder: RuleRepositoryBuilder) -> (ValidationContext, Arc<CollectingReporter>) {
        let reporter = Arc::new(CollectingReporter::new());
        let ctx = ValidationContext::builder(Arc::new(builder.build().unwrap()))
            .reporter(reporter.clone())
            .build();
        (ctx, reporter)
    }

    fn two_keys() -> RuleRepositoryBuilder {
        RuleRepositoryBuilder::new()
            .rule("always_ok", |r| r.when(Condition::Constant(true)))
            .rule("always_failed", |r| r.when(Condition::Constant(false)))
            .rule("split", |r| {
                r.dispatch()
                    .on("a", by_ids(["always_ok"]))
                    .on("b", by_ids(["always_failed"]))
                    .build()
            })
    }

    fn tree() -> Facts {
        let leaf = |name: &str| Facts::map([("name", Facts::from(name)), ("children", Facts::list(Vec::<Facts>::new()))]);
        Facts::map([
            ("name", Facts::from("root")),
            (
                "children",
                Facts::list([
                    leaf("a"),
                    Facts::map([
                        ("name", Facts::Null),
                        ("children", Facts::list([leaf("c")])),
                    ]),
                ]),
            ),
        ])
    }

    fn tree_rules() -> RuleRepositoryBuilder {
        RuleRepositoryBuilder::new()
            .rule("named", |r| r.when(fact("name").is_not_null()))
            .rule("node", |r| {
                r.dispatch()
                    .on("", by_ids(["named"]))
                    .on("children/*", by_ids(["node"]))
                    .build()
            })
    }

    #[test]
    fn forwarding_defaults() {
        struct Plain;
        impl Forwarding for Plain {}
        assert_eq!(Plain.forward(Vec::new()), RuleResult::ok());
        assert_eq!(
            Plain.forward(vec![RuleResult::ok(), RuleResult::skipped(), RuleResult::ok()]),
            RuleResult::skipped()
        );
    }

    #[test]
    fn dispatch_merges_worst() {
        let (mut ctx, reporter) = context(two_keys());
        let executor = Arc::clone(ctx.executor());
        let facts = Facts::map([("a", "x"), ("b", "y")]);
        let results = executor
            .validate_selector(&mut ctx, &by_ids(["split"]), &facts)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_failed());

        let report = reporter.report();
        let ok = report.entries_for("always_ok");
        let failed = report.entries_for("always_failed");
        assert_eq!(ok.iter().next().map(|e| (e.path().to_string(), e.code())), Some(("a".into(), ResultCode::Ok)));
        assert_eq!(
            failed.iter().next().map(|e| (e.path().to_string(), e.code())),
            Some(("b".into(), ResultCode::Failed))
        );
    }

    #[test]
    fn dispatch_default_when_nothing_matches() {
        let builder = RuleRepositoryBuilder::new()
            .rule("never", |r| r.when(Condition::Constant(false)))
            .rule("empty", |r| {
                r.dispatch()
                    .on("missing/*", by_ids(["never"]))
                    .default_result(RuleResult::skipped())
                    .build()
            });
        let (mut ctx, _) = context(builder);
        let executor = Arc::clone(ctx.executor());
        let results = executor
            .validate_selector(&mut ctx, &by_ids(["empty"]), &Facts::map([("other", 1_i64)]))
            .unwrap();
        assert_eq!(results, vec![RuleResult::skipped()]);
    }

    #[test]
    fn recursive_dispatch_over_tree() {
        let (mut ctx, reporter) = context(tree_rules());
        let executor = Arc::clone(ctx.executor());
        let results = executor
            .validate_selector(&mut ctx, &by_ids(["node"]), &tree())
            .unwrap();
        assert!(results[0].is_failed());

        let failed = reporter.report().entries_for("named").filter_severity(ResultCode::Failed);
        let paths: Vec<String> = failed.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, vec!["children/1"]);
        assert_eq!(reporter.report().entries_for("named").len(), 4);
    }

    #[test]
    fn recursive_dispatch_async_agrees() {
        let (mut ctx, _) = context(tree_rules());
        let executor = Arc::clone(ctx.executor());
        let sync = executor
            .validate_selector(&mut ctx, &by_ids(["node"]), &tree())
            .unwrap();

        let (ctx, reporter) = context(tree_rules());
        let executor = Arc::clone(ctx.executor());
        let selector: Arc<dyn RuleSelector> = Arc::new(by_ids(["node"]));
        let async_results =
            futures::executor::block_on(executor.validate_selector_async(ctx, selector, tree())).unwrap();
        assert_eq!(sync, async_results);
        assert_eq!(reporter.report().entries_for("named").len(), 4);
    }

    #[test]
    fn selector_rule_forwards() {
        let builder = RuleRepositoryBuilder::new()
            .rule("positive", |r| r.when(fact("n").gt(0_i64)))
            .rule("small", |r| r.when(fact("n").lt(10_i64)))
            .rule("both", |r| r.select(by_ids(["positive", "small"])));
        let (mut ctx, _) = context(builder);
        let executor = Arc::clone(ctx.executor());
        let both = ctx.repository().get_rule("both").unwrap();
        assert!(executor.validate(&mut ctx, &both, &Facts::map([("n", 5_i64)])).is_ok());
        assert!(executor.validate(&mut ctx, &both, &Facts::map([("n", 50_i64)])).is_failed());
    }

    #[test]
    fn unknown_rule_fails_the_dispatcher() {
        let rule = RuleBuilder::new("bad")
            .dispatch()
            .on("a", by_ids(["missing"]))
            .build();
        let (mut ctx, _) = context(RuleRepositoryBuilder::new().add(rule));
        let executor = Arc::clone(ctx.executor());
        let bad = ctx.repository().get_rule("bad").unwrap();
        let result = executor.validate(&mut ctx, &bad, &Facts::map([("a", 1_i64)]));
        assert!(result.reason().unwrap().to_string().starts_with("rule_not_found"));
    }
}
