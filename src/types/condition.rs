use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use super::context::ValidationContext;
use super::error::ValidationError;
use super::facts::Facts;
use super::path::Path;
use super::selector::{IdSelector, RuleSelector};
use super::value::Value;

/// Comparison operators supported in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

/// A predicate over the validation context and the facts under validation.
///
/// Built with [`fact`], [`param`], [`meta`] and [`rule_ref`] and combined
/// with [`Condition::and`], [`Condition::or`], [`Condition::xor`] and `!`.
#[derive(Debug, Clone)]
pub enum Condition {
    Constant(bool),
    Compare {
        left: Value<Facts>,
        op: CompareOp,
        right: Value<Facts>,
    },
    IsNull(Value<Facts>),
    /// True when the path resolves, even to null.
    Exists(Value<String>),
    Test(Value<bool>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    /// True when an odd number of operands hold.
    Xor(Vec<Condition>),
    Not(Box<Condition>),
    /// Holds when no selected rule fails.
    Rule(RuleCondition),
}

impl Condition {
    /// Evaluate the condition.
    ///
    /// `And` and `Or` short-circuit; `Xor` and `Not` evaluate every operand.
    /// Comparisons between incompatible kinds are false.
    ///
    /// # Errors
    ///
    /// Propagates errors raised while computing operand values or while
    /// running the rules of a [`Condition::Rule`].
    pub fn test(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<bool, ValidationError> {
        match self {
            Condition::Constant(value) => Ok(*value),
            Condition::Compare { left, op, right } => {
                let l = left.evaluate(ctx, facts)?;
                let r = right.evaluate(ctx, facts)?;
                Ok(l.compare(*op, &r).unwrap_or(false))
            }
            Condition::IsNull(value) => Ok(value.evaluate(ctx, facts)?.is_null()),
            Condition::Exists(path) => {
                let raw = path.evaluate(ctx, facts)?;
                let resolver = ctx.resolver();
                let path = resolver.parse(&raw)?;
                Ok(resolver.resolve(facts, &path).is_found())
            }
            Condition::Test(value) => value.evaluate(ctx, facts),
            Condition::And(operands) => {
                for operand in operands {
                    if !operand.test(ctx, facts)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(operands) => {
                for operand in operands {
                    if operand.test(ctx, facts)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Xor(operands) => {
                let mut odd = false;
                for operand in operands {
                    odd ^= operand.test(ctx, facts)?;
                }
                Ok(odd)
            }
            Condition::Not(inner) => Ok(!inner.test(ctx, facts)?),
            Condition::Rule(rule) => rule.test(ctx, facts),
        }
    }

    #[must_use]
    pub fn and(self, other: impl Into<Condition>) -> Condition {
        let other = other.into();
        match self {
            Condition::And(mut operands) => {
                operands.push(other);
                Condition::And(operands)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: impl Into<Condition>) -> Condition {
        let other = other.into();
        match self {
            Condition::Or(mut operands) => {
                operands.push(other);
                Condition::Or(operands)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    #[must_use]
    pub fn xor(self, other: impl Into<Condition>) -> Condition {
        let other = other.into();
        match self {
            Condition::Xor(mut operands) => {
                operands.push(other);
                Condition::Xor(operands)
            }
            first => Condition::Xor(vec![first, other]),
        }
    }

    /// Conjunction of every condition. Empty is true.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::And(conditions.into_iter().collect())
    }

    /// Disjunction of every condition. Empty is false.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::Or(conditions.into_iter().collect())
    }

    /// True when the path resolves against the facts.
    pub fn exists(path: impl Into<Value<String>>) -> Condition {
        Condition::Exists(path.into())
    }

    /// Wrap a boolean value as a condition.
    pub fn test_value(value: Value<bool>) -> Condition {
        Condition::Test(value)
    }

    /// A condition computed by a closure over the facts.
    pub fn from_fn<F>(label: impl Into<String>, f: F) -> Condition
    where
        F: Fn(&Facts) -> bool + Send + Sync + 'static,
    {
        Condition::Test(Value::from_fn(label, move |_, facts| Ok(f(facts))))
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Condition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Constant(value) => write!(f, "{value}"),
            Condition::Compare { left, op, right } => write!(f, "({left} {op} {right})"),
            Condition::IsNull(value) => write!(f, "({value} IS NULL)"),
            Condition::Exists(path) => write!(f, "EXISTS {path}"),
            Condition::Test(value) => write!(f, "{value}"),
            Condition::And(operands) => write_joined(f, operands, "AND"),
            Condition::Or(operands) => write_joined(f, operands, "OR"),
            Condition::Xor(operands) => write_joined(f, operands, "XOR"),
            Condition::Not(inner) => write!(f, "(NOT {inner})"),
            Condition::Rule(rule) => write!(f, "{rule}"),
        }
    }
}

/// Runs the selected rules, optionally at every path matching a set of
/// patterns, and holds when none of them fails.
#[derive(Debug, Clone)]
pub struct RuleCondition {
    selector: Arc<dyn RuleSelector>,
    patterns: Vec<Value<String>>,
}

impl RuleCondition {
    pub fn new(selector: impl RuleSelector + 'static) -> Self {
        Self {
            selector: Arc::new(selector),
            patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn selector(&self) -> &Arc<dyn RuleSelector> {
        &self.selector
    }

    fn test(&self, ctx: &mut ValidationContext, facts: &Facts) -> Result<bool, ValidationError> {
        let executor = Arc::clone(ctx.executor());
        let results = if self.patterns.is_empty() {
            executor.validate_selector(ctx, self.selector.as_ref(), facts)?
        } else {
            let resolver = Arc::clone(ctx.resolver());
            let mut patterns = Vec::with_capacity(self.patterns.len());
            for pattern in &self.patterns {
                patterns.push(resolver.parse(&pattern.evaluate(ctx, facts)?)?);
            }
            let paths: Vec<Path> = resolver.resolve_patterns(facts, &patterns).collect();
            executor.validate_selector_for_paths(ctx, self.selector.as_ref(), facts, &paths)?
        };
        Ok(results.iter().all(|result| !result.is_failed()))
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RULES {:?}", self.selector)?;
        if !self.patterns.is_empty() {
            write!(f, " AT ")?;
            for (i, pattern) in self.patterns.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{pattern}")?;
            }
        }
        Ok(())
    }
}

/// Builder returned by [`rule_ref`]. Converts into a [`Condition`].
#[derive(Debug, Clone)]
pub struct RuleRef {
    condition: RuleCondition,
}

impl RuleRef {
    /// Run the rule at every path matching `pattern` instead of on the facts
    /// themselves. May be called repeatedly to add patterns.
    #[must_use]
    pub fn at(mut self, pattern: impl Into<Value<String>>) -> Self {
        self.condition.patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn and(self, other: impl Into<Condition>) -> Condition {
        Condition::from(self).and(other)
    }

    #[must_use]
    pub fn or(self, other: impl Into<Condition>) -> Condition {
        Condition::from(self).or(other)
    }
}

impl From<RuleRef> for Condition {
    fn from(value: RuleRef) -> Self {
        Condition::Rule(value.condition)
    }
}

impl From<RuleCondition> for Condition {
    fn from(value: RuleCondition) -> Self {
        Condition::Rule(value)
    }
}

impl Not for RuleRef {
    type Output = Condition;

    fn not(self) -> Condition {
        !Condition::from(self)
    }
}

/// Operand builder for comparisons. Created by [`fact`], [`param`], [`meta`]
/// and [`literal`].
#[derive(Debug, Clone)]
pub struct Operand {
    value: Value<Facts>,
}

impl Operand {
    fn compare(self, op: CompareOp, right: impl Into<Value<Facts>>) -> Condition {
        Condition::Compare {
            left: self.value,
            op,
            right: right.into(),
        }
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Neq, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value<Facts>>) -> Condition {
        self.compare(CompareOp::Lte, value)
    }

    #[must_use]
    pub fn is_null(self) -> Condition {
        Condition::IsNull(self.value)
    }

    #[must_use]
    pub fn is_not_null(self) -> Condition {
        !Condition::IsNull(self.value)
    }

    #[must_use]
    pub fn into_value(self) -> Value<Facts> {
        self.value
    }
}

impl From<Operand> for Value<Facts> {
    fn from(value: Operand) -> Self {
        value.value
    }
}

/// The value at `path`, relative to the facts under validation.
#[must_use]
pub fn fact(path: &str) -> Operand {
    Operand {
        value: Value::path(path),
    }
}

/// The facts under validation themselves.
#[must_use]
pub fn this() -> Operand {
    Operand {
        value: Value::facts(),
    }
}

/// A parameter of the validation call.
#[must_use]
pub fn param(name: &str) -> Operand {
    Operand {
        value: Value::parameter(name),
    }
}

/// Metadata of the executing rule.
#[must_use]
pub fn meta(key: &str) -> Operand {
    Operand {
        value: Value::metadata(key),
    }
}

#[must_use]
pub fn literal(value: impl Into<Facts>) -> Operand {
    Operand {
        value: Value::literal(value.into()),
    }
}

/// Reference another rule by id. Holds unless that rule fails.
#[must_use]
pub fn rule_ref(id: &str) -> RuleRef {
    rules(IdSelector::new([id]))
}

/// Reference every rule a selector picks. Holds unless one of them fails.
#[must_use]
pub fn rules(selector: impl RuleSelector + 'static) -> RuleRef {
    RuleRef {
        condition: RuleCondition::new(selector),
    }
}
