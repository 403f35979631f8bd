use std::fmt;
use std::sync::Arc;

use super::context::ValidationContext;
use super::error::ValidationError;
use super::facts::{Facts, FromFacts};
use crate::path::Resolved;

type Eval<T> = dyn Fn(&ValidationContext, &Facts) -> Result<T, ValidationError> + Send + Sync;

/// A pure, typed expression computed from the validation context and the
/// facts under validation.
///
/// Values compose: the path of [`Value::path`], the name of
/// [`Value::parameter`] and the key of [`Value::metadata`] are themselves
/// `Value<String>`s, so a plain `&str` works as well as a computed name.
pub struct Value<T> {
    label: Arc<str>,
    eval: Arc<Eval<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            eval: Arc::clone(&self.eval),
        }
    }
}

impl<T> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.label).finish()
    }
}

impl<T> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl<T: 'static> Value<T> {
    /// A value computed by an arbitrary function. `label` is used for display.
    pub fn from_fn<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ValidationContext, &Facts) -> Result<T, ValidationError> + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label.into()),
            eval: Arc::new(f),
        }
    }

    /// A value produced by a supplier that ignores context and facts.
    pub fn supplier<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_fn(label, move |_, _| Ok(f()))
    }

    /// Evaluate against a context and facts.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a path, parameter or metadata entry is
    /// missing or has the wrong type.
    pub fn evaluate(&self, ctx: &ValidationContext, facts: &Facts) -> Result<T, ValidationError> {
        (self.eval)(ctx, facts)
    }

    /// Transform the evaluated value.
    #[must_use]
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Value<U> {
        let label = self.label.to_string();
        Value::from_fn(label, move |ctx, facts| self.evaluate(ctx, facts).map(&f))
    }
}

impl<T> Value<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn literal(value: T) -> Self {
        Self::from_fn(format!("{value:?}"), move |_, _| Ok(value.clone()))
    }
}

impl<T: FromFacts + 'static> Value<T> {
    /// Look up a path relative to the facts under validation.
    pub fn path(path: impl Into<Value<String>>) -> Self {
        let path = path.into();
        Self::from_fn(format!("${path}"), move |ctx, facts| {
            let raw = path.evaluate(ctx, facts)?;
            match lookup(ctx, facts, &raw)? {
                Resolved::Found(found) => convert(&found, || format!("path '{raw}'")),
                Resolved::NotFound => Err(ValidationError::PathNotFound { path: raw }),
            }
        })
    }

    /// Look up a path, falling back to `default` when the path is missing or
    /// holds null.
    pub fn path_or(path: impl Into<Value<String>>, default: impl Into<Value<T>>) -> Self {
        let path = path.into();
        let default = default.into();
        Self::from_fn(format!("${path} ?? {default}"), move |ctx, facts| {
            let raw = path.evaluate(ctx, facts)?;
            match lookup(ctx, facts, &raw)? {
                Resolved::Found(found) if !found.is_null() => {
                    convert(&found, || format!("path '{raw}'"))
                }
                _ => default.evaluate(ctx, facts),
            }
        })
    }

    /// A parameter passed to the validation call.
    pub fn parameter(name: impl Into<Value<String>>) -> Self {
        let name = name.into();
        Self::from_fn(format!("param({name})"), move |ctx, facts| {
            let name = name.evaluate(ctx, facts)?;
            match ctx.parameter(&name) {
                Some(found) => convert(found, || format!("parameter '{name}'")),
                None => Err(ValidationError::MissingParameter { name }),
            }
        })
    }

    /// Metadata of the rule currently executing (the top of the rule stack).
    pub fn metadata(key: impl Into<Value<String>>) -> Self {
        let key = key.into();
        Self::from_fn(format!("meta({key})"), move |ctx, facts| {
            let key = key.evaluate(ctx, facts)?;
            let Some(rule) = ctx.current_rule() else {
                return Err(ValidationError::NoActiveRule { key });
            };
            match rule.metadata().get(&key) {
                Some(found) => convert(found, || format!("metadata '{key}'")),
                None => Err(ValidationError::MissingMetadata {
                    rule: rule.id().to_string(),
                    key,
                }),
            }
        })
    }
}

impl Value<Facts> {
    /// The facts under validation.
    #[must_use]
    pub fn facts() -> Self {
        Self::from_fn("$", |_, facts| Ok(facts.clone()))
    }
}

fn lookup(ctx: &ValidationContext, facts: &Facts, raw: &str) -> Result<Resolved<Facts>, ValidationError> {
    let resolver = ctx.resolver();
    let path = resolver.parse(raw)?;
    Ok(resolver.resolve(facts, &path))
}

fn convert<T: FromFacts>(found: &Facts, source: impl FnOnce() -> String) -> Result<T, ValidationError> {
    T::from_facts(found).ok_or_else(|| ValidationError::TypeMismatch {
        expected: T::EXPECTED.to_owned(),
        found: found.kind().to_owned(),
        source_desc: source(),
    })
}

impl<T> From<T> for Value<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Value::literal(value)
    }
}

impl From<&str> for Value<String> {
    fn from(value: &str) -> Self {
        Value::literal(value.to_owned())
    }
}

impl From<&str> for Value<Facts> {
    fn from(value: &str) -> Self {
        Value::literal(Facts::from(value))
    }
}

impl From<String> for Value<Facts> {
    fn from(value: String) -> Self {
        Value::literal(Facts::from(value))
    }
}

impl From<i64> for Value<Facts> {
    fn from(value: i64) -> Self {
        Value::literal(Facts::from(value))
    }
}

impl From<f64> for Value<Facts> {
    fn from(value: f64) -> Self {
        Value::literal(Facts::from(value))
    }
}

impl From<bool> for Value<Facts> {
    fn from(value: bool) -> Self {
        Value::literal(Facts::from(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{RuleBuilder, RuleRepositoryBuilder};

    fn context() -> ValidationContext {
        let repository = RuleRepositoryBuilder::new().build().unwrap();
        ValidationContext::builder(Arc::new(repository))
            .parameter("limit", 10_i64)
            .build()
    }

    fn product() -> Facts {
        Facts::map([
            ("price", Facts::from(12_i64)),
            ("discount", Facts::Null),
            ("field", Facts::from("price")),
        ])
    }

    #[test]
    fn literal_and_supplier() {
        let ctx = context();
        assert_eq!(Value::literal(3_i64).evaluate(&ctx, &Facts::Null).unwrap(), 3);
        let v = Value::supplier("seven", || 7_i64);
        assert_eq!(v.evaluate(&ctx, &Facts::Null).unwrap(), 7);
        assert_eq!(v.to_string(), "seven");
    }

    #[test]
    fn path_lookup() {
        let ctx = context();
        let price: Value<i64> = Value::path("price");
        assert_eq!(price.evaluate(&ctx, &product()).unwrap(), 12);
        assert_eq!(price.to_string(), "$\"price\"");
    }

    #[test]
    fn path_lookup_missing_is_an_error() {
        let ctx = context();
        let missing: Value<i64> = Value::path("weight");
        assert!(matches!(
            missing.evaluate(&ctx, &product()),
            Err(ValidationError::PathNotFound { path }) if path == "weight"
        ));
    }

    #[test]
    fn path_lookup_wrong_type() {
        let ctx = context();
        let wrong: Value<bool> = Value::path("price");
        assert!(matches!(
            wrong.evaluate(&ctx, &product()),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn path_or_default() {
        let ctx = context();
        let weight: Value<i64> = Value::path_or("weight", 0_i64);
        assert_eq!(weight.evaluate(&ctx, &product()).unwrap(), 0);
        let discount: Value<i64> = Value::path_or("discount", 5_i64);
        assert_eq!(discount.evaluate(&ctx, &product()).unwrap(), 5);
        let price: Value<i64> = Value::path_or("price", 0_i64);
        assert_eq!(price.evaluate(&ctx, &product()).unwrap(), 12);
    }

    #[test]
    fn computed_path() {
        let ctx = context();
        // The path itself comes from the facts.
        let indirect: Value<i64> = Value::path(Value::<String>::path("field"));
        assert_eq!(indirect.evaluate(&ctx, &product()).unwrap(), 12);
    }

    #[test]
    fn parameters() {
        let ctx = context();
        let limit: Value<i64> = Value::parameter("limit");
        assert_eq!(limit.evaluate(&ctx, &Facts::Null).unwrap(), 10);
        let other: Value<i64> = Value::parameter("other");
        assert!(matches!(
            other.evaluate(&ctx, &Facts::Null),
            Err(ValidationError::MissingParameter { .. })
        ));
    }

    #[test]
    fn metadata_without_active_rule() {
        let ctx = context();
        let max: Value<i64> = Value::metadata("max");
        assert!(matches!(
            max.evaluate(&ctx, &Facts::Null),
            Err(ValidationError::NoActiveRule { .. })
        ));
    }

    #[test]
    fn metadata_of_active_rule() {
        let mut ctx = context();
        let rule: Arc<dyn crate::Rule> = Arc::new(
            RuleBuilder::new("r")
                .metadata("max", 100_i64)
                .when(crate::Condition::Constant(true)),
        );
        ctx.push_rule(rule, Facts::Null);
        let max: Value<i64> = Value::metadata("max");
        assert_eq!(max.evaluate(&ctx, &Facts::Null).unwrap(), 100);
        let min: Value<i64> = Value::metadata("min");
        assert!(matches!(
            min.evaluate(&ctx, &Facts::Null),
            Err(ValidationError::MissingMetadata { .. })
        ));
        ctx.pop_rule();
    }

    #[test]
    fn map_transforms() {
        let ctx = context();
        let doubled = Value::<i64>::path("price").map(|p| p * 2);
        assert_eq!(doubled.evaluate(&ctx, &product()).unwrap(), 24);
    }
}
