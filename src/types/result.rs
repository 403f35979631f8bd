use std::fmt;

use super::error::ValidationError;

/// Outcome code of a rule. Ordered by severity: `Ok < Skipped < Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ResultCode {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "OK"),
            ResultCode::Skipped => write!(f, "SKIPPED"),
            ResultCode::Failed => write!(f, "FAILED"),
        }
    }
}

/// Explanation attached to a [`RuleResult`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ResultReason {
    Message(String),
    /// Derived from an error raised while evaluating a rule.
    Error { kind: String, message: String },
    Composite(Vec<ResultReason>),
}

impl ResultReason {
    pub fn message(text: impl Into<String>) -> Self {
        ResultReason::Message(text.into())
    }

    /// Flatten composites into their leaf reasons, depth first.
    #[must_use]
    pub fn leaves(&self) -> Vec<ResultReason> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<ResultReason>) {
        match self {
            ResultReason::Composite(parts) => {
                for part in parts {
                    part.collect_leaves(out);
                }
            }
            leaf => out.push(leaf.clone()),
        }
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, ResultReason::Composite(_))
    }
}

impl fmt::Display for ResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultReason::Message(text) => write!(f, "{text}"),
            ResultReason::Error { kind, message } => write!(f, "{kind}: {message}"),
            ResultReason::Composite(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&ValidationError> for ResultReason {
    fn from(err: &ValidationError) -> Self {
        ResultReason::Error {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

/// The outcome of validating one rule against one facts value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[must_use]
pub struct RuleResult {
    code: ResultCode,
    reason: Option<ResultReason>,
}

impl RuleResult {
    pub fn new(code: ResultCode, reason: Option<ResultReason>) -> Self {
        Self { code, reason }
    }

    pub fn ok() -> Self {
        Self::new(ResultCode::Ok, None)
    }

    pub fn skipped() -> Self {
        Self::new(ResultCode::Skipped, None)
    }

    pub fn failed() -> Self {
        Self::new(ResultCode::Failed, None)
    }

    pub fn failed_because(reason: impl Into<String>) -> Self {
        Self::new(ResultCode::Failed, Some(ResultReason::message(reason)))
    }

    pub fn from_error(err: &ValidationError) -> Self {
        Self::new(ResultCode::Failed, Some(err.into()))
    }

    pub fn with_reason(mut self, reason: ResultReason) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn code(&self) -> ResultCode {
        self.code
    }

    #[must_use]
    pub fn reason(&self) -> Option<&ResultReason> {
        self.reason.as_ref()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == ResultCode::Ok
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.code == ResultCode::Skipped
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.code == ResultCode::Failed
    }

    /// Severity merge: the worse result wins. Results with equal codes keep
    /// the code and concatenate their flattened reasons.
    pub fn merge(self, other: RuleResult) -> RuleResult {
        match self.code.cmp(&other.code) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => {
                let reason = match (self.reason, other.reason) {
                    (None, r) | (r, None) => r,
                    (Some(a), Some(b)) => {
                        let mut leaves = a.leaves();
                        leaves.extend(b.leaves());
                        Some(ResultReason::Composite(leaves))
                    }
                };
                RuleResult::new(self.code, reason)
            }
        }
    }
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{} ({reason})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}
