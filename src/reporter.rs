use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Facts, Path, Report, ReportEntry, Rule, RuleResult, ValidationContext};

/// Receives every outcome the executor records.
///
/// `path` is the concatenation of the context's path stack at the time of
/// the call, i.e. the location of `facts` inside the top-level facts.
pub trait Reporter: fmt::Debug + Send + Sync {
    fn add(
        &self,
        ctx: &ValidationContext,
        facts: &Facts,
        path: &Path,
        rule: &dyn Rule,
        result: &RuleResult,
    );
}

type EntryFilter = Arc<dyn Fn(&ReportEntry) -> bool + Send + Sync>;

/// Collects outcomes into a [`Report`], optionally keeping only entries that
/// pass a predicate.
#[derive(Default)]
pub struct CollectingReporter {
    report: Mutex<Report>,
    filter: Option<EntryFilter>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filtered(predicate: impl Fn(&ReportEntry) -> bool + Send + Sync + 'static) -> Self {
        Self {
            report: Mutex::new(Report::new()),
            filter: Some(Arc::new(predicate)),
        }
    }

    /// A snapshot of everything collected so far.
    pub fn report(&self) -> Report {
        self.report.lock().clone()
    }

    pub fn take(&self) -> Report {
        std::mem::take(&mut *self.report.lock())
    }
}

impl fmt::Debug for CollectingReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectingReporter")
            .field("entries", &self.report.lock().len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl Reporter for CollectingReporter {
    fn add(
        &self,
        _ctx: &ValidationContext,
        facts: &Facts,
        path: &Path,
        rule: &dyn Rule,
        result: &RuleResult,
    ) {
        let entry = ReportEntry::new(path.clone(), facts.clone(), rule.id().clone(), result.clone());
        if self.filter.as_ref().is_some_and(|keep| !keep(&entry)) {
            return;
        }
        self.report.lock().insert(entry);
    }
}

/// Boolean AND over every recorded outcome being Ok.
#[derive(Debug)]
pub struct AllOkReporter {
    ok: AtomicBool,
}

impl AllOkReporter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ok: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }
}

impl Default for AllOkReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for AllOkReporter {
    fn add(
        &self,
        _ctx: &ValidationContext,
        _facts: &Facts,
        _path: &Path,
        _rule: &dyn Rule,
        result: &RuleResult,
    ) {
        if !result.is_ok() {
            self.ok.store(false, Ordering::Release);
        }
    }
}
