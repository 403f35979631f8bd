use std::fmt;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use super::facts::Facts;
use super::path::Path;
use super::result::{ResultCode, RuleResult};
use super::rule::RuleId;

/// One recorded validation: which rule ran where, on what, with which outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportEntry {
    path: Path,
    facts: Facts,
    rule: RuleId,
    result: RuleResult,
}

impl ReportEntry {
    pub fn new(path: Path, facts: Facts, rule: RuleId, result: RuleResult) -> Self {
        Self {
            path,
            facts,
            rule,
            result,
        }
    }

    /// Location of the validated facts relative to the top-level facts.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    #[must_use]
    pub fn rule(&self) -> &RuleId {
        &self.rule
    }

    #[must_use]
    pub fn result(&self) -> &RuleResult {
        &self.result
    }

    #[must_use]
    pub fn code(&self) -> ResultCode {
        self.result.code()
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at /{}: {}", self.rule, self.path, self.result)
    }
}

/// The outcome of a validation call: a deduplicated set of entries in
/// recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Report {
    entries: IndexSet<ReportEntry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `false` if an equal entry was already present.
    pub fn insert(&mut self, entry: ReportEntry) -> bool {
        self.entries.insert(entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    /// True when no entry is worse than Ok.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.entries.iter().all(|e| e.code() == ResultCode::Ok)
    }

    pub fn filter(&self, predicate: impl Fn(&ReportEntry) -> bool) -> Report {
        self.entries.iter().filter(|e| predicate(e)).cloned().collect()
    }

    /// Entries at least as severe as `min`.
    pub fn filter_severity(&self, min: ResultCode) -> Report {
        self.filter(|e| e.code() >= min)
    }

    pub fn entries_for(&self, rule: &str) -> Report {
        self.filter(|e| e.rule.as_str() == rule)
    }

    /// Split into sub-reports keyed by `projection`, keys in first-seen order.
    #[must_use]
    pub fn categorize<K, F>(&self, projection: F) -> IndexMap<K, Report>
    where
        K: Hash + Eq,
        F: Fn(&ReportEntry) -> K,
    {
        let mut categories: IndexMap<K, Report> = IndexMap::new();
        for entry in &self.entries {
            categories
                .entry(projection(entry))
                .or_default()
                .insert(entry.clone());
        }
        categories
    }

    /// The most severe code present, `None` for an empty report.
    #[must_use]
    pub fn severity(&self) -> Option<ResultCode> {
        self.entries.iter().map(ReportEntry::code).max()
    }

    /// Sorted by rule id, path, code, then reason text. Entries equal on
    /// every key keep their recording order.
    pub fn sorted(&self) -> Report {
        let mut entries: Vec<&ReportEntry> = self.entries.iter().collect();
        entries.sort_by_cached_key(|e| {
            (
                e.rule.clone(),
                e.path.clone(),
                e.code(),
                e.result.reason().map(ToString::to_string),
            )
        });
        entries.into_iter().cloned().collect()
    }

    /// Expand every entry with a composite reason into one entry per leaf
    /// reason, sharing path, facts, rule and code.
    pub fn flatten_reasons(&self) -> Report {
        let mut flat = Report::new();
        for entry in &self.entries {
            match entry.result.reason() {
                Some(reason) if reason.is_composite() => {
                    for leaf in reason.leaves() {
                        flat.insert(ReportEntry {
                            result: RuleResult::new(entry.code(), Some(leaf)),
                            ..entry.clone()
                        });
                    }
                }
                _ => {
                    flat.insert(entry.clone());
                }
            }
        }
        flat
    }

    /// Union with another report; this report's entries come first.
    pub fn merge(mut self, other: Report) -> Report {
        self.entries.extend(other.entries);
        self
    }

    /// Distinct rule ids in first-seen order.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.entries
            .iter()
            .map(|e| e.rule.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    fn count(&self, code: ResultCode) -> usize {
        self.entries.iter().filter(|e| e.code() == code).count()
    }
}

impl FromIterator<ReportEntry> for Report {
    fn from_iter<I: IntoIterator<Item = ReportEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<ReportEntry> for Report {
    fn extend<I: IntoIterator<Item = ReportEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Report {
    type Item = ReportEntry;
    type IntoIter = indexmap::set::IntoIter<ReportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a ReportEntry;
    type IntoIter = indexmap::set::Iter<'a, ReportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries: {} ok, {} skipped, {} failed",
            self.len(),
            self.count(ResultCode::Ok),
            self.count(ResultCode::Skipped),
            self.count(ResultCode::Failed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultReason;

    fn entry(rule: &str, path: &[&str], result: RuleResult) -> ReportEntry {
        ReportEntry::new(
            Path::named(path.iter().copied()),
            Facts::Null,
            RuleId::from(rule),
            result,
        )
    }

    fn sample() -> Report {
        [
            entry("b", &["x"], RuleResult::failed_because("bad")),
            entry("a", &["y"], RuleResult::ok()),
            entry("a", &["x"], RuleResult::skipped()),
            entry("a", &["x"], RuleResult::ok()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn deduplicates() {
        let mut report = sample();
        assert_eq!(report.len(), 4);
        assert!(!report.insert(entry("a", &["y"], RuleResult::ok())));
        assert_eq!(report.len(), 4);
    }

    #[test]
    fn severity() {
        assert_eq!(Report::new().severity(), None);
        assert_eq!(sample().severity(), Some(ResultCode::Failed));
        assert!(!sample().is_ok());
        assert!(sample().filter_severity(ResultCode::Ok).len() == 4);
    }

    #[test]
    fn filter_severity_is_monotone() {
        let report = sample();
        let skipped = report.filter_severity(ResultCode::Skipped);
        let failed = report.filter_severity(ResultCode::Failed);
        assert_eq!(skipped.len(), 2);
        assert_eq!(failed.len(), 1);
        assert!(failed.iter().all(|e| skipped.iter().any(|s| s == e)));
    }

    #[test]
    fn categorize_by_rule() {
        let categories = sample().categorize(|e| e.rule().clone());
        let keys: Vec<&str> = categories.keys().map(RuleId::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(categories[&RuleId::from("a")].len(), 3);
    }

    #[test]
    fn sorted_by_rule_path_code() {
        let sorted = sample().sorted();
        let keys: Vec<String> = sorted.iter().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "a at /x: OK",
                "a at /x: SKIPPED",
                "a at /y: OK",
                "b at /x: FAILED (bad)",
            ]
        );
    }

    #[test]
    fn flatten_expands_composites() {
        let merged = RuleResult::failed_because("one").merge(RuleResult::failed_because("two"));
        let report: Report = [entry("r", &["p"], merged)].into_iter().collect();
        let flat = report.flatten_reasons();
        assert_eq!(flat.len(), 2);
        let reasons: Vec<Option<&ResultReason>> = flat.iter().map(|e| e.result().reason()).collect();
        assert_eq!(
            reasons,
            vec![
                Some(&ResultReason::message("one")),
                Some(&ResultReason::message("two"))
            ]
        );
        assert!(flat.iter().all(|e| e.rule().as_str() == "r" && e.code() == ResultCode::Failed));
    }

    #[test]
    fn merge_and_rule_ids() {
        let other: Report = [
            entry("c", &[], RuleResult::ok()),
            entry("a", &["y"], RuleResult::ok()),
        ]
        .into_iter()
        .collect();
        let merged = sample().merge(other);
        assert_eq!(merged.len(), 5);
        assert_eq!(
            merged.rule_ids(),
            vec![RuleId::from("b"), RuleId::from("a"), RuleId::from("c")]
        );
        assert_eq!(merged.entries_for("a").len(), 3);
    }

    #[test]
    fn display_summary() {
        assert_eq!(sample().to_string(), "4 entries: 2 ok, 1 skipped, 1 failed");
    }
}
