use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tracker::LabelDef;

static RE_REVIEW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)review").unwrap());
static RE_QA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(qa|test)").unwrap());
static RE_WORK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(work|progress|doing)").unwrap());

/// A pipeline stage inferred from a task's active labels.
///
/// Closed enumeration: a label either maps to one of these or is ignored for
/// stage purposes. `None` is a real stage — time with no stage label active
/// is accounted for, not dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    None,
    Work,
    Review,
    Qa,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::None => "none",
            Stage::Work => "work",
            Stage::Review => "review",
            Stage::Qa => "qa",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of labels active on a task at a point in time, with per-label
/// insertion sequence numbers.
///
/// Classification needs add recency, not just membership: a task usually
/// transitions by gaining the new stage's label before losing the old one.
/// Re-adding an already-active label refreshes its sequence number.
#[derive(Debug, Clone, Default)]
pub struct ActiveLabels {
    next_seq: u64,
    labels: BTreeMap<String, u64>,
}

impl ActiveLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.labels.insert(label.to_string(), seq);
    }

    pub fn remove(&mut self, label: &str) {
        self.labels.remove(label);
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels.iter().map(|(l, seq)| (l.as_str(), *seq))
    }
}

/// Mapping from label names to pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageLabelMap {
    map: BTreeMap<String, Stage>,
}

impl StageLabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, stage: Stage) {
        self.map.insert(label.to_string(), stage);
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Stage)>) -> Self {
        let mut map = Self::new();
        for (label, stage) in pairs {
            map.insert(label, stage);
        }
        map
    }

    /// Derive the table from a project's label list by naming convention.
    ///
    /// Precedence when a name matches several patterns (e.g. "qa-review"):
    /// review, then qa, then work — most specific first. Labels matching no
    /// pattern are left unmapped and ignored for classification.
    pub fn from_project_labels(labels: &[LabelDef]) -> Self {
        let mut map = Self::new();
        for def in labels {
            let stage = if RE_REVIEW.is_match(&def.name) {
                Stage::Review
            } else if RE_QA.is_match(&def.name) {
                Stage::Qa
            } else if RE_WORK.is_match(&def.name) {
                Stage::Work
            } else {
                continue;
            };
            map.insert(&def.name, stage);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn stage_of(&self, label: &str) -> Option<Stage> {
        self.map.get(label).copied()
    }

    /// Determine the current stage from the active label set.
    ///
    /// When several stage-labels are active at once, the most recently added
    /// wins. Sequence numbers are unique, so the result is deterministic even
    /// for labels added at the literally same timestamp (insertion order into
    /// the event list breaks the tie). No active stage label ⇒ `Stage::None`.
    pub fn classify(&self, active: &ActiveLabels) -> Stage {
        active
            .iter()
            .filter_map(|(label, seq)| self.stage_of(label).map(|stage| (seq, stage)))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, stage)| stage)
            .unwrap_or(Stage::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> LabelDef {
        LabelDef {
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_classify_empty_set_is_none() {
        let map = StageLabelMap::from_pairs([("work", Stage::Work)]);
        assert_eq!(map.classify(&ActiveLabels::new()), Stage::None);
    }

    #[test]
    fn test_classify_ignores_unmapped_labels() {
        let map = StageLabelMap::from_pairs([("work", Stage::Work)]);
        let mut active = ActiveLabels::new();
        active.add("bug");
        active.add("priority::high");
        assert_eq!(map.classify(&active), Stage::None);
        active.add("work");
        assert_eq!(map.classify(&active), Stage::Work);
    }

    #[test]
    fn test_classify_most_recent_add_wins() {
        let map = StageLabelMap::from_pairs([("work", Stage::Work), ("qa", Stage::Qa)]);
        let mut active = ActiveLabels::new();
        active.add("work");
        active.add("qa");
        assert_eq!(map.classify(&active), Stage::Qa);
        // Removing the older label does not change the winner
        active.remove("work");
        assert_eq!(map.classify(&active), Stage::Qa);
    }

    #[test]
    fn test_classify_readd_refreshes_recency() {
        let map = StageLabelMap::from_pairs([("work", Stage::Work), ("qa", Stage::Qa)]);
        let mut active = ActiveLabels::new();
        active.add("work");
        active.add("qa");
        active.add("work");
        assert_eq!(map.classify(&active), Stage::Work);
    }

    #[test]
    fn test_classify_is_deterministic_across_runs() {
        let map = StageLabelMap::from_pairs([("work", Stage::Work), ("review", Stage::Review)]);
        for _ in 0..10 {
            let mut active = ActiveLabels::new();
            active.add("work");
            active.add("review");
            assert_eq!(map.classify(&active), Stage::Review);
        }
    }

    #[test]
    fn test_from_project_labels_conventions() {
        let map = StageLabelMap::from_project_labels(&[
            def("In Review"),
            def("QA"),
            def("testing"),
            def("work: active"),
            def("In Progress"),
            def("bug"),
        ]);
        assert_eq!(map.stage_of("In Review"), Some(Stage::Review));
        assert_eq!(map.stage_of("QA"), Some(Stage::Qa));
        assert_eq!(map.stage_of("testing"), Some(Stage::Qa));
        assert_eq!(map.stage_of("work: active"), Some(Stage::Work));
        assert_eq!(map.stage_of("In Progress"), Some(Stage::Work));
        assert_eq!(map.stage_of("bug"), None);
    }

    #[test]
    fn test_from_project_labels_precedence() {
        // "qa-review" matches both review and qa; review is checked first.
        let map = StageLabelMap::from_project_labels(&[def("qa-review")]);
        assert_eq!(map.stage_of("qa-review"), Some(Stage::Review));
    }
}
