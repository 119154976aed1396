use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Which signal is allowed to bump a class count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementRule {
    /// Every Invisible -> Visible transition counts once. Matcher results are telemetry only.
    #[default]
    Reappearance,
    /// The transition counts only when the same frame also brought a new
    /// spatial instance of the class. Reappearing at a remembered spot makes
    /// the class Visible without counting.
    NewInstanceReappearance,
}

impl IncrementRule {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reappearance" => Some(Self::Reappearance),
            "new_instance_reappearance" => Some(Self::NewInstanceReappearance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reappearance => "reappearance",
            Self::NewInstanceReappearance => "new_instance_reappearance",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySettings {
    pub increment_rule: IncrementRule,
    /// Consecutive absent frames tolerated before a Visible class ends its episode.
    pub absence_grace_frames: u32,
}

/// Per-class presence. One flag per class: two simultaneous instances of a
/// class share it, so the second one is never counted separately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityState {
    #[default]
    Invisible,
    Visible,
}

impl VisibilityState {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// Running appearance count per class.
///
/// Entries appear on the first increment and only ever grow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountTable {
    counts: BTreeMap<String, u64>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a class, or `None` if it was never counted.
    pub fn get(&self, class_name: &str) -> Option<u64> {
        self.counts.get(class_name).copied()
    }

    /// Classes in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub(crate) fn increment(&mut self, class_name: &str) -> u64 {
        let count = self.counts.entry(class_name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

/// What one class looked like in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassObservation {
    /// At least one detection of the class was a new spatial instance.
    pub new_instance: bool,
}

/// Classes detected in a frame, with their matcher outcome folded per class.
#[derive(Clone, Debug, Default)]
pub struct FrameObservations {
    classes: HashMap<String, ClassObservation>,
}

impl FrameObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one detection of `class_name`.
    pub fn record(&mut self, class_name: &str, accepted_as_new: bool) {
        let obs = self.classes.entry(class_name.to_string()).or_default();
        obs.new_instance |= accepted_as_new;
    }

    pub fn get(&self, class_name: &str) -> Option<ClassObservation> {
        self.classes.get(class_name).copied()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, ClassObservation)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, bool)> for FrameObservations {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut obs = Self::new();
        for (class_name, accepted) in iter {
            obs.record(class_name.as_ref(), accepted);
        }
        obs
    }
}

/// Transitions produced by one `VisibilityCounter::apply` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityUpdate {
    /// Classes whose count went up, with the new count. Name order.
    pub incremented: Vec<(String, u64)>,
    /// Classes that became Visible without counting (strict rule only).
    pub silent_reappearances: Vec<String>,
    /// Classes whose appearance episode ended. Name order.
    pub ended: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default)]
struct ClassPresence {
    state: VisibilityState,
    absent_frames: u32,
}

/// Per-class Invisible/Visible state machine and the count table it feeds.
#[derive(Clone, Debug, Default)]
pub struct VisibilityCounter {
    settings: VisibilitySettings,
    presence: HashMap<String, ClassPresence>,
    counts: CountTable,
}

impl VisibilityCounter {
    pub fn new(settings: VisibilitySettings) -> Self {
        Self {
            settings,
            presence: HashMap::new(),
            counts: CountTable::new(),
        }
    }

    /// Advance one frame and return the updated table.
    pub fn update(&mut self, observations: &FrameObservations) -> &CountTable {
        self.apply(observations);
        &self.counts
    }

    /// Advance one frame and report what changed.
    pub fn apply(&mut self, observations: &FrameObservations) -> VisibilityUpdate {
        let mut update = VisibilityUpdate::default();

        for (class_name, obs) in observations.classes() {
            let presence = self.presence.entry(class_name.to_string()).or_default();
            presence.absent_frames = 0;
            if presence.state.is_visible() {
                continue;
            }

            presence.state = VisibilityState::Visible;
            let counts = match self.settings.increment_rule {
                IncrementRule::Reappearance => true,
                IncrementRule::NewInstanceReappearance => obs.new_instance,
            };
            if counts {
                let count = self.counts.increment(class_name);
                update.incremented.push((class_name.to_string(), count));
            } else {
                update.silent_reappearances.push(class_name.to_string());
            }
        }

        for (class_name, presence) in self.presence.iter_mut() {
            if observations.contains(class_name) || !presence.state.is_visible() {
                continue;
            }
            presence.absent_frames = presence.absent_frames.saturating_add(1);
            if presence.absent_frames > self.settings.absence_grace_frames {
                presence.state = VisibilityState::Invisible;
                update.ended.push(class_name.clone());
            }
        }

        update.incremented.sort();
        update.silent_reappearances.sort();
        update.ended.sort();
        update
    }

    /// State for a class; classes never seen are Invisible.
    pub fn state(&self, class_name: &str) -> VisibilityState {
        self.presence
            .get(class_name)
            .map(|p| p.state)
            .unwrap_or_default()
    }

    pub fn counts(&self) -> &CountTable {
        &self.counts
    }

    pub fn visible_classes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .presence
            .iter()
            .filter(|(_, p)| p.state.is_visible())
            .map(|(k, _)| k.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn settings(&self) -> VisibilitySettings {
        self.settings
    }
}
