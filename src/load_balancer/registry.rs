//! Target registry and busy set.
//!
//! # Responsibilities
//! - Hold the most recent successful discovery result
//! - Track which target keys are assigned to an in-flight request
//! - Pick an idle target for the dispatcher
//!
//! # Design Decisions
//! - Not synchronized on its own; the pool mutex serializes every access
//! - A busy key may outlive its registry entry; it is simply never picked again
//!   and is forgotten when released

use std::collections::{HashMap, HashSet};

use crate::load_balancer::target::{Target, TargetKey};

/// Outcome of replacing the registry contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Known targets plus the set of keys currently in use.
#[derive(Debug, Default)]
pub struct Registry {
    targets: HashMap<TargetKey, Target>,
    busy: HashSet<TargetKey>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known targets wholesale. Busy keys are left untouched.
    ///
    /// If the same key is listed twice the last entry wins.
    pub fn replace(&mut self, targets: Vec<Target>) -> RefreshSummary {
        let current: HashMap<TargetKey, Target> = targets
            .into_iter()
            .map(|target| (target.key.clone(), target))
            .collect();

        let added = current
            .keys()
            .filter(|key| !self.targets.contains_key(*key))
            .count();
        let removed = self
            .targets
            .keys()
            .filter(|key| !current.contains_key(*key))
            .count();

        self.targets = current;

        RefreshSummary {
            added,
            removed,
            total: self.targets.len(),
        }
    }

    /// Pick an idle target uniformly at random.
    pub fn pick_idle(&self) -> Option<&Target> {
        let idle = self.targets.len().saturating_sub(self.busy_known());
        if idle == 0 {
            return None;
        }

        let nth = fastrand::usize(..idle);
        self.targets
            .values()
            .filter(|target| !self.busy.contains(&target.key))
            .nth(nth)
    }

    /// Mark a key as assigned. Returns false if it already was.
    pub fn mark_busy(&mut self, key: &TargetKey) -> bool {
        self.busy.insert(key.clone())
    }

    /// Forget an assignment. Returns false if the key was not busy.
    pub fn release(&mut self, key: &TargetKey) -> bool {
        self.busy.remove(key)
    }

    pub fn is_busy(&self, key: &TargetKey) -> bool {
        self.busy.contains(key)
    }

    /// Number of known targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Number of busy keys, including ones no longer in the registry.
    pub fn busy_len(&self) -> usize {
        self.busy.len()
    }

    /// Iterate over known targets in arbitrary order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    fn busy_known(&self) -> usize {
        self.busy
            .iter()
            .filter(|key| self.targets.contains_key(*key))
            .count()
    }
}
