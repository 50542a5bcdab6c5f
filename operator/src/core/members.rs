use std::collections::BTreeMap;

use super::member::Member;
use crate::util::Error;

/// A reference to an observed pod: the minimum the core needs from the
/// orchestration platform's opaque pod record (§6 Observed-state input).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
}

/// Keyed collection of [`Member`]s. A `BTreeMap` gives us name order for
/// free, which both §4.1's deterministic pruning rule and §4.6's
/// lexicographic tie-breaks depend on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberSet {
    members: BTreeMap<String, Member>,
}

impl MemberSet {
    pub fn new() -> Self {
        MemberSet {
            members: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, member: Member) {
        self.members.insert(member.name.clone(), member);
    }

    pub fn remove(&mut self, name: &str) -> Option<Member> {
        self.members.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.values_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|s| s.as_str())
    }

    /// Count of peers with Online ∧ ¬AppFailed.
    pub fn active_count(&self) -> u32 {
        self.iter().filter(|m| m.is_active()).count() as u32
    }

    /// Count of peers with AppRunning ∧ ¬AppFailed.
    pub fn app_member_count(&self) -> u32 {
        self.iter().filter(|m| m.is_app_member()).count() as u32
    }

    /// Count of peers with AppPrimary ∧ ¬AppFailed.
    pub fn primary_count(&self) -> u32 {
        self.iter().filter(|m| m.is_app_primary()).count() as u32
    }

    /// Builds the running set R from an observed pod list, per §4.4 step 1:
    /// every observed pod becomes a member with Online=true.
    pub fn from_observed_pods(pods: &[PodRef]) -> MemberSet {
        let mut running = MemberSet::new();
        for pod in pods {
            let mut m = Member::new(pod.name.clone(), pod.namespace.clone());
            m.online = true;
            running.add(m);
        }
        running
    }

    /// §4.1: reconciles `self` (the previous peer set) against `running`
    /// (freshly observed pods) at `desired` size.
    ///
    /// - Every member of `running` is present in the result with Online=true.
    /// - Members previously in `self` but absent from `running` are
    ///   retained with Online=false, so Failures survives a transient
    ///   disappearance.
    /// - The result never exceeds `desired` live members; surplus is pruned
    ///   by name order, lexicographically largest first.
    pub fn reconcile(&self, running: &MemberSet, desired: u32) -> Result<MemberSet, Error> {
        if desired == 0 && !running.is_empty() {
            return Err(Error::Reconcile(
                "desired size is zero but live pods are still present".to_string(),
            ));
        }

        let mut merged = MemberSet::new();
        for incoming in running.iter() {
            let mut m = self.get(&incoming.name).cloned().unwrap_or_else(|| incoming.clone());
            m.online = true;
            merged.add(m);
        }
        for old in self.iter() {
            if !running.contains(&old.name) {
                let mut m = old.clone();
                m.online = false;
                merged.add(m);
            }
        }

        while merged.len() as u32 > desired {
            let Some(surplus_name) = merged.members.keys().next_back().cloned() else {
                break;
            };
            merged.remove(&surplus_name);
        }

        Ok(merged)
    }
}
