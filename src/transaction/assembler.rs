// src/transaction/assembler.rs

//! Turning a solver solution into ordered transaction entries
//!
//! The solution only says which packages move; the assembler decides the
//! action of each entry, the reason it carries, and the order entries are
//! executed in.
//!
//! # Ordering
//!
//! Entries form a graph with three kinds of edges:
//!
//! - an incoming package providing a requirement of another incoming
//!   package goes first
//! - a leaving package requiring something another leaving package
//!   provides goes first
//! - a replacing package goes before the entry it replaces
//!
//! The graph is drained with Kahn's algorithm. Among ready entries the
//! smallest by (name, arch, version, action) goes next, so the order is
//! stable across runs. A cycle is broken by forcing the smallest remaining
//! entry.

use super::{TransactionItemAction, TransactionItemReason, TransactionPackage};
use crate::sack::{PackageId, PackageSack};
use crate::solver::Solution;
use crate::state::SystemState;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Builds package entries from a [`Solution`]
pub struct TransactionAssembler<'a> {
    sack: &'a PackageSack,
    state: &'a SystemState,
    /// Full NEVRA -> reason requested by a replayed transaction
    overrides: BTreeMap<String, TransactionItemReason>,
    reason_changes: Vec<(PackageId, TransactionItemReason, Option<String>)>,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(sack: &'a PackageSack, state: &'a SystemState) -> Self {
        Self {
            sack,
            state,
            overrides: BTreeMap::new(),
            reason_changes: Vec::new(),
        }
    }

    /// Reasons to force on entries, keyed by full NEVRA
    pub fn with_reason_overrides(mut self, overrides: BTreeMap<String, TransactionItemReason>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Add a reason change for an installed package
    ///
    /// Ignored when the package already has an entry of its own.
    pub fn add_reason_change(
        &mut self,
        id: PackageId,
        reason: TransactionItemReason,
        group_id: Option<String>,
    ) {
        if let Some(existing) = self.reason_changes.iter_mut().find(|(other, _, _)| *other == id) {
            existing.1 = reason;
            existing.2 = group_id;
        } else {
            self.reason_changes.push((id, reason, group_id));
        }
    }

    /// Ordered entries for `solution`
    pub fn assemble(&self, solution: &Solution) -> Vec<TransactionPackage> {
        let mut entries = Vec::new();

        for &id in &solution.installs {
            let reason = self.inbound_reason(solution, id).max(solution.reason(id));
            entries.push(self.entry(id, TransactionItemAction::Install, reason, solution));
        }
        for (ids, action) in [
            (&solution.upgrades, TransactionItemAction::Upgrade),
            (&solution.downgrades, TransactionItemAction::Downgrade),
            (&solution.reinstalls, TransactionItemAction::Reinstall),
        ] {
            for &id in ids {
                let reason = self.inbound_reason(solution, id);
                entries.push(self.entry(id, action, reason, solution));
            }
        }
        for (&old, by) in &solution.replaced {
            let pkg = self.sack.package(old);
            let mut entry = TransactionPackage::new(
                pkg,
                TransactionItemAction::Replaced,
                self.state.get_installed_reason(&pkg.na()),
            );
            for new in by {
                entry.add_replaced_by(*new);
            }
            entries.push(entry);
        }
        for &id in &solution.removes {
            let reason = match solution.reason(id) {
                TransactionItemReason::Unknown => {
                    self.state.get_installed_reason(&self.sack.package(id).na())
                }
                reason => reason,
            };
            entries.push(TransactionPackage::new(
                self.sack.package(id),
                TransactionItemAction::Remove,
                reason,
            ));
        }

        let moved: BTreeSet<PackageId> = entries.iter().map(|e| e.package_id()).collect();
        for (id, reason, group_id) in &self.reason_changes {
            if moved.contains(id) {
                continue;
            }
            let mut entry = TransactionPackage::new(
                self.sack.package(*id),
                TransactionItemAction::ReasonChange,
                *reason,
            );
            entry.set_reason_change_group_id(group_id.clone());
            entries.push(entry);
        }

        for entry in &mut entries {
            self.apply_override(entry);
        }

        let ordered = self.order(entries);
        debug!("Assembled {} transaction entries", ordered.len());
        ordered
    }

    /// Strongest of the stored reason for the name.arch and the installed
    /// reasons of the packages being replaced
    fn inbound_reason(&self, solution: &Solution, id: PackageId) -> TransactionItemReason {
        let pkg = self.sack.package(id);
        solution
            .replaces(id)
            .into_iter()
            .map(|old| self.state.get_installed_reason(&self.sack.package(old).na()))
            .fold(self.state.get_package_reason(&pkg.na()), TransactionItemReason::max)
    }

    fn entry(
        &self,
        id: PackageId,
        action: TransactionItemAction,
        reason: TransactionItemReason,
        solution: &Solution,
    ) -> TransactionPackage {
        let mut entry = TransactionPackage::new(self.sack.package(id), action, reason);
        for old in solution.replaces(id) {
            entry.add_replaces(old);
        }
        entry
    }

    fn apply_override(&self, entry: &mut TransactionPackage) {
        let Some(&reason) = self.overrides.get(&entry.full_nevra()) else {
            return;
        };
        match entry.action() {
            TransactionItemAction::Install | TransactionItemAction::Remove => entry.set_reason(reason),
            TransactionItemAction::ReasonChange => {}
            _ if reason > entry.reason() => entry.set_reason(reason),
            _ => {}
        }
    }

    fn order(&self, entries: Vec<TransactionPackage>) -> Vec<TransactionPackage> {
        let count = entries.len();

        // Rank of every entry in the tie-break order
        let mut by_key: Vec<usize> = (0..count).collect();
        by_key.sort_by(|&a, &b| {
            let (ea, eb) = (&entries[a], &entries[b]);
            (ea.name(), ea.arch(), ea.evr(), action_rank(ea.action()), a).cmp(&(
                eb.name(),
                eb.arch(),
                eb.evr(),
                action_rank(eb.action()),
                b,
            ))
        });
        let mut rank = vec![0; count];
        for (position, &index) in by_key.iter().enumerate() {
            rank[index] = position;
        }

        let edges = self.edges(&entries);
        let mut in_degree = vec![0usize; count];
        for targets in &edges {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..count)
            .filter(|&i| in_degree[i] == 0)
            .map(|i| rank[i])
            .collect();
        let mut done = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let position = match ready.pop_first() {
                Some(position) => position,
                None => {
                    // Cycle: force the smallest remaining entry
                    let Some(position) = (0..count).find(|&p| !done[by_key[p]]) else {
                        break;
                    };
                    debug!(
                        "Breaking ordering cycle at {}",
                        entries[by_key[position]].nevra()
                    );
                    position
                }
            };
            let index = by_key[position];
            if done[index] {
                continue;
            }
            done[index] = true;
            order.push(index);
            for &to in &edges[index] {
                in_degree[to] = in_degree[to].saturating_sub(1);
                if in_degree[to] == 0 && !done[to] {
                    ready.insert(rank[to]);
                }
            }
        }

        let mut slots: Vec<Option<TransactionPackage>> = entries.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect()
    }

    /// `edges[u]` lists the entries that must come after `u`
    fn edges(&self, entries: &[TransactionPackage]) -> Vec<Vec<usize>> {
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); entries.len()];
        let inbound: Vec<usize> = (0..entries.len())
            .filter(|&i| entries[i].action().is_inbound())
            .collect();
        let outbound: Vec<usize> = (0..entries.len())
            .filter(|&i| entries[i].action().is_outbound())
            .collect();

        for (group, provider_first) in [(&inbound, true), (&outbound, false)] {
            for &dependent in group {
                let requires = &self.sack.package(entries[dependent].package_id()).requires;
                for &provider in group {
                    if provider == dependent {
                        continue;
                    }
                    let pkg = self.sack.package(entries[provider].package_id());
                    if requires.iter().any(|dep| pkg.provides_dep(dep)) {
                        if provider_first {
                            edges[provider].insert(dependent);
                        } else {
                            edges[dependent].insert(provider);
                        }
                    }
                }
            }
        }

        for (replaced, entry) in entries.iter().enumerate() {
            if entry.action() != TransactionItemAction::Replaced {
                continue;
            }
            for by in entry.replaced_by() {
                if let Some(replacing) = entries.iter().position(|e| e.package_id() == *by) {
                    edges[replacing].insert(replaced);
                }
            }
        }

        edges.into_iter().map(|targets| targets.into_iter().collect()).collect()
    }
}

fn action_rank(action: TransactionItemAction) -> u8 {
    match action {
        TransactionItemAction::Install => 0,
        TransactionItemAction::Upgrade => 1,
        TransactionItemAction::Downgrade => 2,
        TransactionItemAction::Reinstall => 3,
        TransactionItemAction::ReasonChange => 4,
        TransactionItemAction::Replaced => 5,
        TransactionItemAction::Remove => 6,
        TransactionItemAction::Enable | TransactionItemAction::Disable | TransactionItemAction::Reset => 7,
    }
}
