//! Snapshot reconciliation between refresh cycles.

use crate::models::cluster::Group;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Same groups and pods; consumers keep their current view.
    Unchanged,
    /// Structure differs; consumers rebuild.
    Changed,
}

/// Compare a freshly built group list with the previous one. On a change,
/// `collapsed` is carried over by position for the overlapping prefix.
/// Position is the only identity used, so a reorder can hand a flag to a
/// different group.
pub fn reconcile(previous: &[Group], next: &mut [Group]) -> Reconciliation {
    if *previous == *next {
        return Reconciliation::Unchanged;
    }

    for (new, old) in next.iter_mut().zip(previous) {
        new.collapsed = old.collapsed;
    }
    Reconciliation::Changed
}
