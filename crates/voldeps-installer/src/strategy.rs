use crate::{DependencyDelta, InstallStrategy, StagedReason};

/// Picks how a requested dependency set reaches the live directory.
///
/// Removals always rebuild in staging because installed files are not
/// tracked per package. Additions and upgrades are applied in place.
pub fn select_strategy(force: bool, delta: &DependencyDelta, live_exists: bool) -> InstallStrategy {
    if force {
        return InstallStrategy::Staged {
            reason: StagedReason::Forced,
        };
    }
    if !live_exists {
        return InstallStrategy::Staged {
            reason: StagedReason::FirstInstall,
        };
    }
    if !delta.removed.is_empty() {
        return InstallStrategy::Staged {
            reason: StagedReason::Removals,
        };
    }

    let packages = delta.to_apply();
    if packages.is_empty() {
        InstallStrategy::NoOp
    } else {
        InstallStrategy::Incremental { packages }
    }
}
