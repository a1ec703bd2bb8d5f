//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A dircl's joined appl must reference a registered appl.
///
/// §3 invariant: "a dircl joined to an appl must have `in_appl ==
/// appl.identifier`". A joined appl id that has no snapshot entry means the
/// controller forgot to register the appl, or joined the dircl to garbage.
pub struct JoinedApplExists;

impl Invariant for JoinedApplExists {
    fn name(&self) -> &'static str {
        "joined_appl_exists"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(appl_id) = client.joined_appl {
                if !state.appls.contains_key(&appl_id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: joined_appl {appl_id} has no registered appl",
                            client.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The dircl's and appl's views of membership must agree both ways.
///
/// If a client reports `joined_appl == Some(id)`, the appl's
/// `joined_clients` must contain that client, and vice versa — a divergence
/// means the controller updated one side of the join/unjoin pair without
/// the other.
pub struct MembershipConsistency;

impl Invariant for MembershipConsistency {
    fn name(&self) -> &'static str {
        "membership_consistency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(appl_id) = client.joined_appl {
                if let Some(appl) = state.appls.get(&appl_id) {
                    if !appl.joined_clients.contains(&client.id) {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "client {} thinks it joined appl {appl_id}, but appl's \
                                 joined_clients does not contain it",
                                client.id
                            ),
                        });
                    }
                }
            }
        }

        for (appl_id, appl) in &state.appls {
            for client_id in &appl.joined_clients {
                let client_agrees = state
                    .clients
                    .iter()
                    .any(|c| c.id == *client_id && c.joined_appl == Some(*appl_id));
                if !client_agrees {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "appl {appl_id} lists client {client_id} as joined, but that \
                             client disagrees or is unknown"
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Pending joins must drain exactly when bootstrap completes.
///
/// §4.5 "Runner lifecycle": sessions that join before bootstrap finishes
/// queue in `pending_joins`; once bootstrapped, that queue must be empty —
/// either because it was flushed, or because admission from then on is
/// immediate.
pub struct PendingJoinsDrainedOnBootstrap;

impl Invariant for PendingJoinsDrainedOnBootstrap {
    fn name(&self) -> &'static str {
        "pending_joins_drained_on_bootstrap"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (appl_id, appl) in &state.appls {
            if appl.bootstrapped && !appl.pending_joins.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "appl {appl_id} is bootstrapped but still has pending joins {:?}",
                        appl.pending_joins
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A client cannot be admitted (joined) to an appl whose runner never
/// bootstrapped.
///
/// §3 lifecycle: "RunnerStates created on autostart or first client join";
/// a join is only ever admitted once bootstrap completes, so any joined
/// client on a non-bootstrapped appl indicates admission happened too
/// early.
pub struct NoAdmissionBeforeBootstrap;

impl Invariant for NoAdmissionBeforeBootstrap {
    fn name(&self) -> &'static str {
        "no_admission_before_bootstrap"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (appl_id, appl) in &state.appls {
            if !appl.bootstrapped && !appl.joined_clients.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "appl {appl_id} has joined clients {:?} despite never bootstrapping",
                        appl.joined_clients
                    ),
                });
            }
        }
        Ok(())
    }
}

/// At most one runner exists per appl.
///
/// §3 invariant: "Exactly one `RunnerState` exists per appl at any time;
/// attempts to start a second are no-ops." The snapshot only has room for
/// one `runner_active` flag per appl id, so this invariant is really
/// checking that bootstrap never appears without an active runner.
pub struct BootstrapImpliesRunnerActive;

impl Invariant for BootstrapImpliesRunnerActive {
    fn name(&self) -> &'static str {
        "bootstrap_implies_runner_active"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (appl_id, appl) in &state.appls {
            if appl.bootstrapped && !appl.runner_active {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "appl {appl_id} reports bootstrapped but no active runner"
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::{ApplSnapshot, ClientSnapshot};

    #[test]
    fn joined_appl_exists_passes_when_registered() {
        let client = ClientSnapshot::new(1).with_joined_appl(Some(3));
        let mut snapshot = SystemSnapshot::single(client);
        snapshot.add_appl(3, ApplSnapshot::new().with_runner(true, true));
        assert!(JoinedApplExists.check(&snapshot).is_ok());
    }

    #[test]
    fn joined_appl_exists_fails_when_unregistered() {
        let client = ClientSnapshot::new(1).with_joined_appl(Some(9));
        let snapshot = SystemSnapshot::single(client);
        let result = JoinedApplExists.check(&snapshot);
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains('9'));
    }

    #[test]
    fn membership_consistency_passes_when_symmetric() {
        let client = ClientSnapshot::new(1).with_joined_appl(Some(3));
        let mut snapshot = SystemSnapshot::single(client);
        snapshot.add_appl(3, ApplSnapshot::new().with_runner(true, true).with_joined_clients([1]));
        assert!(MembershipConsistency.check(&snapshot).is_ok());
    }

    #[test]
    fn membership_consistency_fails_when_one_sided() {
        let client = ClientSnapshot::new(1).with_joined_appl(Some(3));
        let mut snapshot = SystemSnapshot::single(client);
        snapshot.add_appl(3, ApplSnapshot::new().with_runner(true, true));
        let result = MembershipConsistency.check(&snapshot);
        assert!(result.is_err());
    }

    #[test]
    fn pending_joins_drained_on_bootstrap_passes_when_empty() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.add_appl(0, ApplSnapshot::new().with_runner(true, true));
        assert!(PendingJoinsDrainedOnBootstrap.check(&snapshot).is_ok());
    }

    #[test]
    fn pending_joins_drained_on_bootstrap_fails_when_stale() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.add_appl(0, ApplSnapshot::new().with_runner(true, true).with_pending_joins([5]));
        let result = PendingJoinsDrainedOnBootstrap.check(&snapshot);
        assert!(result.is_err());
    }

    #[test]
    fn no_admission_before_bootstrap_fails_when_joined_early() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.add_appl(0, ApplSnapshot::new().with_runner(true, false).with_joined_clients([1]));
        let result = NoAdmissionBeforeBootstrap.check(&snapshot);
        assert!(result.is_err());
    }

    #[test]
    fn bootstrap_implies_runner_active_fails_when_runner_missing() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.add_appl(0, ApplSnapshot { runner_active: false, bootstrapped: true, ..Default::default() });
        let result = BootstrapImpliesRunnerActive.check(&snapshot);
        assert!(result.is_err());
    }
}
