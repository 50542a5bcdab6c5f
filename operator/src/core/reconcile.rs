use owo_colors::OwoColorize;
use rss_types::{ClusterCondition, CommandKey, RssClusterSpec};

use crate::core::exec::Executor;
use crate::core::members::{MemberSet, PodRef};
use crate::core::probe::{classify, ProbeOutcome};
use crate::core::recovery::{self, PodDeleter};
use crate::core::replicate;
use crate::util::Error;

/// Everything the tick needs to persist between invocations for one
/// tracked cluster: the peer set and the last observed spec (used only to
/// size the per-cluster command map and bound computation).
#[derive(Clone, Debug, Default)]
pub struct ClusterState {
    pub members: MemberSet,
}

/// Result of a single tick, handed to the status write-back collaborator.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub replicas: u32,
    pub condition: ClusterCondition,
    pub errors: Vec<String>,
}

/// §4.4: runs one reconciliation tick for a cluster.
///
/// `pods` is the freshly observed pod list; `executor` runs lifecycle
/// commands; `deleter` removes condemned pods. All steps after the probe
/// pass are best-effort: failures are collected into the report rather
/// than aborting the tick, so a single broken peer never blocks recovery
/// or replication on the others.
pub async fn tick(
    state: &mut ClusterState,
    namespace: &str,
    pods: &[PodRef],
    spec: &RssClusterSpec,
    executor: &dyn Executor,
    deleter: &dyn PodDeleter,
) -> TickReport {
    let mut errors: Vec<String> = Vec::new();
    let mut lost_quorum: Option<String> = None;

    let running = MemberSet::from_observed_pods(pods);
    state.members = match state.members.reconcile(&running, spec.num_replicas) {
        Ok(merged) => merged,
        Err(e) => {
            return TickReport {
                replicas: state.members.len() as u32,
                condition: ClusterCondition::FatalShape { reason: e.to_string() },
                errors: vec![e.to_string()],
            };
        }
    };

    for m in state.members.iter_mut() {
        m.secure_peer = spec.tls.secure_peer;
        m.secure_client = spec.tls.secure_client;
    }

    let secondary_configured = spec.pod.commands.contains_key(&CommandKey::SecondaryCommand);
    let status_command = spec.pod.commands.get(&CommandKey::StatusCommand).cloned();
    let container = &spec.pod.container_name;

    if let Some(status_command) = status_command {
        let names: Vec<String> = state
            .members
            .iter()
            .filter(|m| m.online && !m.app_failed)
            .map(|m| m.name.clone())
            .collect();
        for name in names {
            match executor.exec(namespace, &name, container, &status_command).await {
                Ok(exec_outcome) => {
                    let m = state.members.get_mut(&name).expect("probed member is known");
                    let before = (m.app_running, m.app_primary, m.app_failed);
                    let outcome = classify(exec_outcome.rc, secondary_configured);
                    apply_probe_outcome(m, outcome);
                    log_transition(&name, before, m, &outcome);
                    if let ProbeOutcome::Failure(rc) = outcome {
                        eprintln!(
                            "{}",
                            format!(
                                "{namespace}/{name} status probe rc={rc} stdout={:?} stderr={:?}",
                                exec_outcome.stdout, exec_outcome.stderr,
                            )
                            .red()
                        );
                    }
                }
                Err(e) => {
                    if matches!(e, Error::LostQuorum) {
                        lost_quorum = Some(format!("{name} reported lost quorum during status probe"));
                    }
                    eprintln!("{}", format!("status probe on {namespace}/{name} failed: {e}").red());
                    errors.push(e.to_string());
                }
            }
        }
    } else {
        errors.push(
            Error::MissingCommand {
                key: CommandKey::StatusCommand,
            }
            .to_string(),
        );
    }

    if let Some(stop_command) = spec.pod.commands.get(&CommandKey::StopCommand) {
        let (_actions, recovery_errors) = recovery::sweep(
            &mut state.members,
            namespace,
            deleter,
            executor,
            stop_command,
            container,
        )
        .await;
        for e in &recovery_errors {
            if matches!(e, Error::LostQuorum) {
                lost_quorum = Some("recovery sweep observed lost quorum".to_string());
            }
            eprintln!("{}", format!("recovery sweep error in {namespace}: {e}").red());
        }
        errors.extend(recovery_errors.iter().map(|e| e.to_string()));
    }

    if let Some(reason) = &lost_quorum {
        errors.push(format!("replication skipped, lost quorum is active: {reason}"));
    } else {
        let bound = spec.primary_bound();
        let service_name = spec.service_name(namespace);
        if let Err(e) = replicate::replicate(
            &mut state.members,
            namespace,
            executor,
            &spec.pod.commands,
            &service_name,
            container,
            bound,
            spec.num_replicas,
        )
        .await
        {
            if matches!(e, Error::LostQuorum) {
                lost_quorum = Some(e.to_string());
            }
            eprintln!("{}", format!("replication driver failed in {namespace}: {e}").red());
            errors.push(e.to_string());
        }
    }

    let active = state.members.active_count();
    let condition = if let Some(reason) = lost_quorum {
        ClusterCondition::FatalShape { reason }
    } else if active > spec.num_replicas {
        ClusterCondition::ScalingDown {
            from: active,
            to: spec.num_replicas,
        }
    } else if active < spec.num_replicas {
        ClusterCondition::ScalingUp {
            from: active,
            to: spec.num_replicas,
        }
    } else if !errors.is_empty() {
        ClusterCondition::Recovering
    } else {
        ClusterCondition::Ready
    };

    TickReport {
        replicas: state.members.len() as u32,
        condition,
        errors,
    }
}

/// §4.5: logs detection of a role change on a successful probe. Only
/// surfaces when the member's running/primary/failed flags actually moved;
/// a steady-state probe stays quiet.
fn log_transition(
    name: &str,
    before: (bool, bool, bool),
    member: &crate::core::member::Member,
    outcome: &ProbeOutcome,
) {
    let after = (member.app_running, member.app_primary, member.app_failed);
    if before == after {
        return;
    }
    if after.2 {
        eprintln!("{}", format!("{name}: detected failure ({outcome:?})").red());
    } else if after.1 && !before.1 {
        println!("{}", format!("{name}: detected promotion to primary").green());
    } else if before.1 && !after.1 {
        println!("{}", format!("{name}: detected demotion from primary").green());
    } else {
        println!("{name}: detected state change ({outcome:?})");
    }
}

fn apply_probe_outcome(member: &mut crate::core::member::Member, outcome: ProbeOutcome) {
    match outcome {
        ProbeOutcome::SecondaryRunning => {
            member.app_running = true;
            member.app_primary = false;
            member.app_failed = false;
        }
        ProbeOutcome::Stopped => {
            member.app_running = false;
            member.app_primary = false;
            member.app_failed = false;
        }
        ProbeOutcome::PrimaryRunning => {
            member.app_primary = true;
            member.app_running = true;
            member.app_failed = false;
        }
        ProbeOutcome::Failure(_) => {
            member.app_running = true;
            member.app_failed = true;
            member.app_primary = false;
            member.failures += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::ExecOutcome;
    use crate::core::member::Member;
    use std::collections::BTreeMap;

    #[test]
    fn probe_failure_increments_failures_and_escalates() {
        let mut m = Member::new("p0", "default");
        apply_probe_outcome(&mut m, ProbeOutcome::Failure(13));
        assert_eq!(m.failures, 1);
        assert!(m.app_failed);

        apply_probe_outcome(&mut m, ProbeOutcome::Failure(13));
        assert_eq!(m.failures, 2, "repeated failures must keep escalating the counter");
    }

    #[test]
    fn recovering_probe_outcome_does_not_reset_failures() {
        let mut m = Member::new("p0", "default");
        apply_probe_outcome(&mut m, ProbeOutcome::Failure(13));
        apply_probe_outcome(&mut m, ProbeOutcome::PrimaryRunning);
        assert_eq!(m.failures, 1, "failures is a monotonic history, only reset by recovery");
    }

    struct FakeExecutor;

    #[async_trait::async_trait]
    impl Executor for FakeExecutor {
        async fn exec(
            &self,
            _namespace: &str,
            _pod_name: &str,
            _container: &str,
            args: &[String],
        ) -> Result<ExecOutcome, Error> {
            if args.first().map(String::as_str) == Some("status") {
                Ok(ExecOutcome {
                    stdout: String::new(),
                    stderr: String::new(),
                    rc: 0,
                })
            } else {
                Ok(ExecOutcome {
                    stdout: "1".to_string(),
                    stderr: String::new(),
                    rc: 0,
                })
            }
        }
    }

    struct FakeDeleter;

    #[async_trait::async_trait]
    impl PodDeleter for FakeDeleter {
        async fn delete_pod(&self, _namespace: &str, _pod_name: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn spec() -> RssClusterSpec {
        let mut commands = BTreeMap::new();
        commands.insert(CommandKey::StatusCommand, vec!["status".into()]);
        commands.insert(CommandKey::StartPrimaryCommand, vec!["start-primary".into()]);
        commands.insert(CommandKey::StopCommand, vec!["stop".into()]);
        commands.insert(CommandKey::SequenceCommand, vec!["seq".into()]);
        RssClusterSpec {
            num_replicas: 1,
            max_primaries: 1,
            service_name: None,
            pod: rss_types::PodSpec {
                container_name: "rss".into(),
                commands,
            },
            tls: Default::default(),
        }
    }

    #[tokio::test]
    async fn single_pod_cluster_converges_to_ready() {
        let mut state = ClusterState::default();
        let pods = vec![PodRef {
            name: "rss-0".into(),
            namespace: "default".into(),
        }];
        let executor = FakeExecutor;
        let deleter = FakeDeleter;

        let report = tick(&mut state, "default", &pods, &spec(), &executor, &deleter).await;

        assert_eq!(report.replicas, 1);
        assert!(matches!(report.condition, ClusterCondition::Ready), "{:?}", report.condition);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn scaling_up_condition_when_fewer_pods_than_desired() {
        let mut state = ClusterState::default();
        let pods = vec![];
        let mut wide_spec = spec();
        wide_spec.num_replicas = 3;
        let executor = FakeExecutor;
        let deleter = FakeDeleter;

        let report = tick(&mut state, "default", &pods, &wide_spec, &executor, &deleter).await;

        assert!(matches!(report.condition, ClusterCondition::ScalingUp { .. }));
    }

    #[tokio::test]
    async fn members_inherit_tls_posture_from_the_spec() {
        let mut state = ClusterState::default();
        let pods = vec![PodRef {
            name: "rss-0".into(),
            namespace: "default".into(),
        }];
        let executor = FakeExecutor;
        let deleter = FakeDeleter;
        let mut tls_spec = spec();
        tls_spec.tls.secure_peer = true;
        tls_spec.tls.secure_client = true;

        tick(&mut state, "default", &pods, &tls_spec, &executor, &deleter).await;

        let m = state.members.get("rss-0").unwrap();
        assert!(m.secure_peer);
        assert!(m.secure_client);
    }

    struct LostQuorumExecutor;

    #[async_trait::async_trait]
    impl Executor for LostQuorumExecutor {
        async fn exec(
            &self,
            _namespace: &str,
            _pod_name: &str,
            _container: &str,
            args: &[String],
        ) -> Result<ExecOutcome, Error> {
            if args.first().map(String::as_str) == Some("status") {
                Err(Error::LostQuorum)
            } else {
                Ok(ExecOutcome {
                    stdout: "1".to_string(),
                    stderr: String::new(),
                    rc: 0,
                })
            }
        }
    }

    #[tokio::test]
    async fn lost_quorum_surfaces_as_fatal_shape_and_skips_replication() {
        let mut state = ClusterState::default();
        let pods = vec![PodRef {
            name: "rss-0".into(),
            namespace: "default".into(),
        }];
        let executor = LostQuorumExecutor;
        let deleter = FakeDeleter;

        let report = tick(&mut state, "default", &pods, &spec(), &executor, &deleter).await;

        assert!(matches!(report.condition, ClusterCondition::FatalShape { .. }), "{:?}", report.condition);
        let m = state.members.get("rss-0").unwrap();
        assert!(!m.app_primary, "replication must not run while quorum is lost");
    }
}
