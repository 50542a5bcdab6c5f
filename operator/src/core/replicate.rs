use rss_types::CommandKey;

use crate::core::exec::{self, Executor};
use crate::core::members::MemberSet;
use crate::util::Error;

/// Picks the best candidate to bring up as a new primary or secondary:
/// among members Online ∧ ¬AppFailed ∧ ¬AppPrimary, the one with the
/// highest SEQ, ties broken by lexicographically largest name.
///
/// The original implementation seeds `bestPeer` as `nil` and only updates
/// it via an `else if` chain that never fires on the first candidate
/// unless SEQ or name comparisons happen to favor it — in practice the
/// first iteration always falls into the `bestPeer == nil` arm, so this is
/// correct there. We keep the same two-pass shape but seed from the first
/// candidate directly, which is what that branch was doing anyway.
pub fn choose_seed(members: &MemberSet) -> Result<String, Error> {
    if members.is_empty() {
        return Err(Error::NoKnownPeers);
    }
    let mut best: Option<&str> = None;

    for m in members.iter() {
        if !m.online || m.app_failed || m.app_primary {
            continue;
        }
        best = match best {
            None => Some(&m.name),
            Some(current_best) => {
                let current = members.get(current_best).expect("best candidate is a known member");
                if m.seq > current.seq || (m.seq == current.seq && m.name.as_str() > current.name.as_str()) {
                    Some(&m.name)
                } else {
                    Some(current_best)
                }
            }
        };
    }

    best.map(|s| s.to_string()).ok_or(Error::NoPeersAvailable)
}

/// Picks the member currently acting as primary. An offline primary is
/// returned immediately — it must be dealt with before anything else can
/// proceed. Otherwise picks the lexicographically largest name among
/// AppPrimary ∧ ¬AppFailed members.
///
/// `bestPeer` starts `nil` in the original and is dereferenced in the
/// `else if` branch without ever having been assigned when the first
/// online primary is the only candidate, panicking with a nil pointer.
/// Here `best` is seeded from the first online-primary candidate so the
/// comparison below always has something to compare against.
pub fn choose_current_primary(members: &MemberSet) -> Result<String, Error> {
    if members.is_empty() {
        return Err(Error::NoKnownPeers);
    }
    let mut best: Option<&str> = None;

    for m in members.iter() {
        if !m.app_primary || m.app_failed {
            continue;
        }
        if !m.online {
            return Ok(m.name.clone());
        }
        best = match best {
            None => Some(&m.name),
            Some(current_best) => {
                if m.name.as_str() > current_best {
                    Some(&m.name)
                } else {
                    Some(current_best)
                }
            }
        };
    }

    best.map(|s| s.to_string()).ok_or(Error::NoPeersAvailable)
}

fn online_primary_names(members: &MemberSet) -> Vec<&str> {
    members
        .iter()
        .filter(|m| m.online && m.app_primary)
        .map(|m| m.name.as_str())
        .collect()
}

/// §4.7: refreshes SEQ for every peer by executing `SequenceCommand`.
/// Exec or parse failures are tolerated per-member and do not abort the
/// sweep; the member simply keeps its previous SEQ.
pub async fn detect_members(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    sequence_command: &[String],
    container: &str,
) {
    let names: Vec<String> = members.names().map(|s| s.to_string()).collect();
    for name in names {
        let outcome = executor.exec(namespace, &name, container, sequence_command).await;
        let Ok(outcome) = outcome else {
            continue;
        };
        let trimmed = outcome.stdout.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(seq) = trimmed.parse::<u64>() {
            if let Some(m) = members.get_mut(&name) {
                m.seq = seq;
            }
        }
    }
}

/// Starts or restarts a member as primary (`as_primary = true`) or
/// secondary, choosing the start command per §4.6's fallback rules and
/// appending one peer-discovery argument per currently-online primary.
async fn start_app_member(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    commands: &rss_types::CommandMap,
    service_name: &str,
    container: &str,
    name: &str,
    as_primary: bool,
) -> Result<(), Error> {
    let is_seeding = as_primary && members.primary_count() == 0;
    let base_command = if as_primary {
        if is_seeding {
            exec::resolve_seed_command(commands)?
        } else {
            exec::require_command(commands, CommandKey::StartPrimaryCommand)?
        }
    } else {
        exec::resolve_secondary_command(commands)?
    };

    let mut argv = base_command.clone();
    argv.extend(exec::peer_args(online_primary_names(members).into_iter(), service_name));

    let result = executor.exec(namespace, name, container, &argv).await;
    let m = members.get_mut(name).expect("starting member is a known member");
    match result {
        Ok(_) => {
            m.app_primary = as_primary;
            m.app_running = true;
            m.app_failed = false;
            Ok(())
        }
        Err(e) => {
            m.app_failed = true;
            m.failures += 1;
            Err(Error::LifecycleFailure {
                member: name.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

async fn stop_app_member(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    stop_command: &[String],
    container: &str,
    name: &str,
) -> Result<(), Error> {
    let result = executor.exec(namespace, name, container, stop_command).await;
    let m = members.get_mut(name).expect("stopping member is a known member");
    match result {
        Ok(_) => {
            m.app_primary = false;
            m.app_running = false;
            m.app_failed = false;
            Ok(())
        }
        Err(e) => {
            m.app_failed = true;
            m.failures += 1;
            Err(Error::LifecycleFailure {
                member: name.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

async fn start_primary(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    commands: &rss_types::CommandMap,
    service_name: &str,
    container: &str,
) -> Result<(), Error> {
    let seed = choose_seed(members)?;
    start_app_member(members, namespace, executor, commands, service_name, container, &seed, true).await
}

async fn start_member(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    commands: &rss_types::CommandMap,
    service_name: &str,
    container: &str,
) -> Result<(), Error> {
    let candidate = choose_seed(members)?;
    start_app_member(
        members,
        namespace,
        executor,
        commands,
        service_name,
        container,
        &candidate,
        false,
    )
    .await
}

async fn demote_primary(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    commands: &rss_types::CommandMap,
    service_name: &str,
    container: &str,
    stop_command: &[String],
) -> Result<(), Error> {
    let current = choose_current_primary(members)?;
    stop_app_member(members, namespace, executor, stop_command, container, &current).await?;
    start_app_member(
        members,
        namespace,
        executor,
        commands,
        service_name,
        container,
        &current,
        false,
    )
    .await
}

/// §4.6: drives the peer set towards `primaries == bound` and
/// `app_members == num_replicas`, stopping at the first failing step.
pub async fn replicate(
    members: &mut MemberSet,
    namespace: &str,
    executor: &dyn Executor,
    commands: &rss_types::CommandMap,
    service_name: &str,
    container: &str,
    bound: u32,
    num_replicas: u32,
) -> Result<(), Error> {
    if members.primary_count() == 0 {
        let sequence_command = exec::require_command(commands, CommandKey::SequenceCommand)?;
        detect_members(members, namespace, executor, sequence_command, container).await;
    }

    while members.primary_count() < bound {
        start_primary(members, namespace, executor, commands, service_name, container).await?;
    }

    let stop_command = exec::require_command(commands, CommandKey::StopCommand)?.clone();
    while members.primary_count() > bound {
        demote_primary(members, namespace, executor, commands, service_name, container, &stop_command).await?;
    }

    while members.app_member_count() < num_replicas {
        start_member(members, namespace, executor, commands, service_name, container).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::ExecOutcome;
    use crate::core::member::Member;
    use std::collections::BTreeMap;

    struct FakeExecutor;

    #[async_trait::async_trait]
    impl Executor for FakeExecutor {
        async fn exec(
            &self,
            _namespace: &str,
            _pod_name: &str,
            _container: &str,
            _args: &[String],
        ) -> Result<ExecOutcome, Error> {
            Ok(ExecOutcome {
                stdout: "5".to_string(),
                stderr: String::new(),
                rc: 0,
            })
        }
    }

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl Executor for FailingExecutor {
        async fn exec(
            &self,
            _namespace: &str,
            pod_name: &str,
            _container: &str,
            _args: &[String],
        ) -> Result<ExecOutcome, Error> {
            Err(Error::Exec {
                member: pod_name.to_string(),
                reason: "boom".into(),
            })
        }
    }

    fn commands() -> rss_types::CommandMap {
        let mut map = BTreeMap::new();
        map.insert(CommandKey::StartPrimaryCommand, vec!["start-primary".into()]);
        map.insert(CommandKey::StopCommand, vec!["stop".into()]);
        map.insert(CommandKey::SequenceCommand, vec!["seq".into()]);
        map
    }

    #[test]
    fn choose_seed_picks_highest_seq() {
        let mut members = MemberSet::new();
        let mut a = Member::new("a", "default");
        a.online = true;
        a.seq = 1;
        members.add(a);
        let mut b = Member::new("b", "default");
        b.online = true;
        b.seq = 9;
        members.add(b);

        assert_eq!(choose_seed(&members).unwrap(), "b");
    }

    #[test]
    fn choose_seed_breaks_ties_on_largest_name() {
        let mut members = MemberSet::new();
        let mut a = Member::new("rss-0", "default");
        a.online = true;
        a.seq = 4;
        members.add(a);
        let mut b = Member::new("rss-1", "default");
        b.online = true;
        b.seq = 4;
        members.add(b);

        assert_eq!(choose_seed(&members).unwrap(), "rss-1");
    }

    #[test]
    fn choose_seed_errors_on_empty_set() {
        let members = MemberSet::new();
        assert!(matches!(choose_seed(&members), Err(Error::NoKnownPeers)));
    }

    #[test]
    fn choose_seed_errors_when_no_eligible_candidate() {
        let mut members = MemberSet::new();
        let mut a = Member::new("a", "default");
        a.online = true;
        a.app_primary = true;
        members.add(a);
        assert!(matches!(choose_seed(&members), Err(Error::NoPeersAvailable)));
    }

    #[test]
    fn choose_current_primary_returns_offline_primary_immediately() {
        let mut members = MemberSet::new();
        let mut a = Member::new("rss-0", "default");
        a.app_primary = true;
        a.online = false;
        members.add(a);
        let mut b = Member::new("rss-1", "default");
        b.app_primary = true;
        b.online = true;
        members.add(b);

        assert_eq!(choose_current_primary(&members).unwrap(), "rss-0");
    }

    #[test]
    fn choose_current_primary_picks_largest_name_among_online() {
        let mut members = MemberSet::new();
        let mut a = Member::new("rss-0", "default");
        a.app_primary = true;
        a.online = true;
        members.add(a);
        let mut b = Member::new("rss-1", "default");
        b.app_primary = true;
        b.online = true;
        members.add(b);

        assert_eq!(choose_current_primary(&members).unwrap(), "rss-1");
    }

    #[test]
    fn choose_current_primary_handles_single_online_candidate_without_panicking() {
        let mut members = MemberSet::new();
        let mut a = Member::new("rss-0", "default");
        a.app_primary = true;
        a.online = true;
        members.add(a);

        assert_eq!(choose_current_primary(&members).unwrap(), "rss-0");
    }

    #[tokio::test]
    async fn replicate_seeds_a_primary_from_empty_set() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("rss-0", "default");
        m0.online = true;
        members.add(m0);
        let executor = FakeExecutor;
        let cmds = commands();

        replicate(&mut members, "default", &executor, &cmds, "rss-headless", "rss", 1, 1)
            .await
            .unwrap();

        let m = members.get("rss-0").unwrap();
        assert!(m.app_primary);
        assert!(m.app_running);
    }

    #[tokio::test]
    async fn failed_start_marks_the_member_failed_and_counts_it() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("rss-0", "default");
        m0.online = true;
        members.add(m0);
        let executor = FailingExecutor;
        let cmds = commands();

        let err = replicate(&mut members, "default", &executor, &cmds, "rss-headless", "rss", 1, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LifecycleFailure { .. }));

        let m = members.get("rss-0").unwrap();
        assert!(m.app_failed);
        assert_eq!(m.failures, 1, "a failed lifecycle command must count towards escalation");
    }
}
