use crate::core::exec::Executor;
use crate::core::members::MemberSet;
use crate::util::Error;

/// A single recovery action taken against a member, returned for logging
/// and for folding into the tick's error list when the action itself failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Member deleted after repeated failures, with a human-readable reason.
    Deleted { member: String, reason: String },
    /// Member stopped after its first observed failure.
    Stopped { member: String },
    /// Stop itself failed, so the member was deleted instead.
    StopFailedThenDeleted { member: String, reason: String },
}

/// Orchestration surface recovery needs beyond exec: deleting a pod
/// outright. Kept separate from [`Executor`] so in-core tests can stub
/// deletion without standing up a fake exec path.
#[async_trait::async_trait]
pub trait PodDeleter: Send + Sync {
    async fn delete_pod(&self, namespace: &str, pod_name: &str) -> Result<(), Error>;
}

/// §4.3: sweeps the peer set for broken members and repairs or removes
/// them. Never promotes or demotes — only removes broken state.
pub async fn sweep(
    members: &mut MemberSet,
    namespace: &str,
    deleter: &dyn PodDeleter,
    executor: &dyn Executor,
    stop_command: &[String],
    container: &str,
) -> (Vec<RecoveryAction>, Vec<Error>) {
    let mut actions = Vec::new();
    let mut errors = Vec::new();

    let names: Vec<String> = members.names().map(|s| s.to_string()).collect();
    for name in names {
        let (app_failed, failures, online) = {
            let m = members.get(&name).expect("member present during sweep");
            (m.app_failed, m.failures, m.online)
        };

        if app_failed && failures > 1 {
            let reason = format!("{name} deletion after {failures} failures");
            match deleter.delete_pod(namespace, &name).await {
                Ok(()) => {
                    if let Some(m) = members.get_mut(&name) {
                        m.offline();
                    }
                    actions.push(RecoveryAction::Deleted {
                        member: name,
                        reason,
                    });
                }
                Err(e) => errors.push(e),
            }
            continue;
        }

        if !online {
            continue;
        }

        if app_failed {
            match executor.exec(namespace, &name, container, stop_command).await {
                Ok(_) => {
                    if let Some(m) = members.get_mut(&name) {
                        m.app_primary = false;
                        m.app_running = false;
                        m.app_failed = false;
                    }
                    actions.push(RecoveryAction::Stopped { member: name });
                }
                Err(e) => {
                    let reason = format!("{name} stop failed: {e}");
                    match deleter.delete_pod(namespace, &name).await {
                        Ok(()) => {
                            if let Some(m) = members.get_mut(&name) {
                                m.offline();
                            }
                            actions.push(RecoveryAction::StopFailedThenDeleted {
                                member: name,
                                reason,
                            });
                        }
                        Err(delete_err) => {
                            errors.push(e);
                            errors.push(delete_err);
                        }
                    }
                }
            }
        }
    }

    (actions, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::ExecOutcome;
    use crate::core::member::Member;
    use std::sync::Mutex;

    struct FakeExecutor {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Executor for FakeExecutor {
        async fn exec(
            &self,
            _namespace: &str,
            _pod_name: &str,
            _container: &str,
            _args: &[String],
        ) -> Result<ExecOutcome, Error> {
            if self.fail {
                Err(Error::Exec {
                    member: "x".into(),
                    reason: "boom".into(),
                })
            } else {
                Ok(ExecOutcome::default())
            }
        }
    }

    struct FakeDeleter {
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl PodDeleter for FakeDeleter {
        async fn delete_pod(&self, _namespace: &str, pod_name: &str) -> Result<(), Error> {
            self.deleted.lock().unwrap().push(pod_name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn escalated_failure_deletes_the_pod() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("p0", "default");
        m0.online = true;
        m0.app_failed = true;
        m0.failures = 2;
        members.add(m0);

        let deleter = FakeDeleter {
            deleted: Mutex::new(Vec::new()),
        };
        let executor = FakeExecutor { fail: false };
        let (actions, errors) =
            sweep(&mut members, "default", &deleter, &executor, &["stop".into()], "rss").await;

        assert!(errors.is_empty());
        assert_eq!(deleter.deleted.lock().unwrap().as_slice(), &["p0".to_string()]);
        assert!(matches!(actions[0], RecoveryAction::Deleted { .. }));
        assert!(!members.get("p0").unwrap().online);
    }

    #[tokio::test]
    async fn offline_member_is_skipped() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("p0", "default");
        m0.online = false;
        m0.app_failed = true;
        members.add(m0);

        let deleter = FakeDeleter {
            deleted: Mutex::new(Vec::new()),
        };
        let executor = FakeExecutor { fail: false };
        let (actions, errors) =
            sweep(&mut members, "default", &deleter, &executor, &["stop".into()], "rss").await;

        assert!(actions.is_empty());
        assert!(errors.is_empty());
        assert!(deleter.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_failure_attempts_stop() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("p0", "default");
        m0.online = true;
        m0.app_failed = true;
        m0.failures = 1;
        members.add(m0);

        let deleter = FakeDeleter {
            deleted: Mutex::new(Vec::new()),
        };
        let executor = FakeExecutor { fail: false };
        let (actions, errors) =
            sweep(&mut members, "default", &deleter, &executor, &["stop".into()], "rss").await;

        assert!(errors.is_empty());
        assert!(matches!(actions[0], RecoveryAction::Stopped { .. }));
        assert!(deleter.deleted.lock().unwrap().is_empty());

        let m0 = members.get("p0").unwrap();
        assert!(!m0.app_failed, "a successful stop must clear app_failed so the member can rejoin");
        assert!(!m0.app_running);
        assert!(!m0.app_primary);
    }

    #[tokio::test]
    async fn failed_stop_falls_back_to_delete() {
        let mut members = MemberSet::new();
        let mut m0 = Member::new("p0", "default");
        m0.online = true;
        m0.app_failed = true;
        m0.failures = 1;
        members.add(m0);

        let deleter = FakeDeleter {
            deleted: Mutex::new(Vec::new()),
        };
        let executor = FakeExecutor { fail: true };
        let (actions, errors) =
            sweep(&mut members, "default", &deleter, &executor, &["stop".into()], "rss").await;

        assert!(errors.is_empty());
        assert_eq!(deleter.deleted.lock().unwrap().as_slice(), &["p0".to_string()]);
        assert!(matches!(actions[0], RecoveryAction::StopFailedThenDeleted { .. }));
    }
}
