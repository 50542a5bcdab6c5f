/// One application instance bound to a pod. Mutated only by the
/// reconciliation loop ([`crate::core::reconcile`]) and the replication
/// driver ([`crate::core::replicate`]); owned exclusively by the
/// [`crate::core::members::MemberSet`] that holds it, never aliased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub namespace: String,
    /// Pod exists and is reachable for exec.
    pub online: bool,
    /// Status probe reports the application is up.
    pub app_running: bool,
    /// Status probe reports primary role.
    pub app_primary: bool,
    /// A probe or lifecycle command reported a fatal condition.
    pub app_failed: bool,
    /// Monotonic counter of lifecycle-command failures.
    pub failures: u32,
    /// Application-reported sequence number, used for seed election.
    pub seq: u64,
    pub secure_peer: bool,
    pub secure_client: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Member {
            name: name.into(),
            namespace: namespace.into(),
            online: false,
            app_running: false,
            app_primary: false,
            app_failed: false,
            failures: 0,
            seq: 0,
            secure_peer: false,
            secure_client: false,
        }
    }

    /// True when Online ∧ ¬AppFailed.
    pub fn is_active(&self) -> bool {
        self.online && !self.app_failed
    }

    /// True when AppRunning ∧ ¬AppFailed.
    pub fn is_app_member(&self) -> bool {
        self.app_running && !self.app_failed
    }

    /// True when AppPrimary ∧ ¬AppFailed.
    pub fn is_app_primary(&self) -> bool {
        self.app_primary && !self.app_failed
    }

    /// Marks the pod deleted: offline, and no longer a primary.
    pub fn offline(&mut self) {
        self.online = false;
        self.app_primary = false;
    }
}
