use rss_types::CommandKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Parse duration: {source}")]
    ParseDuration {
        #[from]
        source: parse_duration::parse::Error,
    },

    /// Transient: the exec mechanism itself failed (pod unreachable,
    /// container missing). Never carries a return code — §4.2 forbids
    /// reading one when this variant is produced.
    #[error("exec into pod {member} failed: {reason}")]
    Exec { member: String, reason: String },

    /// Config error: the spec's command map has no entry for a command key
    /// that is required in the current context.
    #[error("no command configured for {key:?}")]
    MissingCommand { key: CommandKey },

    /// The reconciliation tick could not produce a consistent member set,
    /// e.g. a desired size of zero with live pods still present.
    #[error("cannot reconcile membership: {0}")]
    Reconcile(String),

    /// LifecycleFailure: a start/stop command returned non-zero or errored.
    /// Marks the member AppFailed and aborts the replication driver for the
    /// tick; recovery cleans up next tick.
    #[error("lifecycle command failed for {member}: {reason}")]
    LifecycleFailure { member: String, reason: String },

    #[error("no peers available")]
    NoPeersAvailable,

    #[error("no known peers")]
    NoKnownPeers,

    /// Fatal-shape: the managed application reported a lost quorum. No
    /// destructive action is taken while this condition is active.
    #[error("lost quorum")]
    LostQuorum,
}
