/// Result of classifying an exec probe's return code, per the rc contract
/// in §4.5. Replaces the ad-hoc `match rc { ... }` the original reconciler
/// inlines at each call site with a single pure function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// rc 0, secondary command configured: application is up as a secondary.
    SecondaryRunning,
    /// rc 7: application process is not running.
    Stopped,
    /// rc 8, or rc 0 with no secondary command configured (single-role
    /// remap): application is up as the primary.
    PrimaryRunning,
    /// Any other rc: treated as a probe failure, carrying the raw code.
    Failure(i32),
}

/// Classifies a status-probe return code.
///
/// `secondary_configured` is whether the cluster's command map defines a
/// `SecondaryCommand`. When it doesn't, a single-role application has no
/// way to report "secondary", so rc 0 is remapped to
/// [`ProbeOutcome::PrimaryRunning`] instead of
/// [`ProbeOutcome::SecondaryRunning`].
pub fn classify(rc: i32, secondary_configured: bool) -> ProbeOutcome {
    match rc {
        0 if secondary_configured => ProbeOutcome::SecondaryRunning,
        0 => ProbeOutcome::PrimaryRunning,
        7 => ProbeOutcome::Stopped,
        8 => ProbeOutcome::PrimaryRunning,
        other => ProbeOutcome::Failure(other),
    }
}
