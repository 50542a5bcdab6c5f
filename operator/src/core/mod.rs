pub mod exec;
pub mod member;
pub mod members;
pub mod probe;
pub mod reconcile;
pub mod recovery;
pub mod replicate;

pub use exec::{ExecOutcome, Executor};
pub use member::Member;
pub use members::{MemberSet, PodRef};
pub use probe::{classify, ProbeOutcome};
pub use reconcile::{tick, ClusterState, TickReport};
pub use recovery::PodDeleter;
