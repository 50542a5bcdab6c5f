pub mod exec;
pub mod pods;
pub mod status;
pub mod tls;
pub mod watch;

pub use exec::{PodOrchestrationClient, TimeoutExecutor};
