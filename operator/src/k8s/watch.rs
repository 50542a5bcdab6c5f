use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kube::{Api, Client, ResourceExt, api::ListParams};
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use owo_colors::OwoColorize;
use rss_types::RssCluster;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::ClusterState;
use crate::core::reconcile::tick;
use crate::k8s::exec::{PodOrchestrationClient, TimeoutExecutor};
use crate::k8s::{pods, status};
use crate::util::colors::{FG1, FG2};
use crate::util::{Error, PROBE_INTERVAL};

/// One [`ClusterState`] per tracked cluster, keyed by `(namespace, name)`
/// and guarded independently so a slow tick on one cluster never blocks
/// another — mirroring the teacher's `last_action: Mutex<HashMap<...>>`,
/// except here the map holds live reconciliation state, not a log entry.
#[derive(Default)]
struct TrackedClusters {
    states: Mutex<HashMap<(String, String), Arc<Mutex<ClusterState>>>>,
}

impl TrackedClusters {
    async fn state_for(&self, namespace: &str, name: &str) -> Arc<Mutex<ClusterState>> {
        let mut states = self.states.lock().await;
        states
            .entry((namespace.to_string(), name.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(ClusterState::default())))
            .clone()
    }
}

/// Entrypoint for the `RssCluster` controller: leader-elected, polling
/// every [`PROBE_INTERVAL`], one tick per tracked cluster per iteration.
/// Adapted from the `LeaseLock` + `tokio::select!` loop in the teacher's
/// cluster controller, with `kube_runtime::Controller`'s reconcile
/// dispatch replaced by a direct poll-and-tick loop.
pub async fn run(client: Client) -> Result<(), Error> {
    println!("{}", "⚙️ Starting RssCluster controller...".green());

    let tracked = Arc::new(TrackedClusters::default());
    let orchestrator = Arc::new(TimeoutExecutor::new(
        PodOrchestrationClient::new(client.clone()),
        Duration::from_secs(20),
    ));

    let lease_namespace = std::env::var("NAMESPACE").unwrap_or_else(|_| "default".to_string());
    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("rss-operator-{}", uuid::Uuid::new_v4()));
    let lease_name = "rss-operator-lock".to_string();
    let lease_ttl = Duration::from_secs(15);
    let renew_every = Duration::from_secs(5);
    let leadership = LeaseLock::new(
        client.clone(),
        &lease_namespace,
        LeaseLockParams {
            holder_id,
            lease_name,
            lease_ttl,
        },
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        rss_common::shutdown::shutdown_signal().await;
        shutdown_signal.cancel();
    });
    rss_common::signal_ready();

    let mut interval = tokio::time::interval(renew_every);
    let mut is_leader = false;
    let mut ticks_since_probe = 0u32;
    let ticks_per_probe = (PROBE_INTERVAL.as_secs() / renew_every.as_secs()).max(1);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            _ = interval.tick() => {}
        }

        match leadership.try_acquire_or_renew().await {
            Ok(LeaseLockResult::Acquired(_)) => {
                if !is_leader {
                    println!("{}", "👑 Acquired leadership; starting RssCluster controller".green());
                }
                is_leader = true;
            }
            Ok(_) => {
                if is_leader {
                    eprintln!("lost leadership; pausing RssCluster controller");
                }
                is_leader = false;
            }
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                is_leader = false;
            }
        }

        if !is_leader {
            continue;
        }

        ticks_since_probe += 1;
        if ticks_since_probe < ticks_per_probe {
            continue;
        }
        ticks_since_probe = 0;

        if let Err(e) = run_one_pass(&client, &tracked, orchestrator.as_ref()).await {
            eprintln!("{}", format!("RssCluster pass failed: {e}").red());
        }
    }
}

async fn run_one_pass(
    client: &Client,
    tracked: &TrackedClusters,
    orchestrator: &TimeoutExecutor<PodOrchestrationClient>,
) -> Result<(), Error> {
    let api: Api<RssCluster> = Api::all(client.clone());
    let clusters = api.list(&ListParams::default()).await?;

    for instance in clusters {
        let Some(namespace) = instance.namespace() else {
            continue;
        };
        let name = instance.name_any();
        let spec = &instance.spec;

        let observed_pods = pods::list_members(client.clone(), &namespace, &name).await?;
        let state = tracked.state_for(&namespace, &name).await;
        let mut state = state.lock().await;

        let report = tick(
            &mut *state,
            &namespace,
            &observed_pods,
            spec,
            orchestrator,
            orchestrator,
        )
        .await;

        println!(
            "🔧 {}{}{}{}{:?}",
            namespace.color(FG2),
            "/".color(FG1),
            name.color(FG2),
            " CONDITION: ".color(FG1),
            report.condition,
        );

        if let Err(e) = status::write_status(client.clone(), &instance, &report).await {
            eprintln!("{}", format!("failed to write status for {namespace}/{name}: {e}").red());
        }
    }

    Ok(())
}
