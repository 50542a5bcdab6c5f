use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_container_name() -> String {
    "rss".to_string()
}

fn default_max_primaries() -> u32 {
    1
}

/// The closed set of lifecycle commands the managed application must
/// support. Keys not in this set cannot appear in `Pod.Commands` — the CRD
/// schema enumerates exactly these.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, JsonSchema,
)]
pub enum CommandKey {
    /// Required. Reports the application's current role via return code.
    StatusCommand,
    /// Optional. Its absence puts the probe in single-role remap mode.
    SecondaryCommand,
    StartPrimaryCommand,
    StartSecondaryCommand,
    StartSeedCommand,
    StopCommand,
    SequenceCommand,
}

pub type CommandMap = BTreeMap<CommandKey, Vec<String>>;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PodSpec {
    /// Container within each replica pod that lifecycle commands are
    /// executed in. Defaults to "rss" for parity with the original
    /// implementation, which hard-coded this value.
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default)]
    pub commands: CommandMap,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct TlsSpec {
    pub secret_name: Option<String>,
    #[serde(default)]
    pub secure_peer: bool,
    #[serde(default)]
    pub secure_client: bool,
}

#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "rss.clusterlabs.io",
    version = "v1",
    kind = "RssCluster",
    plural = "rssclusters",
    derive = "PartialEq",
    status = "RssClusterStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.condition.type\", \"name\": \"CONDITION\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.replicas\", \"name\": \"REPLICAS\", \"type\": \"integer\" }"
)]
pub struct RssClusterSpec {
    /// Target cluster size.
    pub num_replicas: u32,
    /// Bound on the number of AppPrimary members. Values outside
    /// `[1, num_replicas]` are interpreted as "all members are primaries".
    #[serde(default = "default_max_primaries")]
    pub max_primaries: u32,
    /// Overrides the DNS suffix used when building the primary list passed
    /// to start commands. Defaults to `<cluster-name>` when unset, matching
    /// `ServiceName(name)` in the source contract.
    pub service_name: Option<String>,
    #[serde(default)]
    pub pod: PodSpec,
    #[serde(default)]
    pub tls: TlsSpec,
}

impl RssClusterSpec {
    /// `bound = clamp(MaxPrimaries, 1, NumReplicas)`; out-of-range values
    /// collapse to `NumReplicas` per §3/§4.6.
    pub fn primary_bound(&self) -> u32 {
        if self.max_primaries < 1 || self.max_primaries > self.num_replicas {
            self.num_replicas
        } else {
            self.max_primaries
        }
    }

    pub fn service_name(&self, cluster_name: &str) -> String {
        self.service_name
            .clone()
            .unwrap_or_else(|| cluster_name.to_string())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(tag = "type")]
pub enum ClusterCondition {
    Ready,
    Recovering,
    ScalingUp { from: u32, to: u32 },
    ScalingDown { from: u32, to: u32 },
    /// Surfaced when a fatal-shape error (e.g. lost quorum) is active;
    /// no destructive action is taken while this condition holds.
    FatalShape { reason: String },
}

impl Default for ClusterCondition {
    fn default() -> Self {
        ClusterCondition::Recovering
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct RssClusterStatus {
    pub replicas: u32,
    #[serde(default)]
    pub condition: ClusterCondition,
    pub message: Option<String>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<Time>,
}
