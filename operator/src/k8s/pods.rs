use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, ResourceExt, api::ListParams};

use crate::core::PodRef;
use crate::util::Error;
use rss_common::annotations;

/// Lists the pods belonging to a tracked cluster, keyed by the
/// `CLUSTER_LABEL` annotation convention shared with the rest of the
/// operator's owned resources.
pub async fn list_members(client: Client, namespace: &str, cluster_name: &str) -> Result<Vec<PodRef>, Error> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let selector = format!("{}={}", annotations::CLUSTER_LABEL, cluster_name);
    let pods = api.list(&ListParams::default().labels(&selector)).await?;
    Ok(pods
        .into_iter()
        .map(|pod| PodRef {
            name: pod.name_any(),
            namespace: pod.namespace().unwrap_or_else(|| namespace.to_string()),
        })
        .collect())
}
