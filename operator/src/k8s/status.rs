use kube::Client;
use rss_types::RssCluster;

use crate::core::reconcile::TickReport;
use crate::util::Error;
use crate::util::patch::patch_status;

/// Writes a tick's outcome back onto the custom resource's status
/// subresource: `Replicas = |peers|`, the computed condition, and a
/// joined message when the tick collected errors.
pub async fn write_status(client: Client, instance: &RssCluster, report: &TickReport) -> Result<RssCluster, Error> {
    let message = if report.errors.is_empty() {
        None
    } else {
        Some(report.errors.join("; "))
    };
    patch_status(client, instance, |status| {
        status.replicas = report.replicas;
        status.condition = report.condition.clone();
        status.message = message;
    })
    .await
    .map_err(Error::from)
}
