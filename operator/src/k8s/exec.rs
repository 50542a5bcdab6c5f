use futures::AsyncReadExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, api::AttachParams};

use crate::core::{ExecOutcome, Executor};
use crate::core::recovery::PodDeleter;
use crate::util::Error;

/// Production [`Executor`]/[`PodDeleter`] implementation: execs into a
/// pod's application container via `kube::Api<Pod>::exec`, the same way
/// the original implementation shelled out with `ContainerName: "rss"`
/// through `ExecWithOptions`, and deletes pods outright for the recovery
/// sweep's escalation path.
pub struct PodOrchestrationClient {
    client: Client,
}

impl PodOrchestrationClient {
    pub fn new(client: Client) -> Self {
        PodOrchestrationClient { client }
    }
}

#[async_trait::async_trait]
impl Executor for PodOrchestrationClient {
    async fn exec(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        args: &[String],
    ) -> Result<ExecOutcome, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let attach_params = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);

        // The exit code isn't reported on the attached process object
        // directly; we smuggle it out by appending `; echo RC:$?` to the
        // requested argv and parsing it back out of stdout.
        let mut wrapped = vec!["sh".to_string(), "-c".to_string()];
        let quoted = shell_join(args);
        wrapped.push(format!("{quoted}; echo \"__rc:$?\""));

        let mut process = api
            .exec(pod_name, wrapped, &attach_params)
            .await
            .map_err(|e| Error::Exec {
                member: pod_name.to_string(),
                reason: e.to_string(),
            })?;

        let mut stdout = String::new();
        if let Some(mut out) = process.stdout() {
            let _ = out.read_to_string(&mut stdout).await;
        }
        let mut stderr = String::new();
        if let Some(mut err) = process.stderr() {
            let _ = err.read_to_string(&mut stderr).await;
        }
        process.join().await.map_err(|e| Error::Exec {
            member: pod_name.to_string(),
            reason: e.to_string(),
        })?;

        let (stdout, rc) = split_rc(&stdout);
        Ok(ExecOutcome {
            stdout,
            stderr,
            rc,
        })
    }
}

#[async_trait::async_trait]
impl PodDeleter for PodOrchestrationClient {
    async fn delete_pod(&self, namespace: &str, pod_name: &str) -> Result<(), Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(pod_name, &Default::default()).await?;
        Ok(())
    }
}

/// Wraps an [`Executor`] so every call is bounded by a deadline, per the
/// per-tick timeout model in the concurrency section: a hung exec must
/// not hang the whole reconciliation tick.
pub struct TimeoutExecutor<E> {
    inner: E,
    deadline: std::time::Duration,
}

impl<E> TimeoutExecutor<E> {
    pub fn new(inner: E, deadline: std::time::Duration) -> Self {
        TimeoutExecutor { inner, deadline }
    }
}

#[async_trait::async_trait]
impl<E: Executor> Executor for TimeoutExecutor<E> {
    async fn exec(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        args: &[String],
    ) -> Result<ExecOutcome, Error> {
        match tokio::time::timeout(self.deadline, self.inner.exec(namespace, pod_name, container, args)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Exec {
                member: pod_name.to_string(),
                reason: format!("exec timed out after {:?}", self.deadline),
            }),
        }
    }
}

#[async_trait::async_trait]
impl<E: PodDeleter> PodDeleter for TimeoutExecutor<E> {
    async fn delete_pod(&self, namespace: &str, pod_name: &str) -> Result<(), Error> {
        self.inner.delete_pod(namespace, pod_name).await
    }
}

fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("'{}'", a.replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_rc(combined: &str) -> (String, i32) {
    match combined.rsplit_once("__rc:") {
        Some((stdout, rc)) => (
            stdout.trim_end().to_string(),
            rc.trim().parse().unwrap_or(-1),
        ),
        None => (combined.to_string(), -1),
    }
}
