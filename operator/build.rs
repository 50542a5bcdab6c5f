use kube::CustomResourceExt;
use rss_types::*;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/rss.clusterlabs.io_rssclusters_crd.yaml",
        serde_yaml::to_string(&RssCluster::crd()).unwrap(),
    )
    .unwrap();
}
