use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

use crate::util::Error;

/// Certificate material pulled from a TLS secret: cert, key and CA bundle.
/// Mirrors `TLSData` from the original `GetTLSDataFromSecret`.
#[derive(Clone, Debug, Default)]
pub struct TlsData {
    pub cert_data: Vec<u8>,
    pub key_data: Vec<u8>,
    pub ca_data: Vec<u8>,
}

const CERT_FILE: &str = "tls.crt";
const KEY_FILE: &str = "tls.key";
const CA_FILE: &str = "ca.crt";

/// Loads a cluster's peer/client certificate material from the named
/// secret, direct translation of `GetTLSDataFromSecret`.
pub async fn load(client: Client, namespace: &str, secret_name: &str) -> Result<TlsData, Error> {
    let api: Api<Secret> = Api::namespaced(client, namespace);
    let secret = api.get(secret_name).await?;
    let data = secret.data.unwrap_or_default();
    Ok(TlsData {
        cert_data: data.get(CERT_FILE).map(|b| b.0.clone()).unwrap_or_default(),
        key_data: data.get(KEY_FILE).map(|b| b.0.clone()).unwrap_or_default(),
        ca_data: data.get(CA_FILE).map(|b| b.0.clone()).unwrap_or_default(),
    })
}
