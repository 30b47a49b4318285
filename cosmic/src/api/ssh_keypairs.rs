//! SSH key pair API

use serde::Deserialize;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SshKeyPair {
    pub name: String,
    pub fingerprint: String,
    /// Only returned by createSSHKeyPair
    pub privatekey: String,
}

pub struct SshKeyPairsApi<'a> {
    client: &'a Client,
}

impl<'a> SshKeyPairsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Key pairs are identified by name
    pub async fn get(
        &self,
        name: &str,
        project_id: Option<&str>,
    ) -> Result<Option<SshKeyPair>, ApiError> {
        let mut pairs: Vec<SshKeyPair> = self
            .client
            .list(
                "listSSHKeyPairs",
                "sshkeypair",
                ApiParams::new()
                    .add("name", name)
                    .add_optional("projectid", project_id),
            )
            .await?;

        Ok(pairs
            .iter()
            .position(|p| p.name == name)
            .map(|i| pairs.swap_remove(i)))
    }

    /// Registers an existing public key
    pub async fn register(
        &self,
        name: &str,
        public_key: &str,
        project_id: Option<&str>,
    ) -> Result<SshKeyPair, ApiError> {
        let params = ApiParams::new()
            .add("name", name)
            .add("publickey", public_key)
            .add_optional("projectid", project_id);

        self.client
            .request_entity("registerSSHKeyPair", params, "keypair")
            .await
    }

    /// Lets the control plane generate the key; the private key is only returned here
    pub async fn create(&self, name: &str, project_id: Option<&str>) -> Result<SshKeyPair, ApiError> {
        let params = ApiParams::new()
            .add("name", name)
            .add_optional("projectid", project_id);

        self.client
            .request_entity("createSSHKeyPair", params, "keypair")
            .await
    }

    pub async fn delete(&self, name: &str, project_id: Option<&str>) -> Result<(), ApiError> {
        let params = ApiParams::new()
            .add("name", name)
            .add_optional("projectid", project_id);

        self.client
            .request("deleteSSHKeyPair", params)
            .await
            .map(|_| ())
    }
}
