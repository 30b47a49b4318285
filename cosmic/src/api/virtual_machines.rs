//! Virtual machine API, including NICs and secondary IP addresses

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{bool_or_string, ApiParams, Tag};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub displayname: String,
    pub serviceofferingid: String,
    pub serviceofferingname: String,
    pub templateid: String,
    pub templatename: String,
    pub zoneid: String,
    pub zonename: String,
    pub group: String,
    pub keypair: String,
    pub project: String,
    pub projectid: String,
    pub state: String,
    pub nic: Vec<Nic>,
    pub affinitygroup: Vec<EntityRef>,
    pub securitygroup: Vec<EntityRef>,
    pub tags: Vec<Tag>,
}

impl VirtualMachine {
    pub fn default_nic(&self) -> Option<&Nic> {
        self.nic.iter().find(|n| n.isdefault)
    }
}

/// `{id, name}` pair nested in other entities
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Nic {
    pub id: String,
    pub networkid: String,
    pub ipaddress: String,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isdefault: bool,
    pub virtualmachineid: String,
    pub secondaryip: Vec<NicSecondaryIp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NicSecondaryIp {
    pub id: String,
    pub ipaddress: String,
    pub nicid: String,
    pub virtualmachineid: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployVirtualMachineRequest {
    pub serviceofferingid: String,
    pub templateid: String,
    pub zoneid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rootdisksize: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affinitygroupids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affinitygroupnames: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub securitygroupids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub securitygroupnames: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypair: Option<String>,
    /// Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVirtualMachineRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

pub struct VirtualMachinesApi<'a> {
    client: &'a Client,
}

impl<'a> VirtualMachinesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<VirtualMachine>, ApiError> {
        self.client
            .get_by_id(
                "listVirtualMachines",
                "virtualmachine",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn deploy(
        &self,
        ctx: &Context,
        request: &DeployVirtualMachineRequest,
    ) -> Result<VirtualMachine, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "deployVirtualMachine",
                ApiParams::from_request(request)?,
                "virtualmachine",
            )
            .await
    }

    /// updateVirtualMachine is synchronous
    pub async fn update(&self, request: &UpdateVirtualMachineRequest) -> Result<(), ApiError> {
        self.client
            .request("updateVirtualMachine", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    pub async fn stop(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "stopVirtualMachine", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn start(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "startVirtualMachine", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    /// The machine must be stopped
    pub async fn change_service_offering(
        &self,
        id: &str,
        service_offering_id: &str,
    ) -> Result<(), ApiError> {
        self.client
            .request(
                "changeServiceForVirtualMachine",
                ApiParams::new()
                    .add("id", id)
                    .add("serviceofferingid", service_offering_id),
            )
            .await
            .map(|_| ())
    }

    /// The machine must be stopped
    pub async fn reset_ssh_key(
        &self,
        ctx: &Context,
        id: &str,
        keypair: &str,
        project_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let params = ApiParams::new()
            .add("id", id)
            .add("keypair", keypair)
            .add_optional("projectid", project_id);

        self.client
            .request_async(ctx, "resetSSHKeyForVirtualMachine", params)
            .await
            .map(|_| ())
    }

    /// The machine must be stopped
    pub async fn update_affinity_groups(
        &self,
        ctx: &Context,
        id: &str,
        group_ids: &[String],
        group_names: &[String],
    ) -> Result<(), ApiError> {
        let mut params = ApiParams::new().add("id", id);
        if !group_ids.is_empty() {
            params = params.add("affinitygroupids", group_ids.join(","));
        }
        if !group_names.is_empty() {
            params = params.add("affinitygroupnames", group_names.join(","));
        }

        self.client
            .request_async(ctx, "updateVMAffinityGroup", params)
            .await
            .map(|_| ())
    }

    pub async fn destroy(&self, ctx: &Context, id: &str, expunge: bool) -> Result<(), ApiError> {
        let params = ApiParams::new().add("id", id).add("expunge", expunge);

        self.client
            .request_async(ctx, "destroyVirtualMachine", params)
            .await
            .map(|_| ())
    }

    /// Returns the machine with its new NIC list
    pub async fn add_nic(
        &self,
        ctx: &Context,
        virtual_machine_id: &str,
        network_id: &str,
        ip_address: Option<&str>,
    ) -> Result<VirtualMachine, ApiError> {
        let params = ApiParams::new()
            .add("virtualmachineid", virtual_machine_id)
            .add("networkid", network_id)
            .add_optional("ipaddress", ip_address);

        self.client
            .request_async_entity(ctx, "addNicToVirtualMachine", params, "virtualmachine")
            .await
    }

    pub async fn remove_nic(
        &self,
        ctx: &Context,
        virtual_machine_id: &str,
        nic_id: &str,
    ) -> Result<(), ApiError> {
        let params = ApiParams::new()
            .add("virtualmachineid", virtual_machine_id)
            .add("nicid", nic_id);

        self.client
            .request_async(ctx, "removeNicFromVirtualMachine", params)
            .await
            .map(|_| ())
    }

    pub async fn list_nics(
        &self,
        virtual_machine_id: &str,
        network_id: Option<&str>,
    ) -> Result<Vec<Nic>, ApiError> {
        self.client
            .list(
                "listNics",
                "nic",
                ApiParams::new()
                    .add("virtualmachineid", virtual_machine_id)
                    .add_optional("networkid", network_id),
            )
            .await
    }

    /// Without an address the control plane picks a free one
    pub async fn add_ip_to_nic(
        &self,
        ctx: &Context,
        nic_id: &str,
        ip_address: Option<&str>,
    ) -> Result<NicSecondaryIp, ApiError> {
        let params = ApiParams::new()
            .add("nicid", nic_id)
            .add_optional("ipaddress", ip_address);

        self.client
            .request_async_entity(ctx, "addIpToNic", params, "nicsecondaryip")
            .await
    }

    pub async fn remove_ip_from_nic(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "removeIpFromNic", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}
