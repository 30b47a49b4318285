//! Public IP address and static NAT API

use serde::Deserialize;
use tfplug::context::Context;

use super::client::Client;
use super::common::{bool_or_string, ApiParams};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublicIpAddress {
    pub id: String,
    pub ipaddress: String,
    pub associatednetworkid: String,
    pub vpcid: String,
    pub aclid: String,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isstaticnat: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub issourcenat: bool,
    pub virtualmachineid: String,
    pub vmipaddress: String,
    pub zoneid: String,
    pub project: String,
    pub projectid: String,
    pub state: String,
}

pub struct AddressesApi<'a> {
    client: &'a Client,
}

impl<'a> AddressesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<PublicIpAddress>, ApiError> {
        self.client
            .get_by_id(
                "listPublicIpAddresses",
                "publicipaddress",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    /// The VPC's source NAT address, when exactly one exists
    pub async fn source_nat(
        &self,
        vpc_id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<PublicIpAddress>, ApiError> {
        let mut addresses: Vec<PublicIpAddress> = self
            .client
            .list(
                "listPublicIpAddresses",
                "publicipaddress",
                ApiParams::new()
                    .add("vpcid", vpc_id)
                    .add("issourcenat", true)
                    .add_optional("projectid", project_id),
            )
            .await?;

        Ok(if addresses.len() == 1 {
            addresses.pop()
        } else {
            None
        })
    }

    /// associateIpAddress on either a network or a VPC
    pub async fn associate(
        &self,
        ctx: &Context,
        network_id: Option<&str>,
        vpc_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<PublicIpAddress, ApiError> {
        let params = ApiParams::new()
            .add_optional("networkid", network_id)
            .add_optional("vpcid", vpc_id)
            .add_optional("projectid", project_id);

        self.client
            .request_async_entity(ctx, "associateIpAddress", params, "ipaddress")
            .await
    }

    pub async fn disassociate(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "disassociateIpAddress", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    /// enableStaticNat is synchronous
    pub async fn enable_static_nat(
        &self,
        ip_address_id: &str,
        virtual_machine_id: &str,
        vm_guest_ip: Option<&str>,
        network_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let params = ApiParams::new()
            .add("ipaddressid", ip_address_id)
            .add("virtualmachineid", virtual_machine_id)
            .add_optional("vmguestip", vm_guest_ip)
            .add_optional("networkid", network_id);

        self.client
            .request("enableStaticNat", params)
            .await
            .map(|_| ())
    }

    pub async fn disable_static_nat(&self, ctx: &Context, ip_address_id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(
                ctx,
                "disableStaticNat",
                ApiParams::new().add("ipaddressid", ip_address_id),
            )
            .await
            .map(|_| ())
    }
}
