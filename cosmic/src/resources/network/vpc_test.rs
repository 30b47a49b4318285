#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::types::{ClientCapabilities, Dynamic};

    const VPC_ID: &str = "5f7a9c1e-3b5d-4f7a-9c1e-3b5d7f9a1c3e";
    const OFFERING_ID: &str = "7b9d1f3a-5c7e-4b9d-8f1a-3c5e7a9b1d3f";
    const ZONE_ID: &str = "1e3a5c7d-9f1b-4d3f-8a5b-7c9d1e3f5a7b";

    fn vpc_json(name: &str) -> serde_json::Value {
        json!([{
            "id": VPC_ID,
            "name": name,
            "displaytext": name,
            "cidr": "10.0.0.0/16",
            "vpcofferingid": OFFERING_ID,
            "networkdomain": "prod.internal",
            "zoneid": ZONE_ID,
            "zonename": "ams1",
            "tags": []
        }])
    }

    /// Mocks stay registered only while the returned handles live
    async fn mock_reads(server: &mut mockito::ServerGuard, name: &str) -> Vec<mockito::Mock> {
        let vpc = mock_command_with(server, "listVPCs", &[("id", VPC_ID)])
            .with_body(list_body("listVPCs", "vpc", vpc_json(name)))
            .create_async()
            .await;
        let offering = mock_command_with(server, "listVPCOfferings", &[("id", OFFERING_ID)])
            .with_body(list_body(
                "listVPCOfferings",
                "vpcoffering",
                json!([{"id": OFFERING_ID, "name": "Default VPC offering"}]),
            ))
            .create_async()
            .await;
        let source_nat = mock_command_with(
            server,
            "listPublicIpAddresses",
            &[("vpcid", VPC_ID), ("issourcenat", "true")],
        )
        .with_body(list_body(
            "listPublicIpAddresses",
            "publicipaddress",
            json!([{"id": "ip-1", "ipaddress": "185.1.2.3", "issourcenat": true}]),
        ))
        .create_async()
        .await;

        vec![vpc, offering, source_nat]
    }

    #[tokio::test]
    async fn test_validate_vpc_cidr() {
        let response = VpcResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "cosmic_vpc".to_string(),
                    config: state(&[("cidr", s("10.0.0.0/99"))]),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid CIDR");
    }

    #[tokio::test]
    async fn test_create_vpc_reads_offering_and_source_nat() {
        let mut server = mockito::Server::new_async().await;
        let create = mock_async_job_with(
            &mut server,
            "createVPC",
            &[
                ("name", "prod"),
                ("displaytext", "prod"),
                ("cidr", "10.0.0.0/16"),
                ("vpcofferingid", OFFERING_ID),
                ("zoneid", ZONE_ID),
            ],
            "job-1",
            json!({"vpc": {"id": VPC_ID, "name": "prod"}}),
        )
        .await;
        let _reads = mock_reads(&mut server, "prod").await;

        let mut resource = VpcResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let planned = state(&[
            ("id", Dynamic::Unknown),
            ("name", s("prod")),
            ("display_text", Dynamic::Unknown),
            ("cidr", s("10.0.0.0/16")),
            ("vpc_offering", s("Default VPC offering")),
            ("network_domain", Dynamic::Unknown),
            ("project", Dynamic::Unknown),
            ("source_nat_ip", Dynamic::Unknown),
            ("source_nat_list", Dynamic::Null),
            ("syslog_server_list", Dynamic::Null),
            ("zone", s(ZONE_ID)),
            ("tags", Dynamic::Null),
        ]);

        // The offering is looked up by name first
        let _offering = mock_command_with(
            &mut server,
            "listVPCOfferings",
            &[("name", "Default VPC offering")],
        )
        .with_body(list_body(
            "listVPCOfferings",
            "vpcoffering",
            json!([{"id": OFFERING_ID, "name": "Default VPC offering"}]),
        ))
        .create_async()
        .await;

        let response = resource
            .create(Context::new(), create_request("cosmic_vpc", planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.0.assert_async().await;

        let new_state = &response.new_state;
        assert_eq!(get_string(new_state, "id"), VPC_ID);
        assert_eq!(get_string(new_state, "vpc_offering"), "Default VPC offering");
        assert_eq!(get_string(new_state, "source_nat_ip"), "185.1.2.3");
        assert_eq!(get_string(new_state, "zone"), ZONE_ID);
        assert_eq!(get_string(new_state, "network_domain"), "prod.internal");
    }

    #[tokio::test]
    async fn test_update_vpc_name() {
        let mut server = mockito::Server::new_async().await;
        let update = mock_async_job_with(
            &mut server,
            "updateVPC",
            &[("id", VPC_ID), ("name", "production")],
            "job-1",
            json!({"vpc": {"id": VPC_ID}}),
        )
        .await;
        let _reads = mock_reads(&mut server, "production").await;

        let mut resource = VpcResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let prior = state(&[
            ("id", s(VPC_ID)),
            ("name", s("prod")),
            ("vpc_offering", s(OFFERING_ID)),
            ("zone", s("ams1")),
        ]);
        let planned = state(&[
            ("id", s(VPC_ID)),
            ("name", s("production")),
            ("vpc_offering", s(OFFERING_ID)),
            ("zone", s("ams1")),
        ]);
        let response = resource
            .update(Context::new(), update_request("cosmic_vpc", prior, planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.0.assert_async().await;
        assert_eq!(get_string(&response.new_state, "name"), "production");
        assert_eq!(get_string(&response.new_state, "vpc_offering"), OFFERING_ID);
        assert_eq!(get_string(&response.new_state, "zone"), "ams1");
    }

    #[tokio::test]
    async fn test_delete_vpc_already_gone() {
        let mut server = mockito::Server::new_async().await;
        let _delete = mock_command_with(&mut server, "deleteVPC", &[("id", VPC_ID)])
            .with_status(431)
            .with_body(format!(
                r#"{{"deletevpcresponse":{{"errorcode":431,"cserrorcode":9999,"errortext":"Invalid parameter id value={} due to incorrect long value format, or entity does not exist"}}}}"#,
                VPC_ID
            ))
            .create_async()
            .await;

        let mut resource = VpcResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let prior = state(&[("id", s(VPC_ID)), ("name", s("prod"))]);
        let response = resource
            .delete(Context::new(), delete_request("cosmic_vpc", prior))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }
}
