#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::types::{ClientCapabilities, Dynamic};

    const GATEWAY_ID: &str = "4e6a8c0e-2b4d-4e6a-8c0e-2b4d6e8a0c2e";

    fn gateway_json(name: &str) -> serde_json::Value {
        json!([{
            "id": GATEWAY_ID,
            "name": name,
            "cidrlist": "192.168.0.0/24,192.168.1.0/24",
            "esppolicy": "aes256-sha1",
            "gateway": "203.0.113.10",
            "ikepolicy": "aes256-sha1;modp1536",
            "ipsecpsk": "secret",
            "dpd": "false",
            "esplifetime": "3600",
            "ikelifetime": 86400
        }])
    }

    fn planned(name: &str) -> DynamicValue {
        state(&[
            ("id", Dynamic::Unknown),
            ("name", s(name)),
            ("cidr_list", list(&["192.168.0.0/24", "192.168.1.0/24"])),
            ("esp_policy", s("aes256-sha1")),
            ("gateway", s("203.0.113.10")),
            ("ike_policy", s("aes256-sha1;modp1536")),
            ("ipsec_psk", s("secret")),
            ("dpd", Dynamic::Unknown),
            ("esp_lifetime", Dynamic::Unknown),
            ("ike_lifetime", Dynamic::Unknown),
        ])
    }

    fn resource(server: &mockito::ServerGuard) -> VpnCustomerGatewayResource {
        let mut resource = VpnCustomerGatewayResource::new();
        resource.provider_data = Some(provider_data(&server.url()));
        resource
    }

    #[tokio::test]
    async fn test_create_customer_gateway() {
        let mut server = mockito::Server::new_async().await;
        let create = mock_async_job_with(
            &mut server,
            "createVpnCustomerGateway",
            &[
                ("name", "office"),
                ("cidrlist", "192.168.0.0/24,192.168.1.0/24"),
                ("ipsecpsk", "secret"),
            ],
            "job-1",
            json!({"vpncustomergateway": {"id": GATEWAY_ID}}),
        )
        .await;
        let _list = mock_command_with(&mut server, "listVpnCustomerGateways", &[("id", GATEWAY_ID)])
            .with_body(list_body("listVpnCustomerGateways", "vpncustomergateway", gateway_json("office")))
            .create_async()
            .await;

        let response = resource(&server)
            .create(
                Context::new(),
                create_request("cosmic_vpn_customer_gateway", planned("office")),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.0.assert_async().await;

        let new_state = &response.new_state;
        assert_eq!(get_string(new_state, "id"), GATEWAY_ID);
        assert_eq!(get_optional_bool(new_state, "dpd"), Some(false));
        assert_eq!(get_i64(new_state, "esp_lifetime"), Some(3600));
        assert_eq!(get_i64(new_state, "ike_lifetime"), Some(86400));
        assert_eq!(
            get_strings(new_state, "cidr_list"),
            vec!["192.168.0.0/24", "192.168.1.0/24"]
        );
    }

    #[tokio::test]
    async fn test_update_sends_gateway_id() {
        let mut server = mockito::Server::new_async().await;
        let update = mock_async_job_with(
            &mut server,
            "updateVpnCustomerGateway",
            &[("id", GATEWAY_ID), ("name", "head-office")],
            "job-1",
            json!({"vpncustomergateway": {"id": GATEWAY_ID}}),
        )
        .await;
        let _list = mock_command_with(&mut server, "listVpnCustomerGateways", &[("id", GATEWAY_ID)])
            .with_body(list_body(
                "listVpnCustomerGateways",
                "vpncustomergateway",
                gateway_json("head-office"),
            ))
            .create_async()
            .await;

        let mut prior = planned("office");
        set_string(&mut prior, "id", GATEWAY_ID);
        let mut next = planned("head-office");
        set_string(&mut next, "id", GATEWAY_ID);

        let response = resource(&server)
            .update(
                Context::new(),
                update_request("cosmic_vpn_customer_gateway", prior, next),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.0.assert_async().await;
        assert_eq!(get_string(&response.new_state, "name"), "head-office");
    }

    #[tokio::test]
    async fn test_validate_cidr_list() {
        let response = VpnCustomerGatewayResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "cosmic_vpn_customer_gateway".to_string(),
                    config: state(&[("cidr_list", list(&["192.168.0.0/24", "192.168.1.0"]))]),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid CIDR");
    }
}
