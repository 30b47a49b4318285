#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;

    const IP_ID: &str = "2b4d6f8a-0c2e-4b4d-9f8a-0c2e4b6d8f0a";
    const VM_ID: &str = "8f0a2c4e-6b8d-4f0a-9c4e-6b8d0f2a4c6e";

    fn forward(public_port: u16, private_port: u16, uuid: Option<&str>) -> Forward {
        Forward {
            protocol: "tcp".to_string(),
            private_port,
            public_port,
            virtual_machine_id: VM_ID.to_string(),
            vm_guest_ip: uuid.map(|_| "10.0.0.5".to_string()),
            uuid: uuid.map(String::from),
        }
    }

    fn forwards_state(forwards: &[Forward], managed: bool) -> DynamicValue {
        state(&[
            ("id", s(IP_ID)),
            ("ip_address_id", s(IP_ID)),
            ("managed", Dynamic::Bool(managed)),
            ("project", Dynamic::Null),
            (
                "forward",
                Dynamic::List(forwards.iter().map(Forward::to_dynamic).collect()),
            ),
        ])
    }

    fn resource(server: &mockito::ServerGuard) -> PortForwardResource {
        let mut resource = PortForwardResource::new();
        resource.provider_data = Some(provider_data(&server.url()));
        resource
    }

    #[test]
    fn test_diff_forwards_matches_without_guest_ip() {
        let old = vec![forward(80, 8080, Some("pf-80")), forward(22, 22, Some("pf-22"))];
        let new = vec![forward(80, 8080, None), forward(443, 8443, None)];

        let diff = diff_forwards(&old, &new);

        assert_eq!(diff.keep.len(), 1);
        assert_eq!(diff.keep[0].uuid.as_deref(), Some("pf-80"));
        assert_eq!(diff.keep[0].vm_guest_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(diff.delete.len(), 1);
        assert_eq!(diff.delete[0].public_port, 22);
        assert_eq!(diff.create.len(), 1);
        assert_eq!(diff.create[0].public_port, 443);
    }

    #[test]
    fn test_different_guest_ip_is_a_new_forward() {
        let old = forward(80, 8080, Some("pf-80"));
        let new = Forward {
            vm_guest_ip: Some("10.0.0.6".to_string()),
            ..forward(80, 8080, None)
        };

        assert!(!old.matches(&new));
    }

    #[tokio::test]
    async fn test_create_port_forward() {
        let mut server = mockito::Server::new_async().await;
        let create = mock_async_job_with(
            &mut server,
            "createPortForwardingRule",
            &[
                ("ipaddressid", IP_ID),
                ("privateport", "8080"),
                ("publicport", "80"),
                ("virtualmachineid", VM_ID),
                ("openfirewall", "false"),
            ],
            "job-1",
            json!({"portforwardingrule": {
                "id": "pf-80", "protocol": "tcp", "privateport": "8080", "publicport": "80",
                "virtualmachineid": VM_ID, "vmguestip": "10.0.0.5"
            }}),
        )
        .await;

        let mut planned = forwards_state(&[forward(80, 8080, None)], false);
        planned.set_value(&AttributePath::new("project"), Dynamic::Unknown).unwrap();

        let response = resource(&server)
            .create(Context::new(), create_request("cosmic_port_forward", planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.0.assert_async().await;

        let forwards = get_forwards(&response.new_state);
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].uuid.as_deref(), Some("pf-80"));
        assert_eq!(forwards[0].vm_guest_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(
            response.new_state.get(&AttributePath::new("project")),
            Some(&Dynamic::Null)
        );
    }

    #[tokio::test]
    async fn test_read_drops_vanished_forward() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_command_with(
            &mut server,
            "listPortForwardingRules",
            &[("ipaddressid", IP_ID)],
        )
        .with_body(list_body(
            "listPortForwardingRules",
            "portforwardingrule",
            json!([
                {"id": "pf-80", "protocol": "tcp", "privateport": "8080", "publicport": "80",
                 "virtualmachineid": VM_ID, "vmguestip": "10.0.0.5"},
                {"id": "pf-other", "protocol": "udp", "privateport": "53", "publicport": "53",
                 "virtualmachineid": VM_ID, "vmguestip": "10.0.0.5"}
            ]),
        ))
        .create_async()
        .await;

        let current = forwards_state(
            &[forward(80, 8080, Some("pf-80")), forward(22, 22, Some("pf-22"))],
            false,
        );
        let response = resource(&server)
            .read(Context::new(), read_request("cosmic_port_forward", current))
            .await;

        let new_state = response.new_state.expect("a forward is left");
        let forwards = get_forwards(&new_state);
        assert_eq!(forwards, vec![forward(80, 8080, Some("pf-80"))]);
    }

    #[tokio::test]
    async fn test_read_managed_adopts_unknown_forward() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_command_with(
            &mut server,
            "listPortForwardingRules",
            &[("ipaddressid", IP_ID)],
        )
        .with_body(list_body(
            "listPortForwardingRules",
            "portforwardingrule",
            json!([
                {"id": "pf-other", "protocol": "UDP", "privateport": "53", "publicport": "53",
                 "virtualmachineid": VM_ID, "vmguestip": "10.0.0.5"}
            ]),
        ))
        .create_async()
        .await;

        let current = forwards_state(&[], true);
        let response = resource(&server)
            .read(Context::new(), read_request("cosmic_port_forward", current))
            .await;

        let new_state = response.new_state.expect("managed forwards stay in state");
        let forwards = get_forwards(&new_state);
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].protocol, "udp");
        assert_eq!(forwards[0].uuid.as_deref(), Some("pf-other"));
    }

    #[tokio::test]
    async fn test_update_replaces_changed_forward() {
        let mut server = mockito::Server::new_async().await;
        let delete = mock_async_job_with(
            &mut server,
            "deletePortForwardingRule",
            &[("id", "pf-22")],
            "job-1",
            json!({"success": true}),
        )
        .await;
        let create = mock_async_job_with(
            &mut server,
            "createPortForwardingRule",
            &[("publicport", "2222"), ("privateport", "22")],
            "job-2",
            json!({"portforwardingrule": {"id": "pf-2222", "vmguestip": "10.0.0.5"}}),
        )
        .await;

        let prior = forwards_state(
            &[forward(80, 8080, Some("pf-80")), forward(22, 22, Some("pf-22"))],
            false,
        );
        let planned = forwards_state(&[forward(80, 8080, None), forward(2222, 22, None)], false);

        let response = resource(&server)
            .update(Context::new(), update_request("cosmic_port_forward", prior, planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.0.assert_async().await;
        create.0.assert_async().await;

        let mut ids: Vec<String> = get_forwards(&response.new_state)
            .into_iter()
            .filter_map(|f| f.uuid)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["pf-2222", "pf-80"]);
    }
}
