#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::resource::ResourceSchemaRequest;
    use tfplug::schema::PlanModifierRequest;
    use tfplug::types::ClientCapabilities;

    const VM_ID: &str = "2c4e6a8b-1d3f-4b5d-8e7f-9a0b1c2d3e4f";
    const NETWORK_ID: &str = "3d5f7a9b-2e4a-4c6e-9f8a-0b1c2d3e4f5a";
    const TEMPLATE_ID: &str = "4e6a8b0c-3f5b-4d7f-8a9b-1c2d3e4f5a6b";
    const ZONE_ID: &str = "5f7b9c1d-4a6c-4e8a-9b0c-2d3e4f5a6b7c";
    const SMALL_ID: &str = "6a8c0d2e-5b7d-4f9b-8c1d-3e4f5a6b7c8d";
    const LARGE_ID: &str = "7b9d1e3f-6c8e-4a0c-9d2e-4f5a6b7c8d9e";

    fn vm_json(service_offering: (&str, &str)) -> serde_json::Value {
        json!({
            "id": VM_ID,
            "name": "web-1",
            "displayname": "web-1",
            "serviceofferingid": service_offering.0,
            "serviceofferingname": service_offering.1,
            "templateid": TEMPLATE_ID,
            "templatename": "ubuntu-22.04",
            "zoneid": ZONE_ID,
            "zonename": "ams1",
            "group": "",
            "state": "Running",
            "nic": [
                {"id": "nic-2", "networkid": "other", "ipaddress": "10.1.0.5", "isdefault": false},
                {"id": "nic-1", "networkid": NETWORK_ID, "ipaddress": "10.0.0.10", "isdefault": true}
            ],
            "affinitygroup": [{"id": "ag-1", "name": "web"}],
            "tags": []
        })
    }

    fn planned() -> DynamicValue {
        state(&[
            ("id", Dynamic::Unknown),
            ("name", s("web-1")),
            ("display_name", Dynamic::Unknown),
            ("service_offering", s("small")),
            ("network_id", s(NETWORK_ID)),
            ("ip_address", Dynamic::Unknown),
            ("template", s(TEMPLATE_ID)),
            ("root_disk_size", Dynamic::Unknown),
            ("group", Dynamic::Unknown),
            ("affinity_group_ids", Dynamic::Null),
            ("affinity_group_names", list(&["web"])),
            ("security_group_ids", Dynamic::Null),
            ("security_group_names", Dynamic::Null),
            ("keypair", Dynamic::Null),
            ("user_data", s(&user_data_hash("hello"))),
            ("expunge", Dynamic::Bool(true)),
            ("project", Dynamic::Unknown),
            ("zone", s(ZONE_ID)),
            ("tags", Dynamic::Unknown),
        ])
    }

    fn deployed() -> DynamicValue {
        let mut value = planned();
        for (name, v) in [
            ("id", s(VM_ID)),
            ("display_name", s("web-1")),
            ("ip_address", s("10.0.0.10")),
            ("root_disk_size", Dynamic::Null),
            ("group", s("")),
            ("project", Dynamic::Null),
            ("tags", Dynamic::Map(Default::default())),
        ] {
            value.set_value(&AttributePath::new(name), v).unwrap();
        }
        value
    }

    async fn mock_offering(server: &mut mockito::ServerGuard, name: &str, id: &str) -> mockito::Mock {
        mock_command_with(server, "listServiceOfferings", &[("name", name)])
            .with_body(list_body(
                "listServiceOfferings",
                "serviceoffering",
                json!([{"id": id, "name": name}]),
            ))
            .create_async()
            .await
    }

    async fn mock_vm(server: &mut mockito::ServerGuard, body: serde_json::Value) -> mockito::Mock {
        mock_command_with(server, "listVirtualMachines", &[("id", VM_ID)])
            .with_body(list_body("listVirtualMachines", "virtualmachine", json!([body])))
            .create_async()
            .await
    }

    #[test]
    fn test_resource_type_name() {
        assert_eq!(InstanceResource::new().type_name(), "cosmic_instance");
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let response = InstanceResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;

        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "name" && a.required));
        assert!(attrs.iter().any(|a| a.name == "user_data" && a.optional && a.computed));
        assert!(attrs
            .iter()
            .any(|a| a.name == "template" && !a.plan_modifiers.is_empty()));
        assert!(attrs.iter().any(|a| a.name == "expunge" && a.default.is_some()));
    }

    #[test]
    fn test_user_data_is_planned_as_hash() {
        let response = HashUserData.modify(PlanModifierRequest {
            config_value: DynamicValue::new(s("hello")),
            state_value: DynamicValue::null(),
            plan_value: DynamicValue::new(s("hello")),
            path: AttributePath::new("user_data"),
        });

        assert_eq!(
            response.plan_value.value,
            s("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
        );
        assert!(!response.requires_replace);
    }

    #[test]
    fn test_unset_user_data_keeps_plan() {
        let response = HashUserData.modify(PlanModifierRequest {
            config_value: DynamicValue::null(),
            state_value: DynamicValue::null(),
            plan_value: DynamicValue::unknown(),
            path: AttributePath::new("user_data"),
        });

        assert!(response.plan_value.is_unknown());
    }

    #[tokio::test]
    async fn test_removing_keypair_requires_replace() {
        let response = InstanceResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;
        let keypair = response
            .schema
            .block
            .attributes
            .iter()
            .find(|a| a.name == "keypair")
            .unwrap();

        let plan = |state: Dynamic, plan: Dynamic| {
            keypair.plan_modifiers.iter().any(|m| {
                m.modify(PlanModifierRequest {
                    config_value: DynamicValue::new(plan.clone()),
                    state_value: DynamicValue::new(state.clone()),
                    plan_value: DynamicValue::new(plan.clone()),
                    path: AttributePath::new("keypair"),
                })
                .requires_replace
            })
        };

        assert!(plan(s("deploy"), Dynamic::Null));
        assert!(!plan(s("deploy"), s("rotated")));
        assert!(!plan(Dynamic::Null, s("deploy")));
    }

    #[tokio::test]
    async fn test_validate_conflicting_group_styles() {
        let config = state(&[
            ("affinity_group_ids", list(&["ag-1"])),
            ("affinity_group_names", list(&["web"])),
            ("security_group_ids", Dynamic::Null),
            ("security_group_names", list(&["default"])),
        ]);

        let response = InstanceResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "cosmic_instance".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].detail,
            "'affinity_group_ids' conflicts with 'affinity_group_names'"
        );
    }

    #[tokio::test]
    async fn test_create_without_provider_data() {
        let response = InstanceResource::new()
            .create(Context::new(), create_request("cosmic_instance", planned()))
            .await;

        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
        assert!(response.new_state.is_null());
    }

    #[tokio::test]
    async fn test_create_successful() {
        let mut server = mockito::Server::new_async().await;
        let _offering = mock_offering(&mut server, "small", SMALL_ID).await;
        let deploy = mock_async_job_with(
            &mut server,
            "deployVirtualMachine",
            &[
                ("name", "web-1"),
                ("displayname", "web-1"),
                ("serviceofferingid", SMALL_ID),
                ("templateid", TEMPLATE_ID),
                ("zoneid", ZONE_ID),
                ("networkids", NETWORK_ID),
                ("affinitygroupnames", "web"),
                ("userdata", "aGVsbG8="),
            ],
            "job-1",
            json!({"virtualmachine": vm_json((SMALL_ID, "small"))}),
        )
        .await;
        let _vm = mock_vm(&mut server, vm_json((SMALL_ID, "small"))).await;

        let mut resource = InstanceResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let mut request = create_request("cosmic_instance", planned());
        request
            .config
            .set_value(&AttributePath::new("user_data"), s("hello"))
            .unwrap();

        let response = resource.create(Context::new(), request).await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        deploy.0.assert_async().await;

        let state = &response.new_state;
        assert_eq!(get_string(state, "id"), VM_ID);
        assert_eq!(get_string(state, "service_offering"), "small");
        assert_eq!(get_string(state, "network_id"), NETWORK_ID);
        assert_eq!(get_string(state, "ip_address"), "10.0.0.10");
        assert_eq!(get_string(state, "user_data"), user_data_hash("hello"));
        assert_eq!(get_strings(state, "affinity_group_names"), vec!["web"]);
        assert_eq!(
            state.get(&AttributePath::new("affinity_group_ids")),
            Some(&Dynamic::Null)
        );
        assert_eq!(
            state.get(&AttributePath::new("root_disk_size")),
            Some(&Dynamic::Null)
        );
    }

    #[tokio::test]
    async fn test_read_vm_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_command_with(&mut server, "listVirtualMachines", &[("id", VM_ID)])
            .with_status(431)
            .with_body(format!(
                r#"{{"listvirtualmachinesresponse":{{"errorcode":431,"cserrorcode":9999,"errortext":"Invalid parameter id value={} due to incorrect long value format, or entity does not exist"}}}}"#,
                VM_ID
            ))
            .create_async()
            .await;

        let mut resource = InstanceResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .read(Context::new(), read_request("cosmic_instance", deployed()))
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_service_offering_restarts_instance() {
        let mut server = mockito::Server::new_async().await;
        let _offering = mock_offering(&mut server, "large", LARGE_ID).await;
        let stop = mock_async_job_with(
            &mut server,
            "stopVirtualMachine",
            &[("id", VM_ID)],
            "job-stop",
            json!({"virtualmachine": vm_json((SMALL_ID, "small"))}),
        )
        .await;
        let change = mock_command_with(
            &mut server,
            "changeServiceForVirtualMachine",
            &[("id", VM_ID), ("serviceofferingid", LARGE_ID)],
        )
        .with_body(r#"{"changeserviceforvirtualmachineresponse":{"virtualmachine":{}}}"#)
        .create_async()
        .await;
        let start = mock_async_job_with(
            &mut server,
            "startVirtualMachine",
            &[("id", VM_ID)],
            "job-start",
            json!({"virtualmachine": vm_json((LARGE_ID, "large"))}),
        )
        .await;
        let _vm = mock_vm(&mut server, vm_json((LARGE_ID, "large"))).await;

        let mut resource = InstanceResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let prior = deployed();
        let mut next = prior.clone();
        next.set_value(&AttributePath::new("service_offering"), s("large"))
            .unwrap();

        let response = resource
            .update(Context::new(), update_request("cosmic_instance", prior, next))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        stop.0.assert_async().await;
        change.assert_async().await;
        start.0.assert_async().await;
        assert_eq!(get_string(&response.new_state, "service_offering"), "large");
    }

    #[tokio::test]
    async fn test_rename_does_not_stop_instance() {
        let mut server = mockito::Server::new_async().await;
        let update = mock_command_with(
            &mut server,
            "updateVirtualMachine",
            &[("id", VM_ID), ("name", "web-2")],
        )
        .with_body(r#"{"updatevirtualmachineresponse":{"virtualmachine":{}}}"#)
        .create_async()
        .await;
        let stop = mock_command_with(&mut server, "stopVirtualMachine", &[])
            .expect(0)
            .create_async()
            .await;
        let mut renamed = vm_json((SMALL_ID, "small"));
        renamed["name"] = json!("web-2");
        let _vm = mock_vm(&mut server, renamed).await;

        let mut resource = InstanceResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let prior = deployed();
        let mut next = prior.clone();
        next.set_value(&AttributePath::new("name"), s("web-2")).unwrap();

        let response = resource
            .update(Context::new(), update_request("cosmic_instance", prior, next))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
        stop.assert_async().await;
        assert_eq!(get_string(&response.new_state, "name"), "web-2");
    }

    #[tokio::test]
    async fn test_delete_expunges() {
        let mut server = mockito::Server::new_async().await;
        let destroy = mock_async_job_with(
            &mut server,
            "destroyVirtualMachine",
            &[("id", VM_ID), ("expunge", "true")],
            "job-1",
            json!({}),
        )
        .await;

        let mut resource = InstanceResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .delete(Context::new(), delete_request("cosmic_instance", deployed()))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        destroy.0.assert_async().await;
    }

    #[tokio::test]
    async fn test_import_sets_id() {
        let response = InstanceResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "cosmic_instance".to_string(),
                    id: VM_ID.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(get_string(&response.imported_resources[0].state, "id"), VM_ID);
    }
}
