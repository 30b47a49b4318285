pub mod api;
pub mod config;
pub mod provider_data;
pub mod resolve;
pub mod resources;
pub mod retry;
pub mod rules;
pub mod tags;

pub use provider_data::CosmicProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::Diagnostic;

use crate::config::ProviderConfig;

pub struct CosmicProvider {
    provider_data: Option<CosmicProviderData>,
}

impl Default for CosmicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CosmicProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }
}

/// Boxes a resource constructor as a factory
fn factory<R>(new: fn() -> R) -> ResourceFactory
where
    R: ResourceWithConfigure + 'static,
{
    Box::new(move || Box::new(new()) as Box<dyn ResourceWithConfigure>)
}

#[async_trait]
impl Provider for CosmicProvider {
    fn type_name(&self) -> &str {
        "cosmic"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Manages Cosmic cloud infrastructure")
            .attribute(
                AttributeBuilder::new("api_url", AttributeType::String)
                    .description("The API endpoint (COSMIC_API_URL)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_key", AttributeType::String)
                    .description("The API key (COSMIC_API_KEY)")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("The secret key used to sign requests (COSMIC_SECRET_KEY)")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("http_get_only", AttributeType::Bool)
                    .description("Send every command as a GET request (COSMIC_HTTP_GET_ONLY)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("timeout", AttributeType::Number)
                    .description("Seconds to wait for async jobs (COSMIC_TIMEOUT, default 900)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("config", AttributeType::String)
                    .description("Path to an INI file holding API credentials")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("profile", AttributeType::String)
                    .description("Section of the INI file to read credentials from")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = vec![];

        if ProviderConfig::from_block(&request.config).conflicts() {
            diagnostics.push(Diagnostic::error(
                "Conflicting provider configuration",
                "'api_url', 'api_key' and 'secret_key' conflict with 'config' and 'profile'",
            ));
        }

        ValidateProviderConfigResponse { diagnostics }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];

        let credentials = match ProviderConfig::from_block(&request.config)
            .with_env_fallback()
            .and_then(|config| config.resolve())
        {
            Ok(credentials) => credentials,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Invalid provider configuration", e.to_string()));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        let client_config =
            api::ClientConfig::new(&credentials.api_url, &credentials.api_key, &credentials.secret_key)
                .with_http_get_only(credentials.http_get_only)
                .with_async_timeout(credentials.timeout);

        match api::Client::new(client_config) {
            Ok(client) => {
                tracing::info!(api_url = %credentials.api_url, "configured Cosmic provider");
                let data = CosmicProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(data)),
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use resources::compute::*;
        use resources::network::*;
        use resources::rules::*;
        use resources::vpn::*;

        let mut factories = HashMap::new();
        factories.insert("cosmic_affinity_group".to_string(), factory(AffinityGroupResource::new));
        factories.insert("cosmic_disk".to_string(), factory(DiskResource::new));
        factories.insert("cosmic_egress_firewall".to_string(), factory(EgressFirewallResource::new));
        factories.insert("cosmic_firewall".to_string(), factory(FirewallResource::new));
        factories.insert("cosmic_instance".to_string(), factory(InstanceResource::new));
        factories.insert("cosmic_ipaddress".to_string(), factory(IpAddressResource::new));
        factories.insert(
            "cosmic_loadbalancer_rule".to_string(),
            factory(LoadBalancerRuleResource::new),
        );
        factories.insert("cosmic_network".to_string(), factory(NetworkResource::new));
        factories.insert("cosmic_network_acl".to_string(), factory(NetworkAclResource::new));
        factories.insert(
            "cosmic_network_acl_rule".to_string(),
            factory(NetworkAclRuleResource::new),
        );
        factories.insert("cosmic_nic".to_string(), factory(NicResource::new));
        factories.insert("cosmic_port_forward".to_string(), factory(PortForwardResource::new));
        factories.insert(
            "cosmic_private_gateway".to_string(),
            factory(PrivateGatewayResource::new),
        );
        factories.insert(
            "cosmic_secondary_ipaddress".to_string(),
            factory(SecondaryIpAddressResource::new),
        );
        factories.insert(
            "cosmic_security_group".to_string(),
            factory(SecurityGroupResource::new),
        );
        factories.insert("cosmic_ssh_keypair".to_string(), factory(SshKeyPairResource::new));
        factories.insert("cosmic_static_nat".to_string(), factory(StaticNatResource::new));
        factories.insert("cosmic_static_route".to_string(), factory(StaticRouteResource::new));
        factories.insert("cosmic_template".to_string(), factory(TemplateResource::new));
        factories.insert("cosmic_vpc".to_string(), factory(VpcResource::new));
        factories.insert(
            "cosmic_vpn_connection".to_string(),
            factory(VpnConnectionResource::new),
        );
        factories.insert(
            "cosmic_vpn_customer_gateway".to_string(),
            factory(VpnCustomerGatewayResource::new),
        );
        factories.insert("cosmic_vpn_gateway".to_string(), factory(VpnGatewayResource::new));
        factories
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

    const ENV_VARS: &[&str] = &[
        "COSMIC_API_URL",
        "COSMIC_API_KEY",
        "COSMIC_SECRET_KEY",
        "COSMIC_HTTP_GET_ONLY",
        "COSMIC_TIMEOUT",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn configure_request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var("COSMIC_API_URL", "https://cosmic.example.com/client/api");
        std::env::set_var("COSMIC_API_KEY", "key");
        std::env::set_var("COSMIC_SECRET_KEY", "secret");

        let mut provider = CosmicProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.provider_data.is_some());
        assert!(provider.provider_data.is_some());

        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<CosmicProviderData>().unwrap();
        assert_eq!(data.client.api_url(), "https://cosmic.example.com/client/api");
        assert_eq!(data.client.async_timeout().as_secs(), 900);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_block_overrides_env() {
        clear_env();
        std::env::set_var("COSMIC_API_URL", "https://env.example.com/client/api");
        std::env::set_var("COSMIC_API_KEY", "key");
        std::env::set_var("COSMIC_SECRET_KEY", "secret");

        let mut config = DynamicValue::object();
        config
            .set_string(
                &AttributePath::new("api_url"),
                "https://block.example.com/client/api".to_string(),
            )
            .unwrap();
        config
            .set_number(&AttributePath::new("timeout"), 60.0)
            .unwrap();

        let mut provider = CosmicProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(config))
            .await;
        assert!(response.diagnostics.is_empty());

        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<CosmicProviderData>().unwrap();
        assert_eq!(data.client.api_url(), "https://block.example.com/client/api");
        assert_eq!(data.client.async_timeout().as_secs(), 60);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_credentials() {
        clear_env();

        let mut provider = CosmicProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .detail
            .contains("either 'api_url', 'api_key' and 'secret_key' or 'config' and 'profile'"));
        assert!(response.provider_data.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_rejects_partial_keys() {
        clear_env();
        std::env::set_var("COSMIC_API_URL", "https://cosmic.example.com/client/api");

        let mut provider = CosmicProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;

        assert_eq!(
            response.diagnostics[0].detail,
            "'api_url', 'api_key' and 'secret_key' should all have values"
        );

        clear_env();
    }

    #[tokio::test]
    async fn validate_flags_conflicting_credential_styles() {
        let provider = CosmicProvider::new();

        let mut config = DynamicValue::object();
        config
            .set_value(&AttributePath::new("api_key"), Dynamic::String("key".to_string()))
            .unwrap();
        config
            .set_value(&AttributePath::new("profile"), Dynamic::String("prod".to_string()))
            .unwrap();

        let response = provider
            .validate(Context::new(), ValidateProviderConfigRequest { config })
            .await;
        assert_eq!(response.diagnostics.len(), 1);

        let response = provider
            .validate(
                Context::new(),
                ValidateProviderConfigRequest {
                    config: DynamicValue::object(),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn provider_schema_marks_secrets_sensitive() {
        let provider = CosmicProvider::new();
        let response = provider
            .schema(Context::new(), ProviderSchemaRequest)
            .await;

        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "api_key" && a.sensitive));
        assert!(attrs.iter().any(|a| a.name == "secret_key" && a.sensitive));
        assert!(attrs.iter().all(|a| !a.required));
    }

    #[test]
    fn every_resource_has_a_factory_with_matching_type_name() {
        let provider = CosmicProvider::new();
        let factories = provider.resources();

        assert_eq!(factories.len(), 23);
        for (name, factory) in &factories {
            let resource = factory();
            assert_eq!(resource.type_name(), name);
        }
    }
}
