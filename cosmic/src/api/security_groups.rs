//! Security group API

use serde::Deserialize;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub project: String,
    pub projectid: String,
}

pub struct SecurityGroupsApi<'a> {
    client: &'a Client,
}

impl<'a> SecurityGroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<SecurityGroup>, ApiError> {
        self.client
            .get_by_id(
                "listSecurityGroups",
                "securitygroup",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create(
        &self,
        name: &str,
        description: &str,
        project_id: Option<&str>,
    ) -> Result<SecurityGroup, ApiError> {
        let params = ApiParams::new()
            .add("name", name)
            .add("description", description)
            .add_optional("projectid", project_id);

        self.client
            .request_entity("createSecurityGroup", params, "securitygroup")
            .await
    }

    pub async fn delete(&self, id: &str, project_id: Option<&str>) -> Result<(), ApiError> {
        self.client
            .request(
                "deleteSecurityGroup",
                ApiParams::new()
                    .add("id", id)
                    .add_optional("projectid", project_id),
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_helpers::{
        create_test_client, list_body, mock_command_with, response_body,
    };
    use serde_json::json;

    #[tokio::test]
    async fn create_security_group() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "createSecurityGroup",
            &[("name", "web"), ("description", "web servers")],
        )
        .with_body(response_body(
            "createSecurityGroup",
            json!({"securitygroup": {"id": "sg-1", "name": "web", "description": "web servers"}}),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let group = client
            .security_groups()
            .create("web", "web servers", None)
            .await
            .unwrap();

        assert_eq!(group.id, "sg-1");
    }

    #[tokio::test]
    async fn get_security_group_in_project() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "listSecurityGroups",
            &[("id", "sg-1"), ("projectid", "p-1")],
        )
        .with_body(list_body(
            "listSecurityGroups",
            "securitygroup",
            json!([{"id": "sg-1", "name": "web", "description": "web servers", "project": "ops", "projectid": "p-1"}]),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let group = client
            .security_groups()
            .get("sg-1", Some("p-1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(group.description, "web servers");
        assert_eq!(group.project, "ops");
    }

    #[tokio::test]
    async fn delete_security_group() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_command_with(&mut server, "deleteSecurityGroup", &[("id", "sg-1")])
            .with_body(response_body("deleteSecurityGroup", json!({"success": "true"})))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client.security_groups().delete("sg-1", None).await.unwrap();

        m.assert_async().await;
    }
}
