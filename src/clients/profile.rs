use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub seniority: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
}

#[async_trait::async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, error::SystemError>;
}

/// Profile service client: `GET {base_url}/internal/users/{user_id}`
#[derive(Clone)]
pub struct HttpProfileClient {
    client: Client,
    base_url: String,
}

impl HttpProfileClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait::async_trait]
impl ProfileLookup for HttpProfileClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, error::SystemError> {
        let url = format!("{}/internal/users/{}", self.base_url, user_id);

        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(error::SystemError::not_found(format!("User {user_id} not found")));
            }
            status if !status.is_success() => {
                return Err(error::SystemError::dependent_service(format!(
                    "Profile service returned {status} for user {user_id}"
                )));
            }
            _ => {}
        }

        let body: ApiResponse<Profile> = response.json().await?;

        body.result.ok_or_else(|| {
            error::SystemError::dependent_service(format!("Empty profile for user {user_id}"))
        })
    }
}
