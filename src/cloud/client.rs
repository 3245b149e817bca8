//! HTTPS client for the network resource provider

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::auth::{acquire_token, AccessToken, Credentials};
use super::resource_id::NETWORK_PROVIDER;
use super::types::{ListPage, NetworkInterface, PublicIpAddress, Route};
use super::{CloudNetworkApi, PendingOperation};
use crate::error::{Error, Result};

pub const API_VERSION: &str = "2023-09-01";

const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Base URLs of the services the client talks to
#[derive(Debug, Clone)]
pub struct ArmEndpoints {
    pub management: String,
    pub login: String,
    pub imds: String,
}

impl Default for ArmEndpoints {
    fn default() -> Self {
        Self {
            management: "https://management.azure.com".to_string(),
            login: "https://login.microsoftonline.com".to_string(),
            imds: "http://169.254.169.254".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

pub struct ArmClient {
    http: Client,
    subscription_id: String,
    credentials: Credentials,
    endpoints: ArmEndpoints,
    token: RwLock<Option<AccessToken>>,
    operation_poll_interval: Duration,
}

impl ArmClient {
    pub fn new(
        subscription_id: &str,
        credentials: Credentials,
        endpoints: ArmEndpoints,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("cloud-failover/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            subscription_id: subscription_id.to_string(),
            credentials,
            endpoints,
            token: RwLock::new(None),
            operation_poll_interval: Duration::from_secs(2),
        })
    }

    /// Override the default delay between operation status polls
    pub fn with_operation_poll_interval(mut self, interval: Duration) -> Self {
        self.operation_poll_interval = interval;
        self
    }

    fn resource_url(&self, resource_group: &str, path: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}?api-version={}",
            self.endpoints.management.trim_end_matches('/'),
            self.subscription_id,
            resource_group,
            NETWORK_PROVIDER,
            path,
            API_VERSION
        )
    }

    async fn bearer(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.token.clone());
            }
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String> {
        let token = acquire_token(
            &self.http,
            &self.credentials,
            &self.endpoints.imds,
            &self.endpoints.login,
        )
        .await?;
        let bearer = token.token.clone();
        *self.token.write().await = Some(token);
        Ok(bearer)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn put_json<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
        description: String,
    ) -> Result<PendingOperation> {
        debug!("PUT {}", url);
        let response = self
            .http
            .put(url)
            .bearer_auth(self.bearer().await?)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let status_url = response
            .headers()
            .get(ASYNC_OPERATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        info!("Submitted {}", description);
        Ok(PendingOperation {
            description,
            status_url,
            retry_after,
        })
    }
}

/// Map a non-success response onto the error taxonomy
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ArmErrorBody>(&body) {
        Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.message),
        Err(_) => body,
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Authentication(message));
    }
    Err(Error::Http {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CloudNetworkApi for ArmClient {
    async fn authenticate(&self) -> Result<()> {
        self.refresh_token().await.map(|_| ())
    }

    async fn get_interface(&self, resource_group: &str, name: &str) -> Result<NetworkInterface> {
        let url = self.resource_url(resource_group, &format!("networkInterfaces/{name}"));
        self.get_json(&url).await
    }

    async fn update_interface(
        &self,
        resource_group: &str,
        name: &str,
        body: &NetworkInterface,
    ) -> Result<PendingOperation> {
        let url = self.resource_url(resource_group, &format!("networkInterfaces/{name}"));
        self.put_json(&url, body, format!("interface update {name}"))
            .await
    }

    async fn get_public_ip(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress> {
        let url = self.resource_url(resource_group, &format!("publicIPAddresses/{name}"));
        self.get_json(&url).await
    }

    fn list_routes<'a>(
        &'a self,
        resource_group: &'a str,
        table: &'a str,
    ) -> BoxStream<'a, Result<Route>> {
        let first = self.resource_url(resource_group, &format!("routeTables/{table}/routes"));

        stream::try_unfold(Some(first), move |next| async move {
            let Some(url) = next else {
                return Ok::<_, Error>(None);
            };
            let page: ListPage<Route> = self.get_json(&url).await?;
            Ok(Some((page.value, page.next_link)))
        })
        .map_ok(|routes| stream::iter(routes.into_iter().map(Ok::<Route, Error>)))
        .try_flatten()
        .boxed()
    }

    async fn get_route(&self, resource_group: &str, table: &str, name: &str) -> Result<Route> {
        let url = self.resource_url(resource_group, &format!("routeTables/{table}/routes/{name}"));
        self.get_json(&url).await
    }

    async fn update_route(
        &self,
        resource_group: &str,
        table: &str,
        name: &str,
        body: &Route,
    ) -> Result<PendingOperation> {
        let url = self.resource_url(resource_group, &format!("routeTables/{table}/routes/{name}"));
        self.put_json(&url, body, format!("route update {table}/{name}"))
            .await
    }

    async fn wait(&self, operation: PendingOperation) -> Result<()> {
        let Some(status_url) = operation.status_url.as_deref() else {
            return Ok(());
        };
        let delay = operation
            .retry_after
            .unwrap_or(self.operation_poll_interval);

        loop {
            let status: OperationStatus = self.get_json(status_url).await?;
            match status.status.as_str() {
                "Succeeded" => {
                    info!("{} completed", operation.description);
                    return Ok(());
                }
                "Failed" | "Canceled" => {
                    let detail = status
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_default();
                    warn!("{} ended as {}", operation.description, status.status);
                    return Err(Error::OperationFailed(format!(
                        "{} ended as {} {}",
                        operation.description, status.status, detail
                    )));
                }
                other => {
                    debug!("{} is {}, polling again", operation.description, other);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
