//! Credential acquisition for the control plane
//!
//! Two mechanisms are supported: a managed identity served by the instance
//! metadata endpoint, or a service principal using the client-credentials
//! grant.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Audience requested for management-plane tokens
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

const IMDS_API_VERSION: &str = "2018-02-01";

#[derive(Clone)]
pub enum Credentials {
    ManagedIdentity {
        client_id: String,
    },
    ServicePrincipal {
        application_id: String,
        secret: String,
        directory_id: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            Credentials::ServicePrincipal {
                application_id,
                directory_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("application_id", application_id)
                .field("directory_id", directory_id)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

impl Credentials {
    /// Pick the credential mechanism from the supplied parameters
    ///
    /// Exactly one of a managed identity or the full service-principal trio
    /// must be given.
    pub fn select(
        managed_identity_id: Option<String>,
        application_id: Option<String>,
        secret: Option<String>,
        directory_id: Option<String>,
    ) -> Result<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let managed = non_empty(managed_identity_id);
        let trio = (
            non_empty(application_id),
            non_empty(secret),
            non_empty(directory_id),
        );

        match (managed, trio) {
            (Some(client_id), (None, None, None)) => Ok(Credentials::ManagedIdentity { client_id }),
            (None, (Some(application_id), Some(secret), Some(directory_id))) => {
                Ok(Credentials::ServicePrincipal {
                    application_id,
                    secret,
                    directory_id,
                })
            }
            (Some(_), _) => Err(Error::MissingParameter(
                "managed_identity_id cannot be combined with application_id/secret/directory_id"
                    .to_string(),
            )),
            (None, (None, None, None)) => Err(Error::MissingParameter(
                "either managed_identity_id or application_id/secret/directory_id is required"
                    .to_string(),
            )),
            (None, _) => Err(Error::MissingParameter(
                "application_id, secret and directory_id must all be set".to_string(),
            )),
        }
    }
}

/// A bearer token and its expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl AccessToken {
    /// Valid for at least another minute
    pub fn is_fresh(&self) -> bool {
        self.expires_on - Utc::now() > ChronoDuration::seconds(60)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<Value>,
    #[serde(default)]
    expires_in: Option<Value>,
}

/// Token endpoints return numbers either as JSON numbers or as strings
fn as_seconds(value: &Option<Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let expires_on = as_seconds(&self.expires_on)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                as_seconds(&self.expires_in).map(|secs| Utc::now() + ChronoDuration::seconds(secs))
            })
            .unwrap_or_else(|| Utc::now() + ChronoDuration::minutes(5));

        AccessToken {
            token: self.access_token,
            expires_on,
        }
    }
}

/// Fetch a management-plane token with the given credentials
pub async fn acquire_token(
    http: &Client,
    credentials: &Credentials,
    imds_endpoint: &str,
    login_endpoint: &str,
) -> Result<AccessToken> {
    match credentials {
        Credentials::ManagedIdentity { client_id } => {
            let url = format!(
                "{}/metadata/identity/oauth2/token",
                imds_endpoint.trim_end_matches('/')
            );
            debug!("Requesting managed identity token from {}", url);

            let response = http
                .get(&url)
                .header("Metadata", "true")
                .query(&[
                    ("api-version", IMDS_API_VERSION),
                    ("resource", MANAGEMENT_RESOURCE),
                    ("client_id", client_id.as_str()),
                ])
                .send()
                .await
                .map_err(|e| {
                    Error::CredentialUnavailable(format!("Metadata endpoint unreachable: {e}"))
                })?;

            token_from_response(response).await
        }
        Credentials::ServicePrincipal {
            application_id,
            secret,
            directory_id,
        } => {
            let url = format!(
                "{}/{}/oauth2/token",
                login_endpoint.trim_end_matches('/'),
                directory_id
            );
            debug!("Requesting service principal token from {}", url);

            let response = http
                .post(&url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", application_id.as_str()),
                    ("client_secret", secret.as_str()),
                    ("resource", MANAGEMENT_RESOURCE),
                ])
                .send()
                .await?;

            token_from_response(response).await
        }
    }
}

async fn token_from_response(response: reqwest::Response) -> Result<AccessToken> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Authentication(format!(
            "Token endpoint returned HTTP {status}: {body}"
        )));
    }

    let token: TokenResponse = response.json().await?;
    Ok(token.into_token())
}
