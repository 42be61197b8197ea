//! Token acquisition against the Microsoft identity platform, and a diagnostic
//! probe that reads the app roles out of the acquired token.
//!
//! Two grants are supported:
//! - client credentials (app-only; needs a client secret)
//! - device code (delegated; the user signs in on another device)

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use up_print_core::contract::{DiagnosticProbe, DiagnosticRecord, ProbeTarget};
use up_print_core::error::PrintError;

pub const AUTHORITY_BASE_URL: &str = "https://login.microsoftonline.com";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum AuthMethod {
    ClientCredentials {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    DeviceCode {
        tenant_id: String,
        client_id: String,
    },
}

impl AuthMethod {
    fn tenant_id(&self) -> &str {
        match self {
            AuthMethod::ClientCredentials { tenant_id, .. }
            | AuthMethod::DeviceCode { tenant_id, .. } => tenant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn failure(&self) -> String {
        format!(
            "{}: {}",
            self.error.as_deref().unwrap_or("unknown_error"),
            self.error_description
                .as_deref()
                .unwrap_or("no description")
                .lines()
                .next()
                .unwrap_or_default()
        )
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    message: String,
    #[serde(default = "default_device_interval")]
    interval: u64,
    expires_in: u64,
}

fn default_device_interval() -> u64 {
    5
}

pub struct TokenProvider {
    http: Client,
    authority_base: String,
}

impl TokenProvider {
    pub fn new() -> Result<Self, PrintError> {
        Self::with_authority(AUTHORITY_BASE_URL)
    }

    pub fn with_authority(authority_base: &str) -> Result<Self, PrintError> {
        let http = Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .map_err(|e| PrintError::AuthenticationFailed(e.to_string()))?;
        Ok(Self {
            http,
            authority_base: authority_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &AuthMethod, leaf: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority_base,
            method.tenant_id(),
            leaf
        )
    }

    /// Acquire a bearer token for `scopes` with the given grant.
    pub async fn acquire(&self, method: &AuthMethod, scopes: &[String]) -> Result<String, PrintError> {
        let scope = scopes.join(" ");
        info!(tenant_id = method.tenant_id(), scope = %scope, "Acquiring access token");
        let token = match method {
            AuthMethod::ClientCredentials {
                client_id,
                client_secret,
                ..
            } => {
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", scope.as_str()),
                ];
                let response = self.token_request(method, &form).await?;
                let failure = response.failure();
                response
                    .access_token
                    .ok_or(PrintError::AuthenticationFailed(failure))?
            }
            AuthMethod::DeviceCode { client_id, .. } => {
                self.device_code_flow(method, client_id, &scope).await?
            }
        };
        info!(tenant_id = method.tenant_id(), "Access token acquired");
        Ok(token)
    }

    async fn token_request(&self, method: &AuthMethod, form: &[(&str, &str)]) -> Result<TokenResponse, PrintError> {
        let url = self.endpoint(method, "token");
        let response = self.http.post(&url).form(form).send().await.map_err(|e| {
            error!(error = %e, "Token endpoint unreachable");
            PrintError::AuthenticationFailed(e.to_string())
        })?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| PrintError::AuthenticationFailed(format!("unreadable token response: {e}")))
    }

    async fn device_code_flow(&self, method: &AuthMethod, client_id: &str, scope: &str) -> Result<String, PrintError> {
        let url = self.endpoint(method, "devicecode");
        let device: DeviceCodeResponse = self
            .http
            .post(&url)
            .form(&[("client_id", client_id), ("scope", scope)])
            .send()
            .await
            .map_err(|e| PrintError::AuthenticationFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| PrintError::AuthenticationFailed(format!("unreadable device code response: {e}")))?;

        // The sign-in instructions are for the user, not the log.
        eprintln!("{}", device.message);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = Duration::from_secs(device.interval.max(1));
        let form = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", client_id),
            ("device_code", device.device_code.as_str()),
        ];
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(interval).await;
            let mut response = self.token_request(method, &form).await?;
            if let Some(token) = response.access_token.take() {
                return Ok(token);
            }
            match response.error.as_deref() {
                Some("authorization_pending") => debug!("Device code sign-in pending"),
                Some("slow_down") => {
                    interval += Duration::from_secs(5);
                    debug!(interval_secs = interval.as_secs(), "Device code polling slowed down");
                }
                _ => return Err(PrintError::AuthenticationFailed(response.failure())),
            }
        }
        Err(PrintError::AuthenticationFailed(
            "device code expired before sign-in completed".to_string(),
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub roles: Vec<String>,
    /// Delegated permissions, space separated.
    #[serde(default)]
    pub scp: Option<String>,
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
}

impl TokenClaims {
    pub fn permissions(&self) -> Vec<&str> {
        self.roles
            .iter()
            .map(String::as_str)
            .chain(self.scp.as_deref().unwrap_or_default().split_whitespace())
            .collect()
    }
}

/// Read claims without verifying the signature. Only for diagnostics.
pub fn inspect_token(token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation).map(|data| data.claims)
}

/// Reports which required app roles the bearer token lacks.
pub struct TokenRolesProbe {
    access_token: String,
    required_roles: Vec<String>,
}

impl TokenRolesProbe {
    pub fn new(access_token: impl Into<String>, required_roles: Vec<String>) -> Self {
        Self {
            access_token: access_token.into(),
            required_roles,
        }
    }
}

#[async_trait]
impl DiagnosticProbe for TokenRolesProbe {
    fn name(&self) -> &'static str {
        "token-roles"
    }

    async fn probe(&self, _target: &ProbeTarget) -> Option<DiagnosticRecord> {
        let claims = match inspect_token(&self.access_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Access token is not a readable JWT");
                return Some(DiagnosticRecord::failed(
                    self.name(),
                    format!("token claims unreadable: {e}"),
                ));
            }
        };
        let granted = claims.permissions();
        let missing: Vec<&str> = self
            .required_roles
            .iter()
            .map(String::as_str)
            .filter(|role| !granted.contains(role))
            .collect();
        let record = if missing.is_empty() {
            DiagnosticRecord::passed(self.name(), "token carries every required permission")
        } else {
            DiagnosticRecord::failed(
                self.name(),
                format!("token lacks {}", missing.join(", ")),
            )
        };
        Some(
            record
                .with_detail(format!("granted: {}", if granted.is_empty() { "-".to_string() } else { granted.join(", ") }))
                .with_detail(format!("app id: {}", claims.appid.as_deref().unwrap_or("-"))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token_with(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"irrelevant"),
        )
        .unwrap()
    }

    fn target() -> ProbeTarget {
        ProbeTarget {
            printer_id: "p1".into(),
            job_id: None,
            scope: up_print_core::endpoint::EndpointScope::Printer("p1".into()),
        }
    }

    #[test]
    fn claims_are_read_without_verification() {
        let token = token_with(json!({
            "roles": ["Printer.Read.All"],
            "scp": "PrintJob.Create User.Read",
            "aud": "https://graph.microsoft.com",
            "exp": 1
        }));
        let claims = inspect_token(&token).unwrap();
        assert_eq!(
            claims.permissions(),
            vec!["Printer.Read.All", "PrintJob.Create", "User.Read"]
        );
    }

    #[tokio::test]
    async fn probe_lists_missing_roles() {
        let token = token_with(json!({"roles": ["Printer.Read.All"], "appid": "app-1"}));
        let probe = TokenRolesProbe::new(
            token,
            vec!["Printer.Read.All".into(), "PrintJob.ReadWrite.All".into()],
        );
        let record = probe.probe(&target()).await.unwrap();
        assert!(!record.passed);
        assert_eq!(record.summary, "token lacks PrintJob.ReadWrite.All");
        assert!(record.details.contains(&"app id: app-1".to_string()));
    }

    #[tokio::test]
    async fn opaque_token_is_reported_not_raised() {
        let probe = TokenRolesProbe::new("not-a-jwt", vec![]);
        let record = probe.probe(&target()).await.unwrap();
        assert!(!record.passed);
    }
}
