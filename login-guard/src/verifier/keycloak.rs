//! Keycloak identity verifier
//!
//! Verifies credentials with the OpenID Connect resource-owner password grant
//! against a Keycloak realm's token endpoint. Issued tokens are discarded; only
//! the provider's verdict matters to the guard.
//!
//! Only an `invalid_grant` rejection is a bad credential. Other OAuth errors
//! (`invalid_client`, `unauthorized_client`, ...) mean the client or realm is
//! misconfigured and are reported as [`Verdict::Unavailable`], so they never
//! count against the user.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Credential, IdentityVerifier, Verdict};
use crate::error::{Error, Result};

const SCOPE: &str = "openid profile email";
const INVALID_GRANT: &str = "invalid_grant";

/// Keycloak connection settings
///
/// # Example (config.toml)
///
/// ```toml
/// [keycloak]
/// server_url = "https://sso.example.com"
/// realm = "dating"
/// client_id = "backend"
/// client_secret = "..."
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server
    pub server_url: String,
    /// Realm name
    pub realm: String,
    /// Confidential client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl KeycloakConfig {
    /// Token endpoint of the configured realm
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.server_url.trim_end_matches('/'),
            self.realm
        )
    }
}

/// [`IdentityVerifier`] backed by a Keycloak realm
#[derive(Clone)]
pub struct KeycloakVerifier {
    http_client: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl KeycloakVerifier {
    /// Create a verifier for the given realm
    pub fn new(config: KeycloakConfig) -> Result<Self> {
        let token_url = config.token_url();
        reqwest::Url::parse(&token_url)
            .map_err(|e| Error::Provider(format!("Invalid token URL {}: {}", token_url, e)))?;

        let http_client = HttpClient::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
        })
    }

    /// Token endpoint this verifier posts to
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

/// OAuth 2.0 error response body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a token endpoint response to a verdict
///
/// Keycloak answers a wrong password, or a disabled or unknown user, with
/// `invalid_grant` (401 or 400). Any other error code, an unreadable error
/// body, or any other status is a provider problem.
pub(crate) fn classify_response(status: StatusCode, body: &str) -> Verdict {
    if status.is_success() {
        return Verdict::Verified;
    }
    if status != StatusCode::UNAUTHORIZED && status != StatusCode::BAD_REQUEST {
        return Verdict::Unavailable(format!("token endpoint returned {}", status));
    }

    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(response) if response.error == INVALID_GRANT => Verdict::Invalid,
        Ok(response) => Verdict::Unavailable(format!(
            "token endpoint returned {} {}: {}",
            status,
            response.error,
            response.error_description.unwrap_or_default()
        )),
        Err(_) => Verdict::Unavailable(format!(
            "token endpoint returned {} without an OAuth error body",
            status
        )),
    }
}

#[async_trait]
impl IdentityVerifier for KeycloakVerifier {
    async fn verify(&self, account_id: &str, credential: &Credential) -> Verdict {
        let params = [
            ("grant_type", "password"),
            ("scope", SCOPE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", account_id),
            ("password", credential.expose_secret()),
        ];

        match self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                let verdict = match response.text().await {
                    Ok(body) => classify_response(status, &body),
                    Err(e) => Verdict::Unavailable(format!("failed to read token response: {}", e)),
                };
                if let Verdict::Unavailable(ref reason) = verdict {
                    tracing::warn!(account_id, reason = %reason, "Keycloak verification failed");
                }
                verdict
            }
            Err(e) => {
                tracing::warn!(account_id, error = %e, "Keycloak unreachable");
                Verdict::Unavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn config(server_url: &str) -> KeycloakConfig {
        KeycloakConfig {
            server_url: server_url.to_string(),
            realm: "dating".to_string(),
            client_id: "backend".to_string(),
            client_secret: "s3cret".to_string(),
        }
    }

    #[test]
    fn test_token_url_trims_trailing_slash() {
        assert_eq!(
            config("https://sso.example.com/").token_url(),
            "https://sso.example.com/realms/dating/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(matches!(
            KeycloakVerifier::new(config("not a url")),
            Err(Error::Provider(_))
        ));
    }

    #[test]
    fn test_new_accepts_valid_url() {
        let verifier = KeycloakVerifier::new(config("http://localhost:8080")).unwrap();
        assert_eq!(
            verifier.token_url(),
            "http://localhost:8080/realms/dating/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_classify_response() {
        assert_eq!(classify_response(StatusCode::OK, "{}"), Verdict::Verified);
        assert_eq!(
            classify_response(
                StatusCode::UNAUTHORIZED,
                r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#
            ),
            Verdict::Invalid
        );
        assert_eq!(
            classify_response(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#),
            Verdict::Invalid
        );
        assert!(matches!(
            classify_response(
                StatusCode::BAD_REQUEST,
                r#"{"error":"unauthorized_client","error_description":"Client not allowed for direct access grants"}"#
            ),
            Verdict::Unavailable(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, "<html>proxy login</html>"),
            Verdict::Unavailable(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::SERVICE_UNAVAILABLE, ""),
            Verdict::Unavailable(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"invalid_grant"}"#),
            Verdict::Unavailable(_)
        ));
    }

    /// Serve one canned HTTP response on a local port
    ///
    /// Returns the base URL and a receiver for the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (format!("http://{}", addr), rx)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= content_length
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid() {
        let (url, request) = serve_once(
            "401 Unauthorized",
            r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#,
        )
        .await;
        let verifier = KeycloakVerifier::new(config(&url)).unwrap();

        let verdict = verifier.verify("alice", &Credential::new("wrong")).await;
        assert_eq!(verdict, Verdict::Invalid);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /realms/dating/protocol/openid-connect/token"));
        assert!(request.contains("grant_type=password"));
        assert!(request.contains("scope=openid+profile+email"));
        assert!(request.contains("username=alice"));
    }

    #[tokio::test]
    async fn test_rejected_client_secret_is_unavailable() {
        let (url, _request) = serve_once(
            "401 Unauthorized",
            r#"{"error":"invalid_client","error_description":"Invalid client or Invalid client credentials"}"#,
        )
        .await;
        let verifier = KeycloakVerifier::new(config(&url)).unwrap();

        let verdict = verifier.verify("alice", &Credential::new("password")).await;
        assert!(matches!(verdict, Verdict::Unavailable(reason) if reason.contains("invalid_client")));
    }

    #[tokio::test]
    async fn test_valid_password_is_verified() {
        let (url, _request) = serve_once(
            "200 OK",
            r#"{"access_token":"a","refresh_token":"r","token_type":"Bearer","expires_in":300}"#,
        )
        .await;
        let verifier = KeycloakVerifier::new(config(&url)).unwrap();

        let verdict = verifier.verify("alice", &Credential::new("password")).await;
        assert_eq!(verdict, Verdict::Verified);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", config("https://sso.example.com"));
        assert!(!debug.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let verifier = KeycloakVerifier::new(config("http://127.0.0.1:9")).unwrap();
        let verdict = verifier
            .verify("alice", &Credential::new("password"))
            .await;
        assert!(matches!(verdict, Verdict::Unavailable(_)));
    }
}
