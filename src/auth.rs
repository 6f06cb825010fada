//! Service account authorization for the Google Analytics Data API.
//!
//! Implements the OAuth2 JWT bearer grant: a self-signed RS256 assertion is
//! exchanged at the token endpoint for a short-lived access token.

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL},
    Engine as _,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AuthError;

/// OAuth2 scopes requested for the assertion.
pub const SCOPES: [&str; 2] = [
    // View and manage your Google Analytics data
    "https://www.googleapis.com/auth/analytics",
    // See and download your Google Analytics data
    "https://www.googleapis.com/auth/analytics.readonly",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Service account identity.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    /// PKCS#8 PEM private key
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// OAuth2 token response from Google.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
}

/// Decode a PEM block into DER bytes.
fn pem_to_der(pem: &str) -> Result<Vec<u8>, AuthError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(AuthError::InvalidKey("no PEM body found".to_string()));
    }
    BASE64
        .decode(body.as_bytes())
        .map_err(|e| AuthError::InvalidKey(format!("bad base64 in PEM body: {}", e)))
}

/// Authorizes requests with a service account.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    token_url: String,
    http_client: Client,
}

impl ServiceAccountAuth {
    /// Create a new authorizer.
    pub fn new(
        credentials: ServiceAccountCredentials,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            credentials,
            token_url: token_url.into(),
            http_client,
        })
    }

    /// Build a signed JWT assertion issued at `now`.
    pub fn build_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let der = pem_to_der(&self.credentials.private_key)?;
        let key_pair =
            RsaKeyPair::from_pkcs8(&der).map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let encode_segment = |bytes: Vec<u8>| BASE64_URL.encode(bytes);
        let header_json =
            serde_json::to_vec(&header).map_err(|e| AuthError::TokenParse(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| AuthError::TokenParse(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            encode_segment(header_json),
            encode_segment(claims_json)
        );

        let rng = SystemRandom::new();
        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(&RSA_PKCS1_SHA256, &rng, signing_input.as_bytes(), &mut signature)
            .map_err(|_| AuthError::Signing)?;

        Ok(format!("{}.{}", signing_input, BASE64_URL.encode(signature)))
    }

    /// Run the authorization handshake and return a bearer token.
    pub async fn authorize(&self) -> Result<String, AuthError> {
        let assertion = self.build_assertion(Utc::now())?;

        tracing::debug!(
            token_url = %self.token_url,
            client_email = %self.credentials.client_email,
            "requesting access token"
        );

        let body = format!(
            "grant_type={}&assertion={}",
            urlencoding::encode(JWT_BEARER_GRANT),
            urlencoding::encode(&assertion)
        );

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, %body, "token request failed");
            return Err(AuthError::TokenRequestFailed { status, body });
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::TokenParse(format!("Failed to parse token response: {}", e))
        })?;

        tracing::debug!(expires_in = token_response.expires_in, "access token acquired");

        Ok(token_response.access_token)
    }
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.credentials.client_email)
            .field("token_url", &self.token_url)
            .finish()
    }
}
