use crate::error::{Result, SheetsError};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Google service-account credentials.
#[derive(Debug, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded private key with real newlines (not `\n` escapes).
    pub private_key: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

fn assertion_claims(key: &ServiceAccountKey, issued_at: i64) -> AssertionClaims {
    AssertionClaims {
        iss: key.client_email.clone(),
        scope: SPREADSHEETS_SCOPE.to_string(),
        aud: TOKEN_ENDPOINT.to_string(),
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    }
}

pub(crate) fn parse_encoding_key(key: &ServiceAccountKey) -> Result<EncodingKey> {
    EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetsError::InvalidKey(e.to_string()))
}

fn sign_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String> {
    let encoding_key = parse_encoding_key(key)?;
    let claims = assertion_claims(key, issued_at);
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SheetsError::Auth(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange a signed service-account assertion for a bearer access token.
///
/// POSTs to Google's OAuth2 token endpoint with the JWT-bearer grant type.
pub(crate) async fn fetch_access_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<String> {
    let assertion = sign_assertion(key, Utc::now().timestamp())?;
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SheetsError::Auth(format!("status={status} body={body}")));
    }
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| SheetsError::Auth(format!("unexpected token response: {e}")))?;
    Ok(body.access_token)
}
