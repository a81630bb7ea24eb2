use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Error, Result};

pub(crate) const DEFAULT_ACCOUNT_URL: &str = "https://pa.account.tcl.com";
pub(crate) const DEFAULT_PLATFORM_URL: &str = "https://prod-eu.aws.tcljd.com";
pub(crate) const DEFAULT_COGNITO_URL: &str =
    "https://cognito-identity.eu-central-1.amazonaws.com/";

const CLIENT_ID: &str = "54148614";
const APP_ID: &str = "wx6e1af3fa84fbe523";
const IDENTITY_ID: &str = "eu-central-1:61e8f839-2d72-c035-a2bf-7ef50a856ddd";

pub(crate) const TH_PLATFORM: &str = "android";
pub(crate) const TH_VERSION: &str = "4.8.1";
const TH_APPBUILD: &str = "830";
pub(crate) const USER_AGENT: &str = "Android";

/// Credentials considered stale this close to expiry get refreshed before
/// signing another request.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Temporary AWS credentials for the IoT data plane.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AwsCredentials {
    fn near_expiry(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Why credential validation failed, for the host's configuration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    InvalidCredentials,
    AccountLocked,
    NetworkUnreachable,
}

#[derive(Debug, Clone)]
struct Session {
    saas_token: String,
    country: String,
    aws: AwsCredentials,
}

pub(crate) struct AuthUrls {
    pub account: String,
    pub platform: String,
    pub cognito: String,
}

/// Runs the TCL login chain and caches the resulting session. All client
/// calls go through [`ensure_valid`](AuthProvider::ensure_valid), so expiry
/// is checked at every use site rather than in a background refresher.
pub(crate) struct AuthProvider {
    http: reqwest::Client,
    username: String,
    password_md5: String,
    urls: AuthUrls,
    session: Mutex<Option<Session>>,
}

impl AuthProvider {
    pub fn new(http: reqwest::Client, username: String, password: &str, urls: AuthUrls) -> Self {
        Self {
            http,
            username,
            password_md5: md5_hex(password),
            urls,
            session: Mutex::new(None),
        }
    }

    /// Current AWS credentials, re-running the login chain when they are
    /// missing, expired, or about to expire.
    pub async fn ensure_valid(&self) -> Result<AwsCredentials> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref()
            && !session.aws.near_expiry()
        {
            return Ok(session.aws.clone());
        }
        let session = self.login().await?;
        let credentials = session.aws.clone();
        *guard = Some(session);
        Ok(credentials)
    }

    /// SaaS token and account country for the device-listing API.
    pub async fn saas_context(&self) -> Result<(String, String)> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.login().await?);
        }
        let session = guard.as_ref().expect("session populated above");
        Ok((session.saas_token.clone(), session.country.clone()))
    }

    /// Drop the cached session so the next use re-authenticates.
    pub async fn invalidate(&self) {
        *self.session.lock().await = None;
    }

    /// Configuration-flow entry point: runs the full chain once and folds
    /// the error taxonomy into the enumerated reasons the UI can show.
    pub async fn validate_credentials(&self) -> std::result::Result<(), ValidationFailure> {
        match self.ensure_valid().await {
            Ok(_) => Ok(()),
            Err(Error::AccountLocked) => Err(ValidationFailure::AccountLocked),
            Err(Error::InvalidCredentials | Error::AuthProtocol(_)) => {
                Err(ValidationFailure::InvalidCredentials)
            }
            Err(_) => Err(ValidationFailure::NetworkUnreachable),
        }
    }

    async fn login(&self) -> Result<Session> {
        let (sso_token, country, user_id) = self.account_login().await?;
        let (cognito_token, saas_token) = self.refresh_tokens(&user_id, &sso_token).await?;
        let aws = self.aws_credentials(&cognito_token).await?;
        info!(expires_at = %aws.expires_at, "TCL login chain complete");
        Ok(Session { saas_token, country, aws })
    }

    async fn account_login(&self) -> Result<(String, String, String)> {
        let url = format!("{}/account/login?clientId={CLIENT_ID}", self.urls.account);
        let body = json!({
            "equipment": 2,
            "password": self.password_md5,
            "osType": 1,
            "username": self.username,
            "clientVersion": TH_VERSION,
            "osVersion": "6.0",
            "deviceModel": "Android SDK built for x86",
            "captchaRule": 2,
            "channel": "app",
        });

        debug!(url = %url, "account login");
        let resp = self
            .http
            .post(&url)
            .header("th_platform", TH_PLATFORM)
            .header("th_version", TH_VERSION)
            .header("th_appbuild", TH_APPBUILD)
            .header("user-agent", USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => {}
            423 | 429 => return Err(Error::AccountLocked),
            401 | 403 => return Err(Error::InvalidCredentials),
            s => return Err(Error::Server { status: s }),
        }

        #[derive(Deserialize)]
        struct LoginUser {
            #[serde(rename = "countryAbbr")]
            country_abbr: Option<String>,
            username: Option<String>,
        }
        #[derive(Deserialize)]
        struct LoginResponse {
            token: Option<String>,
            user: Option<LoginUser>,
        }

        let text = resp.text().await?;
        let parsed: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| Error::AuthProtocol(format!("login response: {e}")))?;

        // The service answers 200 with no token for wrong passwords.
        let token = parsed.token.ok_or(Error::InvalidCredentials)?;
        let user = parsed
            .user
            .ok_or_else(|| Error::AuthProtocol("login response missing user".to_string()))?;
        let country = user
            .country_abbr
            .ok_or_else(|| Error::AuthProtocol("login response missing countryAbbr".to_string()))?;
        let user_id = user
            .username
            .ok_or_else(|| Error::AuthProtocol("login response missing username".to_string()))?;

        Ok((token, country, user_id))
    }

    async fn refresh_tokens(&self, user_id: &str, sso_token: &str) -> Result<(String, String)> {
        let url = format!("{}/v3/auth/refresh_tokens", self.urls.platform);
        let body = json!({
            "userId": user_id,
            "ssoToken": sso_token,
            "appId": APP_ID,
        });

        debug!(url = %url, "exchanging SSO token for SaaS/Cognito tokens");
        let resp = self
            .http
            .post(&url)
            .header("user-agent", USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => return Err(Error::InvalidCredentials),
            s => return Err(Error::Server { status: s }),
        }

        #[derive(Deserialize)]
        struct RefreshData {
            #[serde(rename = "cognitoToken")]
            cognito_token: Option<String>,
            #[serde(rename = "saasToken")]
            saas_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct RefreshResponse {
            data: Option<RefreshData>,
        }

        let text = resp.text().await?;
        let parsed: RefreshResponse = serde_json::from_str(&text)
            .map_err(|e| Error::AuthProtocol(format!("refresh_tokens response: {e}")))?;
        let data = parsed
            .data
            .ok_or_else(|| Error::AuthProtocol("refresh_tokens response missing data".to_string()))?;
        let cognito = data
            .cognito_token
            .ok_or_else(|| Error::AuthProtocol("refresh_tokens missing cognitoToken".to_string()))?;
        let saas = data
            .saas_token
            .ok_or_else(|| Error::AuthProtocol("refresh_tokens missing saasToken".to_string()))?;
        Ok((cognito, saas))
    }

    async fn aws_credentials(&self, cognito_token: &str) -> Result<AwsCredentials> {
        let body = json!({
            "IdentityId": IDENTITY_ID,
            "Logins": { "cognito-identity.amazonaws.com": cognito_token },
        });

        debug!(url = %self.urls.cognito, "exchanging Cognito token for AWS credentials");
        let resp = self
            .http
            .post(&self.urls.cognito)
            .header("x-amz-target", "AWSCognitoIdentityService.GetCredentialsForIdentity")
            .header("content-type", "application/x-amz-json-1.1")
            .body(body.to_string())
            .send()
            .await?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => {}
            400 | 401 | 403 => return Err(Error::InvalidCredentials),
            s => return Err(Error::Server { status: s }),
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct CognitoCredentials {
            access_key_id: String,
            secret_key: String,
            session_token: String,
            /// Epoch milliseconds.
            expiration: f64,
        }
        #[derive(Deserialize)]
        struct CognitoResponse {
            #[serde(rename = "Credentials")]
            credentials: Option<CognitoCredentials>,
        }

        let text = resp.text().await?;
        let parsed: CognitoResponse = serde_json::from_str(&text)
            .map_err(|e| Error::AuthProtocol(format!("cognito response: {e}")))?;
        let creds = parsed
            .credentials
            .ok_or_else(|| Error::AuthProtocol("cognito response missing Credentials".to_string()))?;
        let expires_at = DateTime::from_timestamp_millis(creds.expiration as i64)
            .ok_or_else(|| Error::AuthProtocol("cognito Expiration out of range".to_string()))?;

        Ok(AwsCredentials {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_key,
            session_token: creds.session_token,
            expires_at,
        })
    }
}

pub(crate) fn md5_hex(input: &str) -> String {
    HEXLOWER.encode(&Md5::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vector() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn near_expiry_margin() {
        let live = AwsCredentials {
            access_key_id: "a".into(),
            secret_access_key: "s".into(),
            session_token: "t".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(!live.near_expiry());

        let stale = AwsCredentials {
            expires_at: Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS / 2),
            ..live.clone()
        };
        assert!(stale.near_expiry());

        let expired = AwsCredentials {
            expires_at: Utc::now() - Duration::hours(1),
            ..live
        };
        assert!(expired.near_expiry());
    }
}
