use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{
    AuthProvider, AuthUrls, DEFAULT_ACCOUNT_URL, DEFAULT_COGNITO_URL, DEFAULT_PLATFORM_URL,
    TH_PLATFORM, TH_VERSION, USER_AGENT, ValidationFailure, md5_hex,
};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::shadow::ShadowDocument;
use crate::sigv4;
use crate::types::DeviceInfo;
use crate::{Error, Result};

pub(crate) const DEFAULT_IOT_URL: &str =
    "https://a2qjkbbsk6qn2u-ats.iot.eu-central-1.amazonaws.com";
pub(crate) const DEFAULT_REGION: &str = "eu-central-1";

const APP_VERSION: &str = "5.4.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TclClientBuilder {
    username: String,
    password: String,
    region: String,
    account_url: String,
    platform_url: String,
    cognito_url: String,
    iot_url: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl TclClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            region: DEFAULT_REGION.to_string(),
            account_url: DEFAULT_ACCOUNT_URL.to_string(),
            platform_url: DEFAULT_PLATFORM_URL.to_string(),
            cognito_url: DEFAULT_COGNITO_URL.to_string(),
            iot_url: DEFAULT_IOT_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn account_url(mut self, url: impl Into<String>) -> Self {
        self.account_url = url.into();
        self
    }

    pub fn platform_url(mut self, url: impl Into<String>) -> Self {
        self.platform_url = url.into();
        self
    }

    pub fn cognito_url(mut self, url: impl Into<String>) -> Self {
        self.cognito_url = url.into();
        self
    }

    pub fn iot_url(mut self, url: impl Into<String>) -> Self {
        self.iot_url = url.into();
        self
    }

    /// Per-request timeout. Timeouts surface as transport errors, never as
    /// hung polls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> TclClient {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => {
                Some(MessageLogger::new(mode, &path).expect("failed to open log file"))
            }
            _ => None,
        };

        let auth = AuthProvider::new(
            http.clone(),
            self.username,
            &self.password,
            AuthUrls {
                account: self.account_url.trim_end_matches('/').to_string(),
                platform: self.platform_url.trim_end_matches('/').to_string(),
                cognito: self.cognito_url,
            },
        );

        TclClient {
            http,
            auth: Arc::new(auth),
            iot_url: self.iot_url.trim_end_matches('/').to_string(),
            platform_url: self.platform_url.trim_end_matches('/').to_string(),
            region: self.region,
            logger: logger.map(Mutex::new),
        }
    }
}

/// SigV4-signed client for the shadow API plus the account's device
/// inventory. Shareable across tasks; all methods take `&self`.
pub struct TclClient {
    http: reqwest::Client,
    auth: Arc<AuthProvider>,
    iot_url: String,
    platform_url: String,
    region: String,
    logger: Option<Mutex<MessageLogger>>,
}

impl TclClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> TclClientBuilder {
        TclClientBuilder::new(username, password)
    }

    /// Fetch the full shadow document for one device.
    pub async fn get_shadow(&self, device_id: &str) -> Result<ShadowDocument> {
        let url = format!("{}/things/{device_id}/shadow", self.iot_url);
        let (status, body) = self.signed_send(Method::GET, &url, None).await?;

        if let Some(logger) = &self.logger {
            let body_json: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            logger
                .lock()
                .expect("logger mutex poisoned")
                .log_poll(device_id, status, &body_json);
        }

        match status {
            200..=299 => ShadowDocument::parse(&body),
            401 | 403 => Err(Error::AuthExpired),
            404 => Err(Error::DeviceNotFound(device_id.to_string())),
            status => Err(Error::Server { status }),
        }
    }

    /// Publish a desired-state patch containing only the changed fields and
    /// parse the merged document the service echoes back.
    pub async fn update_shadow(
        &self,
        device_id: &str,
        patch: Map<String, Value>,
    ) -> Result<ShadowDocument> {
        let url = format!("{}/things/{device_id}/shadow", self.iot_url);
        let body = json!({
            "state": { "desired": Value::Object(patch) },
            "clientToken": format!("ha-{}", Uuid::new_v4().simple()),
        });

        if let Some(logger) = &self.logger {
            logger
                .lock()
                .expect("logger mutex poisoned")
                .log_command(device_id, &body["state"]["desired"]);
        }

        let (status, text) = self.signed_send(Method::POST, &url, Some(&body)).await?;
        match status {
            200..=299 => ShadowDocument::parse(&text),
            401 | 403 => Err(Error::AuthExpired),
            404 => Err(Error::DeviceNotFound(device_id.to_string())),
            status => Err(Error::Server { status }),
        }
    }

    /// List the devices registered to the authenticated account.
    pub async fn get_devices(&self) -> Result<Vec<DeviceInfo>> {
        let (saas_token, country) = self.auth.saas_context().await?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let sign = md5_hex(&format!("{timestamp}{nonce}{saas_token}"));

        let url = format!("{}/v3/user/get_things", self.platform_url);
        debug!(url = %url, "listing devices");
        let resp = self
            .http
            .post(&url)
            .header("platform", TH_PLATFORM)
            .header("appversion", APP_VERSION)
            .header("thomeversion", TH_VERSION)
            .header("accesstoken", saas_token.as_str())
            .header("countrycode", country.as_str())
            .header("accept-language", "en")
            .header("timestamp", timestamp.as_str())
            .header("nonce", nonce.as_str())
            .header("sign", sign.as_str())
            .header("user-agent", USER_AGENT)
            .json(&json!({}))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        match status {
            200..=299 => {}
            401 | 403 => return Err(Error::AuthExpired),
            status => return Err(Error::Server { status }),
        }

        #[derive(Deserialize)]
        struct ThingsResponse {
            #[serde(default)]
            data: Vec<DeviceInfo>,
        }

        let parsed: ThingsResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Malformed(format!("get_things response: {e}")))?;
        debug!(count = parsed.data.len(), "devices listed");
        Ok(parsed.data)
    }

    /// Drop the cached session and log in again. Used by callers after an
    /// `AuthExpired` error, exactly once per operation.
    pub async fn refresh_credentials(&self) -> Result<()> {
        self.auth.invalidate().await;
        self.auth.ensure_valid().await.map(|_| ())
    }

    /// Run the login chain once and report the enumerated outcome for a
    /// configuration flow.
    pub async fn validate_credentials(&self) -> std::result::Result<(), ValidationFailure> {
        self.auth.validate_credentials().await
    }

    async fn signed_send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, String)> {
        let credentials = self.auth.ensure_valid().await?;

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Malformed(format!("request url {url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => return Err(Error::Malformed(format!("request url without host: {url}"))),
        };

        let payload = match body {
            Some(value) => value.to_string(),
            None => String::new(),
        };

        let signed = sigv4::sign(
            method.as_str(),
            &host,
            parsed.path(),
            parsed.query().unwrap_or(""),
            payload.as_bytes(),
            &credentials,
            &self.region,
            sigv4::SERVICE,
            Utc::now(),
        );

        if let Some(logger) = &self.logger {
            logger
                .lock()
                .expect("logger mutex poisoned")
                .log_request(method.as_str(), parsed.path());
        }

        debug!(method = %method, path = parsed.path(), "signed IoT request");
        let mut request = self
            .http
            .request(method, url)
            .header("x-amz-date", signed.amz_date.as_str())
            .header("x-amz-security-token", credentials.session_token.as_str())
            .header("authorization", signed.authorization.as_str());
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }

        let resp = request.body(payload).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok((status, text))
    }
}
