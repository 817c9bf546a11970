//! eWeLink cloud API client
//!
//! Handles login and the device list endpoint. Every failure comes back as
//! a [`ZeroconfError`] carrying the vendor error code when there is one.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::ZeroconfError;

type HmacSha256 = Hmac<Sha256>;

/// Protocol version sent with every request
const API_VERSION: u8 = 8;

/// Vendor code asking the client to log in against another region
const REDIRECT_CODE: u16 = 301;

/// Resolved settings for talking to the cloud
#[derive(Debug, Clone)]
pub struct CloudSettings {
    pub region: String,
    pub email: String,
    pub password: String,
    pub app_id: String,
    pub app_secret: String,
    /// Fixed base URL, bypassing the regional host
    pub api_url: Option<String>,
    pub timeout: u64,
}

impl CloudSettings {
    fn base_url(&self, region: &str) -> String {
        match self.api_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{region}-api.coolkit.cc:8080"),
        }
    }
}

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub region: String,
}

/// Anything able to produce the user's device list
pub trait DeviceSource {
    async fn get_devices(&self) -> Result<Vec<Device>, ZeroconfError>;
}

/// eWeLink REST API client
pub struct CloudClient {
    client: Client,
    settings: CloudSettings,
}

impl CloudClient {
    pub fn new(settings: CloudSettings) -> Result<Self, ZeroconfError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout))
            .user_agent(format!("ewz/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ZeroconfError::Transport(format!("building HTTP client: {err}")))?;

        Ok(Self { client, settings })
    }

    /// Log in with email and password, following one region redirect
    pub async fn login(&self) -> Result<Session, ZeroconfError> {
        let mut region = self.settings.region.clone();

        for attempt in 0..2 {
            let url = format!("{}/api/user/login", self.settings.base_url(&region));
            let body = serde_json::to_string(&LoginRequest {
                appid: &self.settings.app_id,
                email: &self.settings.email,
                password: &self.settings.password,
                ts: timestamp(),
                version: API_VERSION,
                nonce: nonce(),
            })
            .map_err(|err| ZeroconfError::Parse(format!("encoding login request: {err}")))?;

            log::debug!("POST {url}");
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Sign {}", sign(&self.settings.app_secret, &body)))
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
                .map_err(|err| transport_error(&url, err))?;

            let login: LoginResponse = self.handle_response(response).await?;
            match login.error {
                Some(REDIRECT_CODE) if attempt == 0 && login.region.is_some() => {
                    region = login.region.unwrap_or_default();
                    log::info!("account lives in region '{region}', logging in again");
                    continue;
                }
                Some(code) if code != 0 => {
                    return Err(ZeroconfError::cloud(code, login.msg.as_deref()));
                }
                _ => {}
            }

            let access_token = login
                .at
                .ok_or_else(|| ZeroconfError::Parse("login response without token".to_string()))?;
            return Ok(Session {
                access_token,
                region,
            });
        }

        Err(ZeroconfError::cloud(REDIRECT_CODE, Some("region redirect loop")))
    }

    /// Fetch the full device list for a session
    pub async fn list_devices(&self, session: &Session) -> Result<Vec<Device>, ZeroconfError> {
        let url = format!("{}/api/user/device", self.settings.base_url(&session.region));
        log::debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .query(&[
                ("lang", "en".to_string()),
                ("appid", self.settings.app_id.clone()),
                ("ts", timestamp().to_string()),
                ("version", API_VERSION.to_string()),
                ("getTags", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;

        let list: DeviceListResponse = self.handle_response(response).await?;
        match list.error {
            Some(code) if code != 0 => Err(ZeroconfError::cloud(code, list.msg.as_deref())),
            _ => Ok(list.devicelist),
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ZeroconfError> {
        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("HTTP {status} from {url}: {body}");
            let reason = status.canonical_reason().unwrap_or("");
            return Err(ZeroconfError::cloud(status.as_u16(), Some(reason)));
        }

        response
            .json()
            .await
            .map_err(|err| ZeroconfError::Parse(format!("parsing response from {url}: {err}")))
    }
}

impl DeviceSource for CloudClient {
    async fn get_devices(&self) -> Result<Vec<Device>, ZeroconfError> {
        let session = self.login().await?;
        self.list_devices(&session).await
    }
}

/// HMAC-SHA256 signature of a request body, base64 encoded
pub fn sign(secret: &str, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn transport_error(url: &str, err: reqwest::Error) -> ZeroconfError {
    ZeroconfError::Transport(format!("request to {url} failed: {err}"))
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

// --- API Types ---

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    appid: &'a str,
    email: &'a str,
    password: &'a str,
    ts: i64,
    version: u8,
    nonce: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    at: Option<String>,
    error: Option<u16>,
    msg: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    #[serde(default)]
    devicelist: Vec<Device>,
    error: Option<u16>,
    msg: Option<String>,
}

/// A cloud device. Everything besides the id is kept verbatim, so a saved
/// cache reads back exactly as the cloud returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub deviceid: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Device {
    /// Display name, empty when the cloud sent none
    pub fn name(&self) -> &str {
        self.attributes
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn online(&self) -> bool {
        self.attributes
            .get("online")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Station MAC reported by the device, if any
    pub fn sta_mac(&self) -> Option<&str> {
        self.params
            .get("staMac")
            .and_then(Value::as_str)
            .filter(|mac| !mac.is_empty())
    }
}
