//! Resolves the gateway endpoint/token bundle for a room.
//!
//! Resolution happens once per connection attempt: the returned token is
//! short-lived, so results must not be cached across reconnects.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REFERER: &str = "https://live.bilibili.com";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No gateway hosts for room {0}")]
    NoHosts(u64),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

/// One gateway host candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayHost {
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub wss_port: u16,
    #[serde(default)]
    pub ws_port: u16,
}

/// Endpoint/token bundle required to open a chat connection.
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    /// Account id the token was issued for.
    pub uid: u64,
    pub token: String,
    /// Host candidates, never empty.
    pub hosts: Vec<GatewayHost>,
}

#[async_trait]
pub trait GatewayResolver: Send + Sync {
    /// Fetch fresh connection info for `room_id`.
    async fn resolve(&self, room_id: u64) -> Result<GatewayInfo, GatewayError>;
}

/// Resolver backed by the platform's web API.
pub struct HttpGatewayResolver {
    client: Client,
    domain: String,
    cookie: Option<String>,
}

impl HttpGatewayResolver {
    pub fn new(domain: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            domain: domain.into(),
            cookie: None,
        })
    }

    /// Attach the account's session cookie to resolve requests.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

#[async_trait]
impl GatewayResolver for HttpGatewayResolver {
    async fn resolve(&self, room_id: u64) -> Result<GatewayInfo, GatewayError> {
        #[derive(Deserialize)]
        struct DanmuInfoData {
            uid: u64,
            token: String,
            #[serde(default)]
            host_list: Vec<GatewayHost>,
        }

        #[derive(Deserialize)]
        struct DanmuInfoResp {
            code: i64,
            message: String,
            data: Option<DanmuInfoData>,
        }

        let url = format!(
            "{}/xlive/web-room/v1/index/getDanmuInfo?id={room_id}",
            self.domain
        );
        let mut req = self.client.get(&url).header("Referer", REFERER);
        if let Some(cookie) = &self.cookie {
            req = req.header("Cookie", cookie);
        }

        let resp = req.send().await?;
        let json: DanmuInfoResp = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        if json.code != 0 {
            return Err(GatewayError::Api(json.message));
        }

        let data = json
            .data
            .ok_or_else(|| GatewayError::Parse("Missing danmu info data".to_string()))?;
        if data.host_list.is_empty() {
            return Err(GatewayError::NoHosts(room_id));
        }

        Ok(GatewayInfo {
            uid: data.uid,
            token: data.token,
            hosts: data.host_list,
        })
    }
}
