//! Upstream handshake: direct dial or `SignalR` negotiation then upgrade.
//!
//! The live feed is a `SignalR` 1.5 hub. Before upgrading, the client GETs
//! `{negotiate_url}/negotiate`, reads `ConnectionToken` from the JSON body
//! and the session cookie from `Set-Cookie`, and passes both to
//! `{url}/connect`. The replay simulator skips all of that and is dialled
//! directly.

use std::time::Duration;

use pitwall_core::config::FeedConfig;
use reqwest::Url;
use reqwest::header::{ACCEPT_ENCODING, SET_COOKIE, USER_AGENT};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::error::FeedError;

/// `SignalR` client protocol version spoken by the feed.
pub const CLIENT_PROTOCOL: &str = "1.5";

/// User agent the feed expects from its own clients.
const CLIENT_USER_AGENT: &str = "BestHTTP";

/// Encodings advertised on negotiation and upgrade.
const CLIENT_ACCEPT_ENCODING: &str = "gzip,identity";

/// The upstream socket type.
pub type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How to open the upstream socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Dial `url` as-is.
    Direct {
        /// Full WebSocket URL.
        url: String,
    },
    /// Negotiate a token and cookie, then upgrade at `{socket_base}/connect`.
    SignalR {
        /// HTTP base URL (`.../signalr`).
        negotiate_base: String,
        /// WebSocket base URL (`wss://.../signalr`).
        socket_base: String,
        /// Hub name.
        hub: String,
    },
}

/// What a successful negotiation yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Connection token for the upgrade.
    pub token: String,
    /// `name=value` cookie pairs to send back, if any were set.
    pub cookie: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NegotiateResponse {
    connection_token: String,
}

impl Handshake {
    /// Pick the handshake mode from configuration.
    pub fn from_config(config: &FeedConfig) -> Self {
        match &config.negotiate_url {
            Some(negotiate) => Self::SignalR {
                negotiate_base: negotiate.trim_end_matches('/').to_owned(),
                socket_base: config.url.trim_end_matches('/').to_owned(),
                hub: config.hub.clone(),
            },
            None => Self::Direct {
                url: config.url.clone(),
            },
        }
    }

    /// Short name for logs.
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::SignalR { .. } => "signalr",
        }
    }

    /// Perform the handshake and return an open socket.
    pub async fn connect(&self, http: &reqwest::Client, timeout: Duration) -> Result<FeedSocket, FeedError> {
        match tokio::time::timeout(timeout, self.open(http)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(FeedError::Transport(format!(
                "handshake timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn open(&self, http: &reqwest::Client) -> Result<FeedSocket, FeedError> {
        match self {
            Self::Direct { url } => {
                debug!(%url, "Dialling feed directly");
                let (socket, _response) = connect_async(url.as_str()).await?;
                Ok(socket)
            }
            Self::SignalR {
                negotiate_base,
                socket_base,
                hub,
            } => {
                let negotiated = negotiate(http, negotiate_base, hub).await?;
                info!(has_cookie = negotiated.cookie.is_some(), "Negotiated feed connection token");

                let url = connect_url(socket_base, hub, &negotiated.token)?;
                let mut request = url.as_str().into_client_request()?;
                let headers = request.headers_mut();
                headers.insert("User-Agent", HeaderValue::from_static(CLIENT_USER_AGENT));
                headers.insert("Accept-Encoding", HeaderValue::from_static(CLIENT_ACCEPT_ENCODING));
                if let Some(cookie) = &negotiated.cookie {
                    let value = HeaderValue::from_str(cookie)
                        .map_err(|e| FeedError::Negotiation(format!("unusable cookie: {e}")))?;
                    headers.insert("Cookie", value);
                }

                let (socket, _response) = connect_async(request).await?;
                Ok(socket)
            }
        }
    }
}

/// The `connectionData` value naming the hub.
pub fn connection_data(hub: &str) -> String {
    serde_json::json!([{ "name": hub }]).to_string()
}

/// Build the negotiation URL.
pub fn negotiate_url(base: &str, hub: &str) -> Result<Url, FeedError> {
    let data = connection_data(hub);
    Url::parse_with_params(
        &format!("{base}/negotiate"),
        [("connectionData", data.as_str()), ("clientProtocol", CLIENT_PROTOCOL)],
    )
    .map_err(|e| FeedError::Negotiation(format!("bad negotiate url {base}: {e}")))
}

/// Build the WebSocket upgrade URL carrying the connection token.
pub fn connect_url(base: &str, hub: &str, token: &str) -> Result<Url, FeedError> {
    let data = connection_data(hub);
    Url::parse_with_params(
        &format!("{base}/connect"),
        [
            ("clientProtocol", CLIENT_PROTOCOL),
            ("transport", "webSockets"),
            ("connectionToken", token),
            ("connectionData", data.as_str()),
        ],
    )
    .map_err(|e| FeedError::Negotiation(format!("bad connect url {base}: {e}")))
}

/// Call the negotiation endpoint and extract the token and cookie.
pub async fn negotiate(http: &reqwest::Client, base: &str, hub: &str) -> Result<Negotiated, FeedError> {
    let url = negotiate_url(base, hub)?;
    let response = http
        .get(url)
        .header(USER_AGENT, CLIENT_USER_AGENT)
        .header(ACCEPT_ENCODING, CLIENT_ACCEPT_ENCODING)
        .send()
        .await?
        .error_for_status()?;

    let pairs: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();
    let cookie = (!pairs.is_empty()).then(|| pairs.join("; "));

    let body: NegotiateResponse = response.json().await?;
    Ok(Negotiated {
        token: body.connection_token,
        cookie,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::extract::Query;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn mode_follows_negotiate_url() {
        let mut config = FeedConfig::default();
        assert_eq!(Handshake::from_config(&config).mode(), "direct");

        config.url = "wss://live.example.com/signalr/".into();
        config.negotiate_url = Some("https://live.example.com/signalr".into());
        assert_eq!(
            Handshake::from_config(&config),
            Handshake::SignalR {
                negotiate_base: "https://live.example.com/signalr".into(),
                socket_base: "wss://live.example.com/signalr".into(),
                hub: "Streaming".into(),
            }
        );
    }

    #[test]
    fn connect_url_encodes_token_and_hub() {
        let url = connect_url("wss://live.example.com/signalr", "Streaming", "a+b/c=").unwrap();
        assert_eq!(url.path(), "/signalr/connect");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("connectionToken").map(String::as_str), Some("a+b/c="));
        assert_eq!(params.get("transport").map(String::as_str), Some("webSockets"));
        assert_eq!(
            params.get("connectionData").map(String::as_str),
            Some(r#"[{"name":"Streaming"}]"#)
        );
    }

    async fn fake_negotiate(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        let hub_ok = params.get("connectionData").map(String::as_str) == Some(r#"[{"name":"Streaming"}]"#);
        let token = if hub_ok { "tok-123" } else { "wrong-hub" };
        (
            [
                (header::SET_COOKIE, "GCLB=abc123; path=/; HttpOnly"),
                (header::CONTENT_TYPE, "application/json"),
            ],
            format!(r#"{{"ConnectionToken":"{token}","ConnectionId":"x","ProtocolVersion":"1.5"}}"#),
        )
    }

    #[tokio::test]
    async fn negotiate_reads_token_and_cookie() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/signalr/negotiate", get(fake_negotiate));
        tokio::spawn(async move { axum::serve(listener, app).await });

        let http = reqwest::Client::new();
        let negotiated = negotiate(&http, &format!("http://{addr}/signalr"), "Streaming")
            .await
            .unwrap();
        assert_eq!(
            negotiated,
            Negotiated {
                token: "tok-123".into(),
                cookie: Some("GCLB=abc123".into()),
            }
        );
    }

    #[tokio::test]
    async fn negotiate_failure_is_retryable() {
        let http = reqwest::Client::new();
        let err = negotiate(&http, "http://127.0.0.1:1/signalr", "Streaming").await.err();
        assert!(err.is_some_and(|e| e.is_retryable()));
    }
}
