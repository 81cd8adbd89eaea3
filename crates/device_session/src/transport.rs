use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsConn = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the persistent bidirectional connection to the device. Abstracted
/// so tests can script connects and observe frames without a network.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<DeviceLink>;
}

/// One live connection, split so sending and receiving can run
/// concurrently. The supervisor owns exactly one of these at a time.
pub struct DeviceLink {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<()>;
    async fn close(&mut self);
}

#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame; `None` once the connection is closed.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

/// A manually supplied endpoint wins verbatim; otherwise the endpoint is
/// derived from the application's HTTP origin, upgrading to the secure
/// scheme when the origin itself is secure. Deterministic, so retries
/// always target the same address.
pub fn resolve_endpoint(manual: Option<&str>, origin: &str) -> Result<String> {
    if let Some(manual) = manual {
        let manual = manual.trim();
        if !manual.is_empty() {
            return Ok(manual.to_string());
        }
    }

    let base = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        bail!("origin must start with http:// or https://: {origin}");
    };

    let endpoint = format!("{}/ws", base.trim_end_matches('/'));
    Url::parse(&endpoint).with_context(|| format!("invalid device endpoint: {endpoint}"))?;
    Ok(endpoint)
}

pub struct WebSocketTransport;

#[async_trait]
impl DeviceTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<DeviceLink> {
        let (ws, _) = connect_async(endpoint)
            .await
            .with_context(|| format!("failed to connect device websocket: {endpoint}"))?;
        let (sink, stream) = ws.split();
        Ok(DeviceLink {
            sink: Box::new(WsSink(sink)),
            stream: Box::new(WsStream(stream)),
        })
    }
}

struct WsSink(SplitSink<WsConn, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.0.send(Message::Text(frame)).await.map_err(Into::into)
    }

    async fn close(&mut self) {
        let _ = self.0.send(Message::Close(None)).await;
    }
}

struct WsStream(SplitStream<WsConn>);

#[async_trait]
impl FrameStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        while let Some(message) = self.0.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_endpoint_wins_verbatim() {
        let endpoint = resolve_endpoint(Some("ws://10.0.0.7:81/stone"), "https://app.example")
            .expect("endpoint");
        assert_eq!(endpoint, "ws://10.0.0.7:81/stone");
    }

    #[test]
    fn blank_manual_endpoint_falls_through_to_origin() {
        let endpoint = resolve_endpoint(Some("   "), "http://localhost:8787").expect("endpoint");
        assert_eq!(endpoint, "ws://localhost:8787/ws");
    }

    #[test]
    fn secure_origin_yields_secure_scheme() {
        let endpoint = resolve_endpoint(None, "https://kiosk.local").expect("endpoint");
        assert_eq!(endpoint, "wss://kiosk.local/ws");
    }

    #[test]
    fn trailing_slash_on_origin_is_tolerated() {
        let endpoint = resolve_endpoint(None, "http://kiosk.local/").expect("endpoint");
        assert_eq!(endpoint, "ws://kiosk.local/ws");
    }

    #[test]
    fn non_http_origin_is_rejected() {
        assert!(resolve_endpoint(None, "ftp://kiosk.local").is_err());
    }
}
