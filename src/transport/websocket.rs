//! WebSocket transport implementation
//!
//! Wraps a `tokio-tungstenite` stream in a [`Channel`]. Each channel runs an
//! outbound task draining a send queue into the socket and an inbound task
//! feeding received frames into a receive queue, so sends never wait on a
//! pending read.

use super::{Channel, Result, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async_with_config, connect_async, WebSocketStream};
use tracing::{debug, info, instrument, warn};

/// A [`Channel`] over an established WebSocket
pub struct WebSocketChannel {
    /// Outbound queue; `None` once closed locally
    send_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,

    /// Inbound frames, or the error that ended the stream
    recv_rx: Mutex<mpsc::UnboundedReceiver<Result<Bytes>>>,
}

impl WebSocketChannel {
    /// Take ownership of an upgraded stream and start its I/O tasks
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (send_tx, mut send_rx) = mpsc::unbounded_channel::<Bytes>();
        let (recv_tx, recv_rx) = mpsc::unbounded_channel::<Result<Bytes>>();

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        tokio::spawn(async move {
            while let Some(frame) = send_rx.recv().await {
                let message = match String::from_utf8(frame.to_vec()) {
                    Ok(text) => WsMessage::text(text),
                    Err(e) => WsMessage::binary(e.into_bytes()),
                };

                if let Err(e) = ws_sink.send(message).await {
                    warn!("Failed to send WebSocket frame: {}", e);
                    break;
                }
            }

            // Queue closed locally or socket failed
            let _ = ws_sink.close().await;
            debug!("Outbound WebSocket task ended");
        });

        tokio::spawn(async move {
            while let Some(ws_msg) = ws_stream.next().await {
                let frame = match ws_msg {
                    Ok(WsMessage::Text(text)) => Bytes::from(text),
                    Ok(WsMessage::Binary(data)) => data,
                    Ok(WsMessage::Close(_)) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                    Ok(WsMessage::Frame(_)) => {
                        warn!("Received unexpected raw frame");
                        continue;
                    }
                    Err(e) => {
                        let _ = recv_tx.send(Err(e.into()));
                        break;
                    }
                };

                if recv_tx.send(Ok(frame)).is_err() {
                    break;
                }
            }

            debug!("Inbound WebSocket task ended");
        });

        Self {
            send_tx: Mutex::new(Some(send_tx)),
            recv_rx: Mutex::new(recv_rx),
        }
    }
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn send(&self, frame: Bytes) -> Result<()> {
        let guard = self.send_tx.lock().await;
        let tx = guard.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(frame).map_err(|_| TransportError::ConnectionClosed)
    }

    async fn receive(&self) -> Result<Bytes> {
        self.recv_rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(TransportError::ConnectionClosed))
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender lets the outbound task send a close frame
        self.send_tx.lock().await.take();
        Ok(())
    }
}

/// Connect to a relay at `url` (`ws://host:port/path`)
#[instrument]
pub async fn dial(url: &str) -> Result<WebSocketChannel> {
    if !url.starts_with("ws://") {
        return Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: "only ws:// URLs are supported".to_string(),
        });
    }

    let (ws_stream, _response) = connect_async(url).await?;
    info!("Connected to relay at {}", url);

    Ok(WebSocketChannel::from_stream(ws_stream))
}

/// TCP listener that upgrades connections on a single HTTP path
pub struct WebSocketListener {
    tcp_listener: TcpListener,
    path: String,
    max_message_size: Option<usize>,
}

/// An accepted TCP connection that has not completed the WebSocket handshake
pub struct PendingUpgrade {
    stream: TcpStream,
    remote_addr: SocketAddr,
    path: String,
    max_message_size: Option<usize>,
}

impl WebSocketListener {
    /// Bind to `addr`, accepting upgrades on `path` only
    pub async fn bind(addr: SocketAddr, path: impl Into<String>) -> Result<Self> {
        let tcp_listener = TcpListener::bind(addr).await?;

        Ok(Self {
            tcp_listener,
            path: path.into(),
            max_message_size: None,
        })
    }

    /// Refuse inbound messages larger than `max` bytes during reassembly
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = Some(max);
        self
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.tcp_listener.local_addr()?)
    }

    /// Wait for the next TCP connection
    ///
    /// The handshake is left to [`PendingUpgrade::upgrade`] so a slow client
    /// does not hold up the accept loop.
    pub async fn accept(&self) -> Result<PendingUpgrade> {
        let (stream, remote_addr) = self.tcp_listener.accept().await?;

        Ok(PendingUpgrade {
            stream,
            remote_addr,
            path: self.path.clone(),
            max_message_size: self.max_message_size,
        })
    }
}

impl PendingUpgrade {
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Complete the handshake; requests for other paths get a 404
    pub async fn upgrade(self) -> Result<WebSocketChannel> {
        let expected = self.path;
        let check_path = move |request: &HandshakeRequest, response: HandshakeResponse| {
            if request.uri().path() == expected {
                Ok(response)
            } else {
                let mut rejection = ErrorResponse::new(Some("not found".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        };

        let config = WebSocketConfig::default()
            .max_message_size(self.max_message_size)
            .max_frame_size(self.max_message_size);

        let ws_stream = accept_hdr_async_with_config(self.stream, check_path, Some(config)).await?;
        debug!("Upgraded connection from {}", self.remote_addr);

        Ok(WebSocketChannel::from_stream(ws_stream))
    }
}
