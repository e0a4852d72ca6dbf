use crate::extensions::Extension;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    /// Hard deadline for the whole opening handshake: TCP connect, TLS
    /// setup and the HTTP upgrade exchange.
    pub connect_timeout: Duration,
    /// Ordered subprotocol list offered through `Sec-WebSocket-Protocol`.
    pub subprotocols: Vec<String>,
    /// Extensions offered through `Sec-WebSocket-Extensions`.
    pub extensions: Vec<Extension>,
    /// Additional request headers sent verbatim, e.g. `Origin` or auth.
    pub extra_headers: Vec<(String, String)>,
    /// Path to a PEM bundle appended to the default trust anchors.
    pub ca_file: Option<String>,
    /// Skips server certificate verification. Development only.
    pub danger_accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            web_socket_config: WebSocketConfig::default(),
            connect_timeout: Duration::from_secs(10),
            subprotocols: Vec::new(),
            extensions: Vec::new(),
            extra_headers: Vec::new(),
            ca_file: None,
            danger_accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Ingress limit per frame; a frame declaring a bigger payload fails the
    /// connection with close code 1009. `None` means unlimited.
    pub max_frame_size: Option<usize>,
    /// Limit per reassembled message, same close code. `None` means unlimited.
    pub max_message_size: Option<usize>,
    /// Whether received pings are answered with a pong automatically.
    pub auto_pong: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: Some(64 << 20),
            max_frame_size: Some(16 << 20),
            auto_pong: true,
        }
    }
}
