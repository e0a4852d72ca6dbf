use crate::config::ClientConfig;
use crate::connection::{Negotiated, WSConnection};
use crate::error::{Error, HandshakeError};
use crate::extensions::{build_hooks, parse_extensions, validate_accepted, Extension};
use crate::read::ReadStream;
use crate::request::construct_http_request;
use crate::split::{WSReader, WSWriter};
use crate::stream::{wrap_tls, SockWaveStream};
use crate::utils::{generate_websocket_accept_value, generate_websocket_key};
use crate::write::Writer;
use bytes::{Buf, BytesMut};
use log::debug;
use std::sync::Arc;
use tokio::io::{split, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::channel;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

const HTTP_RESPONSE_DELIMITER: &[u8] = b"\r\n\r\n";
const SWITCHING_PROTOCOLS: u16 = 101;

// Limit the amount of header data read, so a malicious server can't
// stream an endless header block
const MAX_RESPONSE_HEADER: usize = 1024 * 16;

// How many HTTP headers do we support during parsing?
const MAX_NUM_HEADERS: usize = 32;

/// Connects to a `ws://` or `wss://` URL with the default configuration.
pub async fn connect_async(addr: &str) -> Result<WSConnection, Error> {
    connect_async_with_config(addr, None).await
}

/// Connects with an explicit configuration: timeouts, size limits,
/// subprotocol and extension offers, extra headers and TLS settings.
///
/// The whole opening handshake (TCP connect, TLS setup, upgrade request
/// and response) races against `connect_timeout`; when the timer wins the
/// attempt is abandoned and `HandshakeError::Timeout` is returned.
pub async fn connect_async_with_config(
    addr: &str,
    config: Option<ClientConfig>,
) -> Result<WSConnection, Error> {
    let config = config.unwrap_or_default();
    let key = generate_websocket_key();
    let (request, host_with_port, host, use_tls) = construct_http_request(addr, &key, &config)?;

    let handshake = open_connection(&request, &host_with_port, &host, use_tls, &key, &config);
    let (stream, negotiated, leftover) = match timeout(config.connect_timeout, handshake).await {
        Ok(result) => result?,
        Err(_) => Err(HandshakeError::Timeout)?,
    };

    Ok(spawn_connection(stream, leftover, negotiated, config))
}

async fn open_connection(
    request: &str,
    host_with_port: &str,
    host: &str,
    use_tls: bool,
    key: &str,
    config: &ClientConfig,
) -> Result<(SockWaveStream, Negotiated, BytesMut), Error> {
    let tcp_stream = TcpStream::connect(host_with_port).await?;
    let mut stream = if use_tls {
        wrap_tls(tcp_stream, host, config).await?
    } else {
        SockWaveStream::Plain(tcp_stream)
    };

    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    // Receive until two consecutive CRLFs delimit the response header block
    let mut buf = BytesMut::with_capacity(1024);
    let header_end = loop {
        if let Some(pos) = find_delimiter(&buf) {
            break pos + HTTP_RESPONSE_DELIMITER.len();
        }
        if buf.len() > MAX_RESPONSE_HEADER {
            Err(HandshakeError::MalformedResponse)?;
        }
        let read = stream.read_buf(&mut buf).await?;
        if read == 0 {
            Err(HandshakeError::MalformedResponse)?;
        }
    };

    let negotiated = validate_response(&buf[..header_end], key, config)?;
    debug!("handshake complete, negotiated: {:?}", negotiated);

    // Anything the server sent past the header block is already frame
    // data and must seed the ingress buffer
    buf.advance(header_end);
    Ok((stream, negotiated, buf))
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(HTTP_RESPONSE_DELIMITER.len())
        .position(|window| window == HTTP_RESPONSE_DELIMITER)
}

fn header_value<'a>(headers: &'a [httparse::Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .and_then(|header| std::str::from_utf8(header.value).ok())
        .map(str::trim)
}

fn validate_response(bytes: &[u8], key: &str, config: &ClientConfig) -> Result<Negotiated, Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_NUM_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    let status = response.parse(bytes).map_err(HandshakeError::from)?;
    if status.is_partial() {
        Err(HandshakeError::MalformedResponse)?;
    }

    let code = response.code.ok_or(HandshakeError::MalformedResponse)?;
    if code != SWITCHING_PROTOCOLS {
        Err(HandshakeError::Rejected(code))?;
    }

    let upgrade =
        header_value(response.headers, "upgrade").ok_or(HandshakeError::MalformedResponse)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        Err(HandshakeError::MalformedResponse)?;
    }

    let connection =
        header_value(response.headers, "connection").ok_or(HandshakeError::MalformedResponse)?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        Err(HandshakeError::MalformedResponse)?;
    }

    // The accept key is the proof that the peer actually speaks WebSocket
    // instead of being an unrelated HTTP server that answered 101
    let accept =
        header_value(response.headers, "sec-websocket-accept").ok_or(HandshakeError::BadAcceptKey)?;
    if accept != generate_websocket_accept_value(key) {
        Err(HandshakeError::BadAcceptKey)?;
    }

    let protocol = match header_value(response.headers, "sec-websocket-protocol") {
        Some(proto) => {
            if !config.subprotocols.iter().any(|offered| offered == proto) {
                Err(HandshakeError::UnofferedSubprotocol(proto.to_string()))?;
            }
            Some(proto.to_string())
        }
        None => None,
    };

    // The extensions header may appear multiple times; every accepted
    // entry must be one the client offered
    let extensions: Vec<Extension> = response
        .headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("sec-websocket-extensions"))
        .filter_map(|header| std::str::from_utf8(header.value).ok())
        .flat_map(parse_extensions)
        .collect();
    validate_accepted(&config.extensions, &extensions)?;

    Ok(Negotiated {
        protocol,
        extensions,
    })
}

// Splits the stream, hands the write half to the shared writer and spawns
// the reading task that feeds the caller's message stream
fn spawn_connection(
    stream: SockWaveStream,
    leftover: BytesMut,
    negotiated: Negotiated,
    config: ClientConfig,
) -> WSConnection {
    let (read_half, write_half) = split(stream);
    let writer = Arc::new(Mutex::new(Writer::new(write_half)));
    let (read_tx, read_rx) = channel(100);

    let (incoming_hook, outgoing_hook) = build_hooks(&negotiated.extensions);
    let read_stream = ReadStream::new(
        read_half,
        leftover,
        read_tx,
        writer.clone(),
        config.web_socket_config.clone(),
        incoming_hook,
    );
    tokio::spawn(read_stream.run());

    let ws_writer = WSWriter::new(writer, config.web_socket_config, outgoing_hook);
    WSConnection::new(WSReader::new(ReceiverStream::new(read_rx)), ws_writer, negotiated)
}
