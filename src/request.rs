use crate::config::ClientConfig;
use crate::error::Error;
use crate::extensions::format_extension_offers;
use url::Url;

// Function used for client connection, parsing the ws/wss URL for
// constructing the handshake request, which includes the
// sec-websocket-key, the URL path, scheme and other relevant info. Also
// returns the address for the TCP socket and the hostname for SNI.
pub(crate) fn construct_http_request(
    ws_url: &str,
    key: &str,
    config: &ClientConfig,
) -> Result<(String, String, String, bool), Error> {
    let parsed_url = Url::parse(ws_url)?;
    let mut use_tls = false;

    // Clause just to validate the user has passed the proper URL scheme,
    // which also decides the default HTTP port
    let default_port: u16 = match parsed_url.scheme() {
        "ws" => 80,
        "wss" => {
            use_tls = true;
            443
        }
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(default_port);

    // The Host header carries the port only when it isn't the default one
    // for the scheme
    let request_host_field = if port == default_port {
        String::from(host)
    } else {
        format!("{}:{}", host, port)
    };

    // We need the port together with the host for establishing the TCP
    // connection, regardless of ws_url being an IP or a domain
    let host_with_port = format!("{}:{}", host, port);

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    // Since we already have all the info, it isn't worth converting
    // everything to an HTTP request type; we simply assemble the string and
    // convert it to bytes when sending to the server
    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        request_path, request_host_field, key,
    );

    if !config.subprotocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            config.subprotocols.join(", ")
        ));
    }

    if !config.extensions.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Extensions: {}\r\n",
            format_extension_offers(&config.extensions)
        ));
    }

    for (name, value) in &config.extra_headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }

    request.push_str("\r\n");

    Ok((request, host_with_port, String::from(host), use_tls))
}
