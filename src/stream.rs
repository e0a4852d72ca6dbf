use crate::config::ClientConfig;
use crate::error::Error;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[cfg(not(feature = "feature-native-tls"))]
use pki_types::ServerName;
#[cfg(not(feature = "feature-native-tls"))]
use std::sync::Arc;
#[cfg(not(feature = "feature-native-tls"))]
use tokio_rustls::TlsConnector;

/// The byte transport underneath a connection: plaintext TCP or TLS. The
/// rest of the crate only sees an `AsyncRead + AsyncWrite` stream.
pub enum SockWaveStream {
    Plain(TcpStream),
    #[cfg(not(feature = "feature-native-tls"))]
    Secure(tokio_rustls::client::TlsStream<TcpStream>),
    #[cfg(feature = "feature-native-tls")]
    Secure(tokio_native_tls::TlsStream<TcpStream>),
}

impl AsyncRead for SockWaveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SockWaveStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            SockWaveStream::Secure(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SockWaveStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            SockWaveStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            SockWaveStream::Secure(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SockWaveStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            SockWaveStream::Secure(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SockWaveStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            SockWaveStream::Secure(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Wraps an established TCP stream with TLS for `wss` URLs. The trust
/// anchors are the bundled webpki roots, optionally extended with a
/// caller-supplied CA bundle; the permissive development mode skips
/// certificate verification entirely.
#[cfg(not(feature = "feature-native-tls"))]
pub(crate) async fn wrap_tls(
    stream: TcpStream,
    server_name: &str,
    config: &ClientConfig,
) -> Result<SockWaveStream, Error> {
    let tls_config = build_rustls_config(config)?;
    let connector = TlsConnector::from(Arc::new(tls_config));
    let domain = ServerName::try_from(server_name.to_string())?;

    let tls_stream = connector.connect(domain, stream).await?;
    Ok(SockWaveStream::Secure(tls_stream))
}

#[cfg(not(feature = "feature-native-tls"))]
fn build_rustls_config(config: &ClientConfig) -> Result<rustls::ClientConfig, Error> {
    if config.danger_accept_invalid_certs {
        return Ok(rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoVerification::new()))
            .with_no_client_auth());
    }

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = &config.ca_file {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            root_store
                .add(cert?)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        }
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

#[cfg(feature = "feature-native-tls")]
pub(crate) async fn wrap_tls(
    stream: TcpStream,
    server_name: &str,
    config: &ClientConfig,
) -> Result<SockWaveStream, Error> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.danger_accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
    }

    if let Some(path) = &config.ca_file {
        let pem = std::fs::read(path)?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        builder.add_root_certificate(cert);
    }

    let connector = tokio_native_tls::TlsConnector::from(
        builder
            .build()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?,
    );

    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    Ok(SockWaveStream::Secure(tls_stream))
}

#[cfg(not(feature = "feature-native-tls"))]
mod danger {
    use pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::{DigitallySignedStruct, SignatureScheme};

    // Accepts any certificate the server presents. Signatures are still
    // checked so the session keys stay honest.
    #[derive(Debug)]
    pub(crate) struct NoVerification(CryptoProvider);

    impl NoVerification {
        pub(crate) fn new() -> Self {
            Self(rustls::crypto::aws_lc_rs::default_provider())
        }
    }

    impl ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}
