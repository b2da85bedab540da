//! DTLS-PSK transport to the bridge's Entertainment UDP endpoint: a blocking
//! `std::net::UdpSocket` wrapped in `openssl::ssl::SslStream`, pinned to the
//! cipher suite, peer hostname, and retry rules the bridge actually expects
//! instead of leaving them at OpenSSL defaults.

use anyhow::{Context, Result};
use openssl::ssl::{ErrorCode, SslConnector, SslMethod, SslStream, SslVerifyMode};
use std::io::{self, Read, Write};
use std::net::UdpSocket;
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// The three write outcomes spec.md §7 distinguishes: a transient timeout
/// (retryable against a bounded budget), the peer's close-notify (clean,
/// immediate teardown), and everything else (fatal, no retry).
#[derive(Debug, Error)]
pub enum StreamWriteError {
    #[error("DTLS write timed out")]
    Timeout,
    #[error("peer sent close-notify")]
    PeerCloseNotify,
    #[error("DTLS write failed: {0}")]
    Other(String),
}

/// Sole offered cipher suite.
const CIPHER_LIST: &str = "PSK-AES128-GCM-SHA256";

/// Literal peer hostname handed to the TLS layer — the bridge's
/// self-signed cert does not carry a real SNI-matchable name.
const PEER_HOSTNAME: &str = "Hue";

const UDP_PORT: u16 = 2100;

/// Handshake retry budget.
const MAX_HANDSHAKE_ATTEMPTS: u32 = 4;

/// Pause between handshake attempts.
const INTER_ATTEMPT_PAUSE: Duration = Duration::from_millis(200);

struct ConnectedUdpSocket(UdpSocket);

impl Read for ConnectedUdpSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf)
    }
}

impl Write for ConnectedUdpSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// DTLS retransmit timeout for a given handshake attempt, growing from
/// 400ms to 1000ms across attempts.
fn retransmit_backoff(attempt: u32) -> Duration {
    let ms = 400 + attempt * 200;
    Duration::from_millis(ms.min(1000) as u64)
}

/// One DTLS-PSK session to a bridge's streaming endpoint.
pub struct HueStreamer {
    stream: SslStream<ConnectedUdpSocket>,
}

impl HueStreamer {
    /// Opens the UDP socket and performs the handshake, retrying up to
    /// [`MAX_HANDSHAKE_ATTEMPTS`] times with a pause between attempts.
    /// `psk` is the raw, already hex-decoded client key.
    pub fn connect(address: &str, username: &str, psk: &[u8]) -> Result<Self> {
        let mut last_err = None;

        for attempt in 0..MAX_HANDSHAKE_ATTEMPTS {
            match Self::try_connect_once(address, username, psk, attempt) {
                Ok(streamer) => return Ok(streamer),
                Err(e) => {
                    warn!(attempt, error = %e, "DTLS handshake attempt failed");
                    last_err = Some(e);
                    if attempt + 1 < MAX_HANDSHAKE_ATTEMPTS {
                        sleep(INTER_ATTEMPT_PAUSE);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("DTLS handshake failed with no recorded error")))
    }

    fn try_connect_once(address: &str, username: &str, psk: &[u8], attempt: u32) -> Result<Self> {
        let addr = format!("{address}:{UDP_PORT}");

        let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind UDP socket")?;
        socket.connect(&addr).context("failed to connect UDP socket")?;
        socket.set_read_timeout(Some(retransmit_backoff(attempt))).ok();
        socket.set_write_timeout(Some(Duration::from_secs(2))).ok();

        let socket_wrapper = ConnectedUdpSocket(socket);

        let mut builder =
            SslConnector::builder(SslMethod::dtls()).context("failed to create DTLS connector builder")?;

        builder.set_options(openssl::ssl::SslOptions::NO_DTLSV1);
        builder.set_cipher_list(CIPHER_LIST).context("failed to set PSK cipher list")?;

        // The bridge uses a self-signed cert; verification failures are
        // non-fatal to this session.
        builder.set_verify(SslVerifyMode::NONE);

        let identity = username.as_bytes().to_vec();
        let psk = psk.to_vec();

        builder.set_psk_client_callback(move |_, _, identity_buf, psk_buf| {
            if identity.len() >= identity_buf.len() {
                return Err(openssl::error::ErrorStack::get());
            }
            identity_buf[..identity.len()].copy_from_slice(&identity);
            identity_buf[identity.len()] = 0;

            if psk.len() > psk_buf.len() {
                return Err(openssl::error::ErrorStack::get());
            }
            psk_buf[..psk.len()].copy_from_slice(&psk);

            Ok(psk.len())
        });

        let connector = builder.build();

        let mut ssl = connector
            .configure()
            .context("failed to configure DTLS connector")?
            .into_ssl(PEER_HOSTNAME)
            .context("failed to build ssl session")?;
        ssl.set_mtu(1400).ok();

        let mut stream = SslStream::new(ssl, socket_wrapper)
            .map_err(|e| anyhow::anyhow!("failed to create DTLS stream: {e}"))?;

        stream.connect().map_err(|e| anyhow::anyhow!("DTLS handshake failed: {e}"))?;

        Ok(HueStreamer { stream })
    }

    /// Writes one frame via the raw `SSL_write`, looping on want-read/
    /// want-write and classifying any other failure into one of
    /// [`StreamWriteError`]'s three outcomes so the tick loop can tell a
    /// retryable timeout from a fatal error.
    pub fn write_all(&mut self, buf: &[u8]) -> std::result::Result<(), StreamWriteError> {
        let mut written = 0;

        while written < buf.len() {
            match self.stream.ssl_write(&buf[written..]) {
                Ok(n) => written += n,
                Err(e) => match e.code() {
                    ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => continue,
                    ErrorCode::ZERO_RETURN => return Err(StreamWriteError::PeerCloseNotify),
                    _ => {
                        if e.io_error().is_some_and(|io_err| {
                            matches!(io_err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
                        }) {
                            return Err(StreamWriteError::Timeout);
                        }
                        return Err(StreamWriteError::Other(e.to_string()));
                    }
                },
            }
        }

        Ok(())
    }

    /// Best-effort close-notify; the caller swallows the result.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().map(|_| ())
    }
}
