use thiserror::Error;

/// Error taxonomy for the Hue Entertainment core.
///
/// Per-operation errors are contained at the Bridge Client boundary and
/// turned into one of these variants; session-scoped errors (`AuthFailure`,
/// `StreamHandshakeFailed`, `StreamUnavailable`) are terminal for the current
/// session and always trigger `restore_originals()` in the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing/invalid `lightIds`, `output`, `username`, or `clientkey` at init.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error talking to the REST endpoint or the UDP/DTLS peer.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed JSON or an unexpected top-level shape in a bridge reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A `GET` returned the bridge's array error envelope.
    #[error("bridge authentication failed")]
    AuthFailure,

    /// A `PUT` response carried `error.description`.
    #[error("bridge error: {0}")]
    BridgeError(String),

    /// The entertainment group could not be claimed within the retry budget.
    #[error("entertainment group unavailable for streaming")]
    StreamUnavailable,

    /// The DTLS-PSK handshake failed after all attempts.
    #[error("DTLS handshake with bridge failed")]
    StreamHandshakeFailed,

    /// `write()` was called with fewer RGB triples than configured lights.
    #[error("frame has fewer entries than configured lights")]
    Misconfigured,

    /// A Sink's `write` was called before the Light Model was populated.
    #[error("device not ready: light model is empty")]
    NotReady,
}

impl Error {
    /// `write()` and friends report failures as a negative int to their
    /// host harness; every variant maps onto the same `-1` contract.
    pub fn as_status_code(&self) -> i32 {
        -1
    }
}

/// Out-of-band signals the core surfaces to its caller alongside (or instead
/// of) a hard error — things a caller may *act* on but that do not themselves
/// abort the current operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Lifecycle signal: streaming armed/disarmed.
    EnableStateChanged(bool),
    /// A light reported a model id that matched none of the three gamut sets.
    UnknownModel(String),
    /// A configured light id exceeds the 1-byte range the stream frame encodes.
    LightIdOutOfRange(u32),
    /// `PUT /groups/{id}` success echoed a `stream/active` flip.
    StreamActiveChanged(bool),
}

pub type Result<T> = std::result::Result<T, Error>;
