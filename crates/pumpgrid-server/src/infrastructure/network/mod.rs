//! TCP plumbing: the two role listeners and the per-connection sessions.

pub mod edge_session;
pub mod listener;
pub mod web_session;

use std::io::Read;
use std::net::TcpStream;

use pumpgrid_core::Envelope;

/// Outcome of one bounded socket read.
pub(crate) enum ReadOutcome {
    /// A decodable request arrived.
    Request(Envelope),
    /// The read timed out; the peer is merely quiet. Callers re-check the
    /// shutdown flag and keep waiting.
    Idle,
    /// The connection is unusable: orderly close, peer reset, or an
    /// undecodable document. Carries the reason for the log line.
    Closed(String),
}

/// Reads at most `max_bufsize` bytes and decodes them as one JSON envelope.
///
/// The protocol has no framing beyond one document per read, so a single
/// `read` is the whole request.
pub(crate) fn read_envelope(stream: &mut TcpStream, max_bufsize: usize) -> ReadOutcome {
    let mut buf = vec![0u8; max_bufsize];
    match stream.read(&mut buf) {
        Ok(0) => ReadOutcome::Closed("peer closed the connection".to_string()),
        Ok(n) => match Envelope::from_bytes(&buf[..n]) {
            Ok(envelope) => ReadOutcome::Request(envelope),
            Err(e) => ReadOutcome::Closed(format!("undecodable request: {e}")),
        },
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
        {
            ReadOutcome::Idle
        }
        Err(e) => ReadOutcome::Closed(e.to_string()),
    }
}
