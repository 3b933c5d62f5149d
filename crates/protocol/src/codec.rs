//! Request line framing
//!
//! Requests are newline-delimited JSON, one request per connection, capped
//! at [`MAX_REQUEST`] bytes. Replies are raw text written back on the same
//! socket; no framing is needed because the gateway closes the stream after
//! writing.

use crate::error::{ProtocolError, Result};
use crate::request::Request;

/// Maximum encoded request size, including the trailing newline
pub const MAX_REQUEST: usize = 4096;

/// Carrier byte for replies that transfer only a descriptor
///
/// SCM_RIGHTS needs at least one byte of ordinary payload to ride on, so a
/// reply with no text carries a single NUL. Receivers strip it.
pub const FD_CARRIER: u8 = 0;

/// Encode a request as a JSON line
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(request)?;
    bytes.push(b'\n');
    if bytes.len() > MAX_REQUEST {
        return Err(ProtocolError::TooLong { limit: MAX_REQUEST });
    }
    Ok(bytes)
}

/// Decode a request from a JSON line (trailing newline optional)
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    if bytes.len() > MAX_REQUEST {
        return Err(ProtocolError::TooLong { limit: MAX_REQUEST });
    }
    Ok(serde_json::from_slice(trim_line(bytes))?)
}

fn trim_line(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
        end -= 1;
    }
    &bytes[..end]
}

/// Read one framed request from an async reader
///
/// Returns `Ok(None)` on a clean EOF before any bytes arrive. A line longer
/// than [`MAX_REQUEST`] is rejected without reading further.
#[cfg(feature = "async")]
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::{AsyncBufReadExt, AsyncReadExt};

    let mut line = Vec::new();
    let mut limited = (&mut *reader).take((MAX_REQUEST + 1) as u64);
    let n = limited.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_REQUEST {
        return Err(ProtocolError::TooLong { limit: MAX_REQUEST });
    }
    decode_request(&line).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let req = Request::open("/dev/bus/usb/003/007");
        let bytes = encode_request(&req).unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
        assert_eq!(decode_request(&bytes).unwrap(), req);
    }

    #[test]
    fn test_decode_without_newline() {
        let req = decode_request(br#"{"action":"list"}"#).unwrap();
        assert_eq!(req, Request::list());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode_request(b"not json\n"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_oversized() {
        let huge = vec![b'x'; MAX_REQUEST + 1];
        assert!(matches!(
            decode_request(&huge),
            Err(ProtocolError::TooLong { .. })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_read_request_eof() {
        let mut reader = tokio::io::BufReader::new(&b""[..]);
        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_read_request_line() {
        let bytes = encode_request(&Request::permission("/dev/bus/usb/001/001")).unwrap();
        let mut reader = tokio::io::BufReader::new(&bytes[..]);
        let req = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(req.device.as_deref(), Some("/dev/bus/usb/001/001"));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_read_request_oversized() {
        let mut big = vec![b'{'; MAX_REQUEST + 64];
        big.push(b'\n');
        let mut reader = tokio::io::BufReader::new(&big[..]);
        assert!(matches!(
            read_request(&mut reader).await,
            Err(ProtocolError::TooLong { .. })
        ));
    }
}
