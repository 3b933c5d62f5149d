//! Protocol library for usbgate
//!
//! Defines the wire-visible surface of the gateway: the JSON request line,
//! the reply texts, and the line framing used over the Unix socket. Replies
//! are plain text; an open device descriptor travels out-of-band as an
//! SCM_RIGHTS control message on the same socket.
//!
//! # Example
//!
//! ```
//! use protocol::{Request, encode_request, decode_request};
//!
//! let req = Request::permission("/dev/bus/usb/001/004");
//! let bytes = encode_request(&req).unwrap();
//! let decoded = decode_request(&bytes).unwrap();
//! assert_eq!(decoded, req);
//! ```

pub mod codec;
pub mod error;
pub mod replies;
pub mod request;

pub use codec::{FD_CARRIER, MAX_REQUEST, decode_request, encode_request};

#[cfg(feature = "async")]
pub use codec::read_request;
pub use error::{ProtocolError, Result};
pub use request::Request;
