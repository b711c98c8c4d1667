// src/core/credentials.rs

//! SASL `PLAIN` response encoding.

use bytes::{BufMut, Bytes, BytesMut};

const NUL: u8 = 0;

/// Builds the `PLAIN` mechanism response sent in connection-start-ok.
///
/// The layout is `\0` + username + `\0` + password with an empty
/// authorization identity. Brokers compare it byte for byte.
pub fn plain_response(username: &str, password: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(username.len() + password.len() + 2);
    buf.put_u8(NUL);
    buf.put_slice(username.as_bytes());
    buf.put_u8(NUL);
    buf.put_slice(password.as_bytes());
    buf.freeze()
}
