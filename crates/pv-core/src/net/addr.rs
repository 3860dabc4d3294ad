//! Codecs for the kernel's hex address rendering.
//!
//! Socket and route tables print addresses as fixed-width uppercase hex
//! tokens. An IPv4 address is one 32-bit word in the kernel's native byte
//! order, so `0100007F` is 127.0.0.1 on a little-endian host and 1.0.0.127
//! on a big-endian one. An IPv6 token carries the sixteen address bytes in
//! written order. Socket tables join a hex port to the address with `:`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pv_common::{Error, Result};

/// Family hint for [`decode_addr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyHint {
    V4,
    V6,
    /// Infer from token length: 8 hex digits is IPv4, 32 is IPv6.
    Auto,
}

/// Decode a kernel hex address token.
///
/// Fails with an address decode error when the token length matches
/// neither family, the digits are not hex, or the length contradicts an
/// explicit hint.
pub fn decode_addr(token: &str, hint: FamilyHint) -> Result<IpAddr> {
    if !is_hex_token(token) {
        return Err(Error::AddressDecode(token.to_string()));
    }
    match (hint, token.len()) {
        (FamilyHint::V4 | FamilyHint::Auto, 8) => {
            let word = u32::from_str_radix(token, 16)
                .map_err(|_| Error::AddressDecode(token.to_string()))?;
            // The token is a native-order word; to_be() yields the
            // network-order value Ipv4Addr expects on either endianness.
            Ok(IpAddr::V4(Ipv4Addr::from(word.to_be())))
        }
        (FamilyHint::V6 | FamilyHint::Auto, 32) => {
            let mut bytes = [0u8; 16];
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&token[i * 2..i * 2 + 2], 16)
                    .map_err(|_| Error::AddressDecode(token.to_string()))?;
            }
            Ok(IpAddr::V6(Ipv6Addr::from(bytes)))
        }
        _ => Err(Error::AddressDecode(token.to_string())),
    }
}

/// Encode an address back into the kernel's hex rendering.
///
/// Exact inverse of [`decode_addr`] on the same host.
pub fn encode_addr(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{:08X}", u32::from(*v4).to_be()),
        IpAddr::V6(v6) => v6
            .octets()
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect(),
    }
}

/// Decode an `ADDR:PORT` endpoint token from a socket table row.
pub fn decode_endpoint(token: &str, hint: FamilyHint) -> Result<(IpAddr, u16)> {
    let (addr_part, port_part) = token
        .rsplit_once(':')
        .ok_or_else(|| Error::AddressDecode(token.to_string()))?;
    let addr = decode_addr(addr_part, hint)?;
    if !is_hex_token(port_part) {
        return Err(Error::AddressDecode(token.to_string()));
    }
    let port = u16::from_str_radix(port_part, 16)
        .map_err(|_| Error::AddressDecode(token.to_string()))?;
    Ok((addr, port))
}

/// Nonempty ASCII hex throughout. `from_str_radix` tolerates a leading
/// sign, which no kernel table emits.
pub(crate) fn is_hex_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_hexdigit())
}
