//! Token minter: random bearer values with fixed entropy per artifact.

use crate::error::OAuth2Error;
use base64::Engine;

pub const AUTHORIZATION_CODE_BYTES: usize = 32;
pub const ACCESS_TOKEN_BYTES: usize = 64;
pub const REFRESH_TOKEN_BYTES: usize = 64;
pub const DEVICE_SECRET_BYTES: usize = 64;

/// `len` bytes from the operating system RNG, standard base64 with padding.
pub fn random_value(len: usize) -> Result<String, OAuth2Error> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
