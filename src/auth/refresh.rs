use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// 256 bits of entropy per token.
const TOKEN_BYTES: usize = 32;

/// Generate an opaque refresh token: raw CSPRNG output, base64-encoded.
/// The value has no relationship to any signed access token.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
