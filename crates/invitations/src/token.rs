use rand_core::{OsRng, RngCore};

const TOKEN_PREFIX: &str = "inv_";

/// Mint a fresh invitation token from `bytes` bytes of OS randomness.
pub fn mint_token(bytes: usize) -> String {
    let mut secret = vec![0u8; bytes];
    OsRng.fill_bytes(&mut secret);
    format!("{}{}", TOKEN_PREFIX, hex::encode(secret))
}
