use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Random bytes behind every issued token (256 bits).
pub const TOKEN_BYTES: usize = 32;

fn random_bytes() -> [u8; TOKEN_BYTES] {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Opaque refresh token: 64 lowercase hex characters.
pub fn generate_refresh_token() -> String {
    hex::encode(random_bytes())
}

/// URL-safe anti-forgery token: 43 base64 characters, no padding.
pub fn generate_anti_forgery_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes())
}

/// Equal-length inputs are compared in constant time; any length mismatch is false.
pub fn constant_time_eq(stored: &str, presented: &str) -> bool {
    if stored.len() != presented.len() {
        return false;
    }
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_token_is_256_bit_hex() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_refresh_token());
    }

    #[test]
    fn anti_forgery_token_is_url_safe() {
        for _ in 0..100 {
            let token = generate_anti_forgery_token();
            assert_eq!(token.len(), 43);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn constant_time_eq_matches_only_identical_strings() {
        let token = generate_anti_forgery_token();
        assert!(constant_time_eq(&token, &token.clone()));
        assert!(!constant_time_eq(&token, &generate_anti_forgery_token()));
        assert!(!constant_time_eq(&token, &token[..10]));
        assert!(!constant_time_eq("", &token));
    }
}
