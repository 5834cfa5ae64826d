// Bearer token generation and hashing
use sha2::{Digest, Sha256};

/// Prefix that marks personal API tokens
pub const API_TOKEN_PREFIX: &str = "swk_";

/// Prefix that marks session tokens
pub const SESSION_TOKEN_PREFIX: &str = "sws_";

fn random_token(prefix: &str) -> String {
    format!(
        "{prefix}{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub fn generate_api_token() -> String {
    random_token(API_TOKEN_PREFIX)
}

pub fn generate_session_token() -> String {
    random_token(SESSION_TOKEN_PREFIX)
}

/// Tokens are stored only as a SHA-256 hex digest
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Displayable prefix of a token, safe to show after creation
pub fn display_prefix(token: &str) -> String {
    token.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_api_token();
        let b = generate_api_token();
        assert_ne!(a, b);
        assert!(a.starts_with(API_TOKEN_PREFIX));
        assert_eq!(a.len(), API_TOKEN_PREFIX.len() + 64);
        assert!(generate_session_token().starts_with(SESSION_TOKEN_PREFIX));
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(display_prefix("swk_0123456789abcdef"), "swk_01234567");
    }
}
