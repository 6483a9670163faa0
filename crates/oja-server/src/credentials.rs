//! Session-token and cookie helpers.
//!
//! Session tokens are 32 random bytes, hex encoded, handed to the client once.
//! Only `sha256(secret ":" token)` is stored, so a leaked sessions table cannot
//! be replayed without the server secret.

use sha2::{Digest, Sha256};

/// Name of the cookie that carries the session token for browser clients.
pub const SESSION_COOKIE: &str = "oja_session";

#[must_use]
pub fn generate_session_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

#[must_use]
pub fn hash_session_token(secret: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// `Set-Cookie` value for a fresh session.
#[must_use]
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_random_hex() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_depends_on_secret() {
        let token = "abc123";
        let one = hash_session_token("secret-one", token);
        let two = hash_session_token("secret-two", token);
        assert_eq!(one.len(), 64);
        assert_ne!(one, two);
        assert_eq!(one, hash_session_token("secret-one", token));
    }

    #[test]
    fn cookie_flags() {
        let cookie = session_cookie("tok", 3600, true);
        assert!(cookie.starts_with("oja_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("tok", 60, false).contains("Secure"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
