//! HMAC-SHA256 signed download URLs.
//!
//! A signed URL looks like `{public_url}/storage/{bucket}/{path}?expires={unix}&token={sig}` where
//! the signature is computed over `{bucket}/{path}:{expires}` with the service secret key and
//! encoded as unpadded base64url.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Why a signed URL was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    Expired,
    Invalid,
}

fn mac(secret: &str, bucket: &str, path: &str, expires: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{bucket}/{path}:{expires}").as_bytes());
    Some(mac)
}

/// Compute the token for an object and expiry time.
pub fn sign(secret: &str, bucket: &str, path: &str, expires: i64) -> Option<String> {
    let signature = mac(secret, bucket, path, expires)?.finalize().into_bytes();
    Some(URL_SAFE_NO_PAD.encode(signature))
}

/// Check a token. Expiry is checked first so stale links report as expired.
pub fn verify(
    secret: &str,
    bucket: &str,
    path: &str,
    expires: i64,
    token: &str,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    if now.timestamp() > expires {
        return Err(SignatureError::Expired);
    }

    let Ok(signature) = URL_SAFE_NO_PAD.decode(token) else {
        return Err(SignatureError::Invalid);
    };

    // Constant-time comparison
    mac(secret, bucket, path, expires)
        .ok_or(SignatureError::Invalid)?
        .verify_slice(&signature)
        .map_err(|_| SignatureError::Invalid)
}

/// A signed URL together with the moment it stops working
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Build the full signed URL for an object.
pub fn signed_url(
    public_base: &str,
    secret: &str,
    bucket: &str,
    path: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Option<SignedUrl> {
    let expires_at = now + chrono::Duration::from_std(ttl).ok()?;
    let expires = expires_at.timestamp();
    let token = sign(secret, bucket, path, expires)?;

    Some(SignedUrl {
        url: format!("{public_base}/storage/{bucket}/{path}?expires={expires}&token={token}"),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key";

    #[test]
    fn test_sign_and_verify() {
        let now = Utc::now();
        let expires = now.timestamp() + 60;
        let token = sign(SECRET, "lesson-videos", "m/1-a.mp4", expires).unwrap();

        assert_eq!(verify(SECRET, "lesson-videos", "m/1-a.mp4", expires, &token, now), Ok(()));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_tampering_is_rejected() {
        let now = Utc::now();
        let expires = now.timestamp() + 60;
        let token = sign(SECRET, "lesson-videos", "m/1-a.mp4", expires).unwrap();

        // Different path
        assert_eq!(
            verify(SECRET, "lesson-videos", "m/2-b.mp4", expires, &token, now),
            Err(SignatureError::Invalid)
        );
        // Extended expiry
        assert_eq!(
            verify(SECRET, "lesson-videos", "m/1-a.mp4", expires + 3600, &token, now),
            Err(SignatureError::Invalid)
        );
        // Different key
        assert_eq!(
            verify("other-secret", "lesson-videos", "m/1-a.mp4", expires, &token, now),
            Err(SignatureError::Invalid)
        );
        // Garbage token
        assert_eq!(
            verify(SECRET, "lesson-videos", "m/1-a.mp4", expires, "!!not-base64!!", now),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn test_expired_link() {
        let now = Utc::now();
        let expires = now.timestamp() - 1;
        let token = sign(SECRET, "lesson-videos", "m/1-a.mp4", expires).unwrap();

        assert_eq!(
            verify(SECRET, "lesson-videos", "m/1-a.mp4", expires, &token, now),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_signed_url_format() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let signed = signed_url(
            "https://portal.example.com",
            SECRET,
            "lesson-videos",
            "m/1-a.mp4",
            Duration::from_secs(3600),
            now,
        )
        .unwrap();

        let token = sign(SECRET, "lesson-videos", "m/1-a.mp4", 1_700_003_600).unwrap();
        assert_eq!(
            signed.url,
            format!("https://portal.example.com/storage/lesson-videos/m/1-a.mp4?expires=1700003600&token={token}")
        );
        assert_eq!(signed.expires_at.timestamp(), 1_700_003_600);
    }
}
