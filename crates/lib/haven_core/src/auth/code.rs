//! One-time code generation and verification.
//!
//! Codes are short, human-enterable strings. Ambiguous glyphs are mapped
//! away before the code ever reaches a user, and only a bcrypt hash of the
//! code is persisted.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use super::AuthError;
use super::password::{hash_password, verify_password};

/// A freshly generated one-time code. `code` goes to the user, `code_hash`
/// to the store.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub code: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Map glyphs that read ambiguously in email clients (0/O, 1/l/I, 5/S) to
/// unambiguous substitutes.
fn replace_confusable_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '0' => 'X',
            'O' => 'Y',
            'I' => 'Z',
            'l' => 'W',
            '1' => 'V',
            '5' => 'U',
            'S' => 'T',
            other => other,
        })
        .collect()
}

/// Normalization applied to user-submitted codes before comparison.
fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Generate a one-time code of `length` characters expiring after
/// `ttl_minutes`.
pub fn generate_code(length: usize, ttl_minutes: i64) -> Result<GeneratedCode, AuthError> {
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();

    let code: String = replace_confusable_chars(&hex)
        .to_uppercase()
        .chars()
        .take(length)
        .collect();

    let code_hash = hash_password(&code)?;

    Ok(GeneratedCode {
        code,
        code_hash,
        expires_at,
    })
}

/// Check a user-submitted code against a stored hash.
///
/// The submission is normalized (trim + uppercase) first; bcrypt's verify
/// provides the constant-time comparison.
pub fn verify_code(submitted: &str, code_hash: &str) -> Result<bool, AuthError> {
    verify_password(&normalize_code(submitted), code_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_has_requested_length() {
        let generated = generate_code(6, 15).unwrap();
        assert_eq!(generated.code.len(), 6);
    }

    #[test]
    fn generated_code_contains_no_confusable_glyphs() {
        for _ in 0..32 {
            let generated = generate_code(12, 15).unwrap();
            for forbidden in ['0', 'O', 'I', 'l', '1', '5', 'S'] {
                assert!(
                    !generated.code.contains(forbidden),
                    "code {} contains {}",
                    generated.code,
                    forbidden
                );
            }
            assert_eq!(generated.code, generated.code.to_uppercase());
        }
    }

    #[test]
    fn expiry_is_in_the_future() {
        let generated = generate_code(6, 15).unwrap();
        assert!(generated.expires_at > Utc::now());
    }

    #[test]
    fn verify_accepts_the_raw_code() {
        let generated = generate_code(6, 15).unwrap();
        assert!(verify_code(&generated.code, &generated.code_hash).unwrap());
    }

    #[test]
    fn verify_normalizes_whitespace_and_case() {
        let generated = generate_code(6, 15).unwrap();
        let sloppy = format!("  {}  ", generated.code.to_lowercase());
        assert!(verify_code(&sloppy, &generated.code_hash).unwrap());
    }

    #[test]
    fn verify_rejects_a_wrong_code() {
        let generated = generate_code(6, 15).unwrap();
        // '0' never survives substitution, so this can never match.
        assert!(!verify_code("000000", &generated.code_hash).unwrap());
    }

    #[test]
    fn confusable_substitution_maps_every_listed_glyph() {
        assert_eq!(replace_confusable_chars("0OIl15S"), "XYZWVUT");
        assert_eq!(replace_confusable_chars("abc234"), "abc234");
    }
}
