//! Keyed-hash signatures for gateway messages.
//!
//! eSewa signs a canonical string built from named fields, `name=value` pairs joined with `,`, in the order listed
//! by `signed_field_names`. The signature is the base64-encoded HMAC-SHA256 of that string, keyed with the merchant
//! secret.
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::CallbackFields;

type HmacSha256 = Hmac<Sha256>;

/// Returns the base64-encoded HMAC-SHA256 of `message`.
pub fn sign(secret: &str, message: &str) -> String {
    let mut mac = new_mac(secret);
    mac.update(message.as_bytes());
    base64::encode(mac.finalize().into_bytes())
}

/// Recomputes the signature over `message` and compares it to `signature` in constant time.
///
/// A malformed signature (not valid base64) is simply a mismatch.
pub fn verify(secret: &str, message: &str, signature: &str) -> bool {
    let Ok(provided) = base64::decode(signature.trim()) else {
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(message.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// Builds the canonical message for the given field names. Fields that are absent from the payload are rendered with
/// an empty value, so that a tampered payload fails verification rather than erroring out.
pub fn canonical_message<S: AsRef<str>>(fields: &CallbackFields, names: &[S]) -> String {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            format!("{name}={}", fields.get(name).unwrap_or_default())
        })
        .collect::<Vec<String>>()
        .join(",")
}

/// Splits a `signed_field_names` value into its (trimmed, non-empty) field names.
pub fn signed_field_names(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    }
}
