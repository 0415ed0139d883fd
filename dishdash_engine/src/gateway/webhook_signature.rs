//! Authentication of payment processor webhooks.
//!
//! The processor signs every callback with a header of the form `t=<unix seconds>,v1=<hex signature>`. The signature
//! is HMAC-SHA256, keyed with the shared webhook secret, over `"{t}.{raw body}"`. Several `v1` entries may be present
//! while the processor rotates secrets; any one matching is sufficient.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("The signature header is missing or malformed")]
    MalformedHeader,
    #[error("The webhook secret is not configured")]
    NoSecret,
    #[error("The signature timestamp is outside the tolerance window")]
    TimestampOutOfRange,
    #[error("No signature in the header matches the payload")]
    Mismatch,
}

struct SignatureHeader<'a> {
    /// The `t` value exactly as sent. This is what was signed.
    raw_timestamp: &'a str,
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookSignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=').ok_or(WebhookSignatureError::MalformedHeader)?;
        match key {
            "t" => {
                let parsed = value.parse::<i64>().map_err(|_| WebhookSignatureError::MalformedHeader)?;
                timestamp = Some((value, parsed));
            },
            "v1" => signatures.push(hex::decode(value).map_err(|_| WebhookSignatureError::MalformedHeader)?),
            // Other schemes are ignored
            _ => {},
        }
    }
    let (raw_timestamp, timestamp) = timestamp.ok_or(WebhookSignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookSignatureError::MalformedHeader);
    }
    Ok(SignatureHeader { raw_timestamp, timestamp, signatures })
}

fn mac_for(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, WebhookSignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookSignatureError::NoSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks the signature header against the raw request body.
///
/// `tolerance_secs` bounds how far the signed timestamp may be from `now` in either direction. A tolerance of zero
/// disables the check.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), WebhookSignatureError> {
    if secret.is_empty() {
        return Err(WebhookSignatureError::NoSecret);
    }
    let header = parse_header(header)?;
    if tolerance_secs > 0 {
        let skew = now.timestamp().checked_sub(header.timestamp).and_then(i64::checked_abs);
        if skew.map_or(true, |skew| skew > tolerance_secs) {
            return Err(WebhookSignatureError::TimestampOutOfRange);
        }
    }
    let mac = mac_for(secret, header.raw_timestamp, payload)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(WebhookSignatureError::Mismatch)
    }
}

/// Produces a header value that [`verify_webhook_signature`] accepts. Used to sign test payloads.
pub fn sign_webhook_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let timestamp = timestamp.to_string();
    let signature = match mac_for(secret, &timestamp, payload) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        Err(_) => String::new(),
    };
    format!("t={timestamp},v1={signature}")
}
