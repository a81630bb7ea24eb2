//! AWS Signature Version 4 for the IoT data plane.
//!
//! Pure functions over the request parts and a caller-supplied timestamp,
//! so signing is deterministic and unit-testable.

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::auth::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const SERVICE: &str = "iotdata";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub(crate) struct SignedRequest {
    pub amz_date: String,
    pub authorization: String,
}

/// Sign one request. `query` is the raw query string without the leading
/// `?`, empty when there is none.
pub(crate) fn sign(
    method: &str,
    host: &str,
    path: &str,
    query: &str,
    payload: &[u8],
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> SignedRequest {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let signed_headers = "host;x-amz-date;x-amz-security-token";
    let canonical = canonical_request(
        method,
        path,
        query,
        host,
        &amz_date,
        &credentials.session_token,
        payload,
    );

    let scope = format!("{date_stamp}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date_stamp, region, service);
    let signature = HEXLOWER.encode(&hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    SignedRequest { amz_date, authorization }
}

fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    host: &str,
    amz_date: &str,
    session_token: &str,
    payload: &[u8],
) -> String {
    // Canonical headers are lowercase, sorted, trailing newline each;
    // signed-headers list must match their order.
    format!(
        "{method}\n{}\n{}\nhost:{host}\nx-amz-date:{amz_date}\nx-amz-security-token:{session_token}\n\nhost;x-amz-date;x-amz-security-token\n{}",
        canonical_uri(path),
        canonical_query(query),
        sha256_hex(payload)
    )
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (uri_encode(key), uri_encode(value))
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: "FQoGZXIvYXdzEXAMPLETOKEN".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn sha256_of_empty_payload() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hmac_known_vector() {
        let mac = hmac_sha256(b"key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            HEXLOWER.encode(&mac),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn canonical_request_assembly() {
        let canonical = canonical_request(
            "GET",
            "/things/ac-1/shadow",
            "",
            "data.iot.eu-central-1.amazonaws.com",
            "20260805T120000Z",
            "TOKEN",
            b"",
        );
        let expected = format!(
            "GET\n/things/ac-1/shadow\n\nhost:data.iot.eu-central-1.amazonaws.com\nx-amz-date:20260805T120000Z\nx-amz-security-token:TOKEN\n\nhost;x-amz-date;x-amz-security-token\n{}",
            sha256_hex(b"")
        );
        assert_eq!(canonical, expected);
    }

    #[test]
    fn uri_encoding_preserves_unreserved() {
        assert_eq!(uri_encode("ac-1_A.b~"), "ac-1_A.b~");
        assert_eq!(uri_encode("a b$"), "a%20b%24");
    }

    #[test]
    fn query_pairs_are_sorted_and_encoded() {
        assert_eq!(canonical_query(""), "");
        assert_eq!(canonical_query("b=2&a=1"), "a=1&b=2");
        assert_eq!(canonical_query("name=$aws"), "name=%24aws");
    }

    #[test]
    fn authorization_header_shape() {
        let now = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();
        let signed = sign(
            "GET",
            "data.iot.eu-central-1.amazonaws.com",
            "/things/ac-1/shadow",
            "",
            b"",
            &credentials(),
            "eu-central-1",
            SERVICE,
            now,
        );

        assert_eq!(signed.amz_date, "20260805T120000Z");
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260805/eu-central-1/iotdata/aws4_request, SignedHeaders=host;x-amz-date;x-amz-security-token, Signature="
        ));
        let signature = signed
            .authorization
            .rsplit_once("Signature=")
            .map(|(_, s)| s)
            .unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_changes_with_payload() {
        let now = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();
        let creds = credentials();
        let empty = sign("POST", "h", "/p", "", b"", &creds, "eu-central-1", SERVICE, now);
        let body = sign("POST", "h", "/p", "", b"{}", &creds, "eu-central-1", SERVICE, now);
        assert_ne!(empty.authorization, body.authorization);
    }
}
