//! AWS Signature Version 4, computed in-process against a plain `reqwest` client.
//!
//! Ported from the reference gateway's `bedrock::sigv4::SigV4Signer` — same canonical
//! request construction and HMAC-SHA256 derivation chain, no AWS SDK involved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::ProviderError;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "bedrock";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigV4Signer {
    access_key: String,
    secret_key: String,
    region: String,
}

impl SigV4Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self { access_key: access_key.into(), secret_key: secret_key.into(), region: region.into() }
    }

    /// Sign a request and return the `Authorization` header value, plus the `x-amz-date`
    /// value the caller must send alongside it.
    pub fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        content_type: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<(String, String), ProviderError> {
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("host".to_string(), host.to_string());
        headers.insert("x-amz-date".to_string(), amz_date.clone());

        let canonical_headers: String =
            headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect::<Vec<_>>().concat();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let payload_hash = hex::encode(Sha256::digest(body));

        let canonical_request =
            format!("{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

        let credential_scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.region);
        let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!("{ALGORITHM}\n{amz_date}\n{credential_scope}\n{hashed_canonical_request}");

        let signing_key = self.derive_signing_key(&date_stamp)?;
        let signature = hex::encode(self.calculate_signature(&signing_key, &string_to_sign)?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        );

        Ok((authorization, amz_date))
    }

    fn derive_signing_key(&self, date_stamp: &str) -> Result<Vec<u8>, ProviderError> {
        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date_stamp)?;
        let k_region = hmac_sha256(&k_date, &self.region)?;
        let k_service = hmac_sha256(&k_region, SERVICE)?;
        hmac_sha256(&k_service, "aws4_request")
    }

    fn calculate_signature(&self, signing_key: &[u8], string_to_sign: &str) -> Result<Vec<u8>, ProviderError> {
        hmac_sha256(signing_key, string_to_sign)
    }
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ProviderError::invalid_config(format!("invalid HMAC key: {e}")))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signer_produces_well_formed_authorization_header() {
        let signer = SigV4Signer::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY", "us-east-1");
        let timestamp = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let (authorization, amz_date) = signer
            .sign_request(
                "POST",
                "bedrock-runtime.us-east-1.amazonaws.com",
                "/model/anthropic.claude-3-5-sonnet-20241022-v2:0/invoke",
                "application/json",
                b"{}",
                timestamp,
            )
            .unwrap();

        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/bedrock/aws4_request"));
        assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date"));
        assert_eq!(amz_date, "20150830T123600Z");
    }

    #[test]
    fn hmac_matches_known_vector() {
        // RFC 2104 test case 2.
        let mac = hmac_sha256(b"key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            hex::encode(mac),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd"
        );
    }

    #[test]
    fn signature_is_deterministic() {
        let signer = SigV4Signer::new("AKID", "SECRET", "us-west-2");
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (first, _) = signer
            .sign_request("POST", "host", "/path", "application/json", b"body", timestamp)
            .unwrap();
        let (second, _) = signer
            .sign_request("POST", "host", "/path", "application/json", b"body", timestamp)
            .unwrap();
        assert_eq!(first, second);
    }
}
