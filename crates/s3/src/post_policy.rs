//! Browser-based upload forms (S3 POST policy, SigV4)
//!
//! A signed policy lets anyone holding the form fields upload to one key,
//! or to any key under a prefix, until the policy expires.

use std::collections::BTreeMap;
use std::time::Duration;

use aws_lc_rs::hmac;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Value, json};

use ferry_core::{Error, Result};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Credentials used to sign a policy
#[derive(Debug, Clone, Copy)]
pub struct SigningKey<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

/// Upload policy for one key or a key prefix
#[derive(Debug, Clone)]
pub struct PostPolicy<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    /// Accept any key starting with `key`
    pub key_prefix: bool,
    pub content_type: Option<&'a str>,
    pub expiry: Duration,
}

#[derive(Serialize)]
struct PolicyDocument {
    expiration: String,
    conditions: Vec<Value>,
}

impl PostPolicy<'_> {
    /// Sign the policy as of `now` and return the form fields to post
    pub fn sign(&self, key: SigningKey<'_>, now: jiff::Timestamp) -> Result<BTreeMap<String, String>> {
        let span = jiff::SignedDuration::try_from(self.expiry)
            .map_err(|e| Error::InvalidPath(format!("invalid expiry: {e}")))?;
        let expires = now
            .checked_add(span)
            .map_err(|e| Error::InvalidPath(format!("invalid expiry: {e}")))?;

        let short_date = now.strftime("%Y%m%d").to_string();
        let amz_date = now.strftime("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!(
            "{}/{short_date}/{}/{SERVICE}/aws4_request",
            key.access_key, key.region
        );

        let key_condition = if self.key_prefix {
            json!(["starts-with", "$key", self.key])
        } else {
            json!(["eq", "$key", self.key])
        };
        let mut conditions = vec![
            json!(["eq", "$bucket", self.bucket]),
            key_condition,
            json!(["eq", "$x-amz-date", amz_date]),
            json!(["eq", "$x-amz-algorithm", ALGORITHM]),
            json!(["eq", "$x-amz-credential", credential]),
        ];
        if let Some(content_type) = self.content_type {
            conditions.push(json!(["eq", "$Content-Type", content_type]));
        }

        let document = PolicyDocument {
            expiration: format!("{}.000Z", expires.strftime("%Y-%m-%dT%H:%M:%S")),
            conditions,
        };
        let policy = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_string(&document)?);
        let signature = hex::encode(sign(&signing_key(key, &short_date), policy.as_bytes()));

        let mut fields = BTreeMap::new();
        fields.insert("bucket".to_string(), self.bucket.to_string());
        fields.insert("key".to_string(), self.key.to_string());
        fields.insert("policy".to_string(), policy);
        fields.insert("x-amz-algorithm".to_string(), ALGORITHM.to_string());
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        fields.insert("x-amz-signature".to_string(), signature);
        if let Some(content_type) = self.content_type {
            fields.insert("Content-Type".to_string(), content_type.to_string());
        }
        Ok(fields)
    }
}

fn sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

/// SigV4 key derivation: date, region, service, terminator
fn signing_key(key: SigningKey<'_>, short_date: &str) -> Vec<u8> {
    let secret = format!("AWS4{}", key.secret_key);
    let date_key = sign(secret.as_bytes(), short_date.as_bytes());
    let region_key = sign(&date_key, key.region.as_bytes());
    let service_key = sign(&region_key, SERVICE.as_bytes());
    sign(&service_key, b"aws4_request")
}
