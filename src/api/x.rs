use crate::api::SocialPoster;
use crate::{logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::Client;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

const TWEETS_URL: &str = "https://api.x.com/2/tweets";
const ME_URL: &str = "https://api.x.com/2/users/me";

// RFC 3986 unreserved characters stay bare; everything else is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone)]
pub struct Oauth1Credentials {
    pub api_key: String,
    pub api_key_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

pub struct XClient {
    client: Client,
    creds: Oauth1Credentials,
}

fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// OAuth 1.0a HMAC-SHA1 signature over the request method, URL and the oauth
/// parameters. The JSON request body is not form-encoded and so does not
/// participate in the signature base.
fn oauth1_signature(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method,
        percent_encode(url),
        percent_encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn oauth1_header(creds: &Oauth1Credentials, method: &str, url: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string();
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let mut params = vec![
        ("oauth_consumer_key".to_string(), creds.api_key.clone()),
        ("oauth_nonce".to_string(), nonce),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp),
        ("oauth_token".to_string(), creds.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];

    let signature = oauth1_signature(
        method,
        url,
        &params,
        &creds.api_key_secret,
        &creds.access_token_secret,
    );
    params.push(("oauth_signature".to_string(), signature));
    params.sort();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}

impl XClient {
    pub fn new(client: Client, creds: Oauth1Credentials) -> Self {
        Self { client, creds }
    }

    /// Startup check mirroring the original bot: fetch the authenticated user
    /// so a bad key set fails loudly before any generation work is done.
    pub async fn verify_credentials(&self) -> Result<()> {
        let auth = oauth1_header(&self.creds, "GET", ME_URL);
        let resp = self
            .client
            .get(ME_URL)
            .header("Authorization", auth)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("X credential check request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet = raw.chars().take(400).collect::<String>();
            anyhow::bail!(
                "X credential check failed (HTTP {}): {}. Check that the app has read-write permissions.",
                status.as_u16(),
                snippet
            );
        }

        let root: serde_json::Value = serde_json::from_str(&raw).unwrap_or_default();
        if let Some(username) = root
            .get("data")
            .and_then(|d| d.get("username"))
            .and_then(|v| v.as_str())
        {
            logok(format!("X credentials verified. Posting as @{}", username));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialPoster for XClient {
    async fn post(&self, text: &str) -> Result<bool> {
        let auth = oauth1_header(&self.creds, "POST", TWEETS_URL);
        let body = serde_json::json!({ "text": text });

        let resp = self
            .client
            .post(TWEETS_URL)
            .header("Authorization", auth)
            .json(&body)
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await
            .context("X post request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("X post failed HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                let snippet = raw.chars().take(400).collect::<String>();
                logw(format!("X raw body: {}", snippet));
            }
            return Ok(false);
        }

        let root: serde_json::Value = serde_json::from_str(&raw).unwrap_or_default();
        match root
            .get("data")
            .and_then(|d| d.get("id"))
            .and_then(|v| v.as_str())
        {
            Some(id) => logok(format!(
                "Posted. https://twitter.com/user/status/{}",
                id
            )),
            None => logok("Posted (no id in response body)."),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encoding_keeps_unreserved() {
        assert_eq!(percent_encode("abc-XYZ_0.9~"), "abc-XYZ_0.9~");
        assert_eq!(percent_encode("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(percent_encode("日本"), "%E6%97%A5%E6%9C%AC");
    }

    #[test]
    fn signature_is_stable_for_fixed_inputs() {
        let params = vec![
            ("oauth_consumer_key".to_string(), "key".to_string()),
            ("oauth_nonce".to_string(), "abc123".to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), "1700000000".to_string()),
            ("oauth_token".to_string(), "token".to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        let a = oauth1_signature("POST", TWEETS_URL, &params, "secret", "tsecret");
        let b = oauth1_signature("POST", TWEETS_URL, &params, "secret", "tsecret");
        assert_eq!(a, b);
        assert_ne!(
            a,
            oauth1_signature("GET", TWEETS_URL, &params, "secret", "tsecret")
        );
    }

    #[test]
    fn header_carries_all_oauth_fields() {
        let creds = Oauth1Credentials {
            api_key: "ck".to_string(),
            api_key_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "as".to_string(),
        };
        let header = oauth1_header(&creds, "POST", TWEETS_URL);
        assert!(header.starts_with("OAuth "));
        for field in [
            "oauth_consumer_key=\"ck\"",
            "oauth_token=\"at\"",
            "oauth_signature_method=\"HMAC-SHA1\"",
            "oauth_version=\"1.0\"",
        ] {
            assert!(header.contains(field), "missing {} in {}", field, header);
        }
        assert!(header.contains("oauth_nonce="));
        assert!(header.contains("oauth_timestamp="));
        assert!(header.contains("oauth_signature="));
    }
}
