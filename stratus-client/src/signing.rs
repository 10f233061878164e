//! Request signing for the control-plane query API
//!
//! The signature covers every query parameter except `signature` itself:
//! parameters are sorted by lower-cased name, joined as
//! `name=percent-encoded(value)` with `&`, the whole string is lower-cased and
//! signed with HMAC-SHA1 keyed by the secret, then base64-encoded.

use crate::error::{ClientError, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Build the canonical (unsigned) query string for `params`
pub fn canonical_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = params.into_iter().collect();
    pairs.sort_by_key(|(name, _)| name.to_lowercase());

    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a canonical query string, returning the base64 signature
pub fn sign(canonical: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Signing(format!("HMAC error: {}", e)))?;
    mac.update(canonical.to_lowercase().as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Canonical query string with the `signature` parameter appended
pub fn signed_query<'a, I>(params: I, secret: &str) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let query = canonical_query(params);
    let signature = sign(&query, secret)?;
    Ok(format!("{}&signature={}", query, urlencoding::encode(&signature)))
}

/// Check a received signature against the parameters it should cover
pub fn verify<'a, I>(params: I, secret: &str, signature: &str) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let query = canonical_query(params.into_iter().filter(|(name, _)| *name != "signature"));
    match sign(&query, secret) {
        Ok(expected) => expected == signature,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_KEY: &str =
        "plgWJfZK4gyS3mOMTVmjUVg-X-jlWlnfaUJ9GAbBbf9EdM-kAYMmAiLqzzq1ElZLYq_u38zCm0bewzGUdP66mg";
    const SECRET: &str =
        "VDaACYb0LV9eNjTetIOElcVQkvJck_J_QljX_FcHRj87ZKiy0z0ty0ZsYBkoXkY9b7eq1EhwJaw7FF3akA3KBQ";

    #[test]
    fn test_known_signature() {
        let params = [("command", "listUsers"), ("response", "json"), ("apikey", API_KEY)];
        let query = canonical_query(params);
        assert_eq!(
            query,
            format!("apikey={}&command=listUsers&response=json", API_KEY)
        );
        assert_eq!(sign(&query, SECRET).unwrap(), "TTpdDq/7j/J58XCRHomKoQXEQds=");
    }

    #[test]
    fn test_signed_query_encodes_signature() {
        let params = [("command", "listUsers"), ("response", "json"), ("apikey", API_KEY)];
        let query = signed_query(params, SECRET).unwrap();
        assert!(query.ends_with("&signature=TTpdDq%2F7j%2FJ58XCRHomKoQXEQds%3D"));
    }

    #[test]
    fn test_sort_is_case_insensitive_and_values_encoded() {
        let params = [
            ("command", "listDomains"),
            ("name", "ROOT Domain/x"),
            ("apikey", "Key1"),
            ("response", "json"),
            ("listAll", "true"),
        ];
        let query = canonical_query(params);
        assert_eq!(
            query,
            "apikey=Key1&command=listDomains&listAll=true&name=ROOT%20Domain%2Fx&response=json"
        );
        assert_eq!(sign(&query, "secret").unwrap(), "IErGW2aqX99c3DorhbvsusyazeI=");
    }

    #[test]
    fn test_verify_ignores_signature_param() {
        let signature = "IErGW2aqX99c3DorhbvsusyazeI=";
        let params = [
            ("signature", signature),
            ("command", "listDomains"),
            ("name", "ROOT Domain/x"),
            ("apikey", "Key1"),
            ("response", "json"),
            ("listAll", "true"),
        ];
        assert!(verify(params, "secret", signature));
        assert!(!verify(params, "other-secret", signature));
    }
}
