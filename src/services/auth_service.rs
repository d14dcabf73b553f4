use crate::config::{ApiAccount, AuthConfig};
use crate::error::{AppError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-auth-signature";
pub const ACCOUNT_PARAM: &str = "account_id";
pub const TIMESTAMP_PARAM: &str = "timestamp";

/// Computes the request signature: hex encoded HMAC-SHA256 over the path and query followed by the body.
#[must_use]
pub fn sign(secret: &str, path_and_query: &str, body: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(path_and_query.as_bytes());
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn new_mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Verifies signed API requests.
#[derive(Clone, Debug)]
pub struct AuthService {
    accounts: Arc<HashMap<String, ApiAccount>>,
    max_clock_skew_secs: i64,
}

impl AuthService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let accounts = config.accounts.iter().map(|a| (a.id.clone(), a.clone())).collect();
        Self { accounts: Arc::new(accounts), max_clock_skew_secs: config.max_clock_skew_secs }
    }

    /// Checks a request signature and timestamp freshness.
    ///
    /// `path_and_query` must be exactly what the client signed, including the account and
    /// timestamp parameters.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the account is unknown, parameters are missing or malformed,
    /// the timestamp is outside the allowed skew, or the signature does not match.
    pub fn verify(&self, path_and_query: &str, body: &[u8], signature: Option<&str>, now_unix: i64) -> Result<String> {
        let params = QueryParams::parse(path_and_query);
        let account_id = params.get(ACCOUNT_PARAM).ok_or(AppError::AuthError)?;
        let timestamp: i64 = params.get(TIMESTAMP_PARAM).and_then(|t| t.parse().ok()).ok_or(AppError::AuthError)?;

        if (now_unix - timestamp).abs() > self.max_clock_skew_secs {
            tracing::debug!(account_id, timestamp, now_unix, "Request timestamp outside allowed skew");
            return Err(AppError::AuthError);
        }

        let account = self.accounts.get(account_id).ok_or_else(|| {
            tracing::debug!(account_id, "Unknown API account");
            AppError::AuthError
        })?;

        let provided = hex::decode(signature.ok_or(AppError::AuthError)?).map_err(|_| AppError::AuthError)?;

        let mut mac = new_mac(&account.secret);
        mac.update(path_and_query.as_bytes());
        mac.update(body);
        mac.verify_slice(&provided).map_err(|_| {
            tracing::debug!(account_id, "Signature mismatch");
            AppError::AuthError
        })?;

        Ok(account.id.clone())
    }
}

/// Raw `key=value` pairs of a query string. Values are compared as sent, without decoding.
struct QueryParams<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> QueryParams<'a> {
    fn parse(path_and_query: &'a str) -> Self {
        let query = path_and_query.split_once('?').map_or("", |(_, q)| q);
        let pairs = query.split('&').filter(|p| !p.is_empty()).map(|p| p.split_once('=').unwrap_or((p, ""))).collect();
        Self { pairs }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}
