//! `http_get`/`http_post` builtins (spec §4.6, §5 "Shared resources").
//!
//! Grounded on the teacher's `http_client.rs`: a single `ureq` agent with a
//! fixed timeout, a `{status, ok, body}` response shape, and status-based
//! `ok` derivation. The teacher offers `get`/`post`/`put`/`delete`; only
//! `get`/`post` are named by the builtin catalogue here, so `put`/`delete`
//! are not reproduced. `url` validates scheme before the request goes out,
//! matching the teacher's dependency rationale ("SSRF validation") for
//! pulling in `url` at all — full SSRF address-range checking is explicitly
//! out of scope (spec §4.6.R).

use std::sync::OnceLock;
use std::time::Duration;

use url::Url;

use crate::error::RuntimeError;
use crate::value::Value;

const TIMEOUT_SECS: u64 = 30;

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
    })
}

fn validate_url(raw: &str) -> Result<(), RuntimeError> {
    let parsed = Url::parse(raw).map_err(|e| RuntimeError::other(format!("invalid URL: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(RuntimeError::other(format!(
            "unsupported URL scheme '{}': only http/https are allowed",
            parsed.scheme()
        )));
    }
    Ok(())
}

fn response_value(status: u16, body: String) -> Value {
    Value::dict(vec![
        (Value::Str("status".into()), Value::Int(status as i64)),
        (Value::Str("ok".into()), Value::Bool((200..300).contains(&status))),
        (Value::Str("body".into()), Value::Str(body)),
    ])
}

fn run_request(
    build: impl FnOnce(&ureq::Agent) -> Result<ureq::Response, ureq::Error>,
) -> Result<Value, RuntimeError> {
    match build(agent()) {
        Ok(response) => {
            let status = response.status();
            let body = response
                .into_string()
                .map_err(|e| RuntimeError::other(format!("failed to read response body: {e}")))?;
            Ok(response_value(status, body))
        }
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            Ok(response_value(code, body))
        }
        Err(ureq::Error::Transport(t)) => Err(RuntimeError::other(format!("http request failed: {t}"))),
    }
}

pub fn get(url: &str) -> Result<Value, RuntimeError> {
    validate_url(url)?;
    run_request(|agent| agent.get(url).call())
}

pub fn post(url: &str, body: &str) -> Result<Value, RuntimeError> {
    validate_url(url)?;
    run_request(|agent| agent.post(url).set("Content-Type", "application/json").send_string(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/path?x=1").is_ok());
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(validate_url("not a url").is_err());
    }
}
