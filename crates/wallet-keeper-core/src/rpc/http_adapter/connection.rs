use reqwest::Url;

use crate::config::RpcEndpoint;
use crate::error::KeeperError;

pub(super) fn resolve_auth(endpoint: &RpcEndpoint) -> Result<Option<(String, String)>, KeeperError> {
    match (&endpoint.user, &endpoint.pass) {
        (Some(u), Some(p)) => Ok(Some((u.clone(), p.clone()))),
        (Some(_), None) | (None, Some(_)) => Err(KeeperError::Config(format!(
            "both rpc user and rpc pass must be set together for `{}`",
            endpoint.url
        ))),
        (None, None) => Ok(None),
    }
}

pub(super) fn parse_connection(connection: &str) -> Result<String, KeeperError> {
    let parsed = Url::parse(connection).map_err(|e| {
        KeeperError::Config(format!(
            "invalid connection `{connection}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(connection.to_owned()),
        other => Err(KeeperError::Config(format!(
            "unsupported connection scheme `{other}`; expected http or https"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connection_http_url() {
        let parsed = parse_connection("http://127.0.0.1:8332").expect("should parse");
        assert_eq!(parsed, "http://127.0.0.1:8332");
    }

    #[test]
    fn parse_connection_invalid_scheme() {
        let err = parse_connection("ftp://example.com").expect_err("must reject ftp");
        assert!(err.to_string().contains("unsupported connection scheme"));
    }

    #[test]
    fn parse_connection_bare_host_is_rejected() {
        assert!(parse_connection("127.0.0.1:8332").is_err());
    }

    #[test]
    fn resolve_auth_rejects_partial_credentials() {
        let endpoint = RpcEndpoint {
            url: "http://127.0.0.1:8332".to_string(),
            user: Some("user".to_string()),
            pass: None,
        };
        let err = resolve_auth(&endpoint).expect_err("must reject partial auth");
        assert!(err.to_string().contains("must be set together"));
    }

    #[test]
    fn resolve_auth_accepts_user_and_pass() {
        let endpoint = RpcEndpoint::new("http://127.0.0.1:8332").with_credentials("alice", "secret");
        let auth = resolve_auth(&endpoint).expect("auth must parse");
        assert_eq!(auth, Some(("alice".to_owned(), "secret".to_owned())));
    }
}
