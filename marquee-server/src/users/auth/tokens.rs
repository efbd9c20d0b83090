//! Parsing of the `Authorization` header schemes.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::infra::errors::{AppError, AppResult};

/// Credentials carried by a `Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

/// Decode `Basic base64(email:password)`.
///
/// The header must contain exactly one space and the decoded credentials
/// exactly one colon.
pub fn parse_basic_token(raw: &str) -> AppResult<BasicCredentials> {
    let invalid = || AppError::bad_request("invalid token format");

    let parts: Vec<&str> = raw.split(' ').collect();
    let [_, token] = parts.as_slice() else {
        return Err(invalid());
    };

    let decoded = STANDARD.decode(token).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;

    let credentials: Vec<&str> = decoded.split(':').collect();
    let [email, password] = credentials.as_slice() else {
        return Err(invalid());
    };

    Ok(BasicCredentials {
        email: (*email).to_string(),
        password: (*password).to_string(),
    })
}

/// Split `Bearer <token>` and return the token. The scheme is matched
/// case-insensitively.
pub fn split_bearer(raw: &str) -> AppResult<&str> {
    let parts: Vec<&str> = raw.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AppError::unauthorized("invalid token format")),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn parses_basic_credentials() {
        let creds = parse_basic_token(&basic("a@b.com:secret")).unwrap();
        assert_eq!(creds.email, "a@b.com");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn rejects_malformed_basic_tokens() {
        for raw in [
            "Basic".to_string(),
            "Basic a b".to_string(),
            basic("no-colon"),
            basic("a:b:c"),
            "Basic !!!not-base64!!!".to_string(),
        ] {
            let err = parse_basic_token(&raw).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "{raw}");
        }
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(split_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(split_bearer("bearer abc").unwrap(), "abc");
        assert_eq!(split_bearer("BEARER abc").unwrap(), "abc");
    }

    #[test]
    fn rejects_malformed_bearer_headers() {
        for raw in ["Bearer", "Basic abc", "Bearer a b", "Bearer "] {
            let err = split_bearer(raw).unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED, "{raw}");
        }
    }
}
