use http::{header, HeaderMap};

use crate::error::{
    AuthError, HEADER_MUST_BE_BEARER_TOKEN, HEADER_MUST_START_WITH_BEARER, HEADER_TOKEN_NOT_FOUND,
};

/// Extracts the bearer token from the `Authorization` header.
///
/// The header must consist of exactly two whitespace-separated parts, the first of which is `bearer` in any casing.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader(HEADER_MUST_BE_BEARER_TOKEN))?;
    parse_authorization(value)
}

/// Parses the raw value of an `Authorization` header into its token part.
pub fn parse_authorization(value: &str) -> Result<&str, AuthError> {
    let mut parts = value.split_whitespace();

    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {}
        _ => return Err(AuthError::MalformedHeader(HEADER_MUST_START_WITH_BEARER)),
    }
    let token = parts
        .next()
        .ok_or(AuthError::MalformedHeader(HEADER_TOKEN_NOT_FOUND))?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader(HEADER_MUST_BE_BEARER_TOKEN));
    }

    Ok(token)
}

#[cfg(test)]
mod test {
    use http::{HeaderMap, HeaderValue};

    use super::*;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_extracts_token() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(parse_authorization("bearer tok").unwrap(), "tok");
        assert_eq!(parse_authorization("BEARER tok").unwrap(), "tok");
        assert_eq!(parse_authorization("  bEaReR \t tok  ").unwrap(), "tok");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("AUTHORIZATION", HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok");
    }

    #[test]
    fn test_malformed_headers() {
        for (value, description) in [
            ("", HEADER_MUST_START_WITH_BEARER),
            ("   ", HEADER_MUST_START_WITH_BEARER),
            ("Basic dXNlcjpwYXNz", HEADER_MUST_START_WITH_BEARER),
            ("Bearertoken", HEADER_MUST_START_WITH_BEARER),
            ("Bearer", HEADER_TOKEN_NOT_FOUND),
            ("Bearer a b", HEADER_MUST_BE_BEARER_TOKEN),
        ] {
            match parse_authorization(value) {
                Err(AuthError::MalformedHeader(actual)) => assert_eq!(actual, description, "{value:?}"),
                other => panic!("unexpected result for {value:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_non_ascii_header_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MalformedHeader(_))
        ));
    }
}
