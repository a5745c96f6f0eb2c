use super::SessionConfig;
use http::header::COOKIE;
use http::HeaderMap;

/// Value of the first cookie called `name` in the request's `Cookie` headers
#[must_use]
pub fn request_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"'))
}

fn sanitize_name(name: &str) -> String {
    name.replace(['\n', '\r'], "-")
}

fn sanitize_value(value: &str) -> String {
    value.replace(['\n', '\r', ';'], " ")
}

/// `Set-Cookie` value carrying a session id
pub(crate) fn session_cookie(config: &SessionConfig, sid: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/",
        sanitize_name(&config.cookie_name),
        urlencoding::encode(sid)
    );
    if let Some(domain) = config.domain.as_deref().filter(|d| !d.is_empty()) {
        cookie.push_str("; Domain=");
        cookie.push_str(&sanitize_value(domain));
    }
    if let Some(max_age) = config.cookie_lifetime_secs.filter(|age| *age > 0) {
        cookie.push_str("; Max-Age=");
        cookie.push_str(&max_age.to_string());
    }
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; HttpOnly");
    cookie
}

/// `Set-Cookie` value that expires the session cookie
pub(crate) fn expired_cookie(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly",
        sanitize_name(&config.cookie_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_request_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("brrtcore_session=abc123"));
        assert_eq!(request_cookie(&headers, "lang"), Some("en"));
        assert_eq!(request_cookie(&headers, "brrtcore_session"), Some("abc123"));
        assert_eq!(request_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig {
            secure: true,
            domain: Some("example.com".into()),
            cookie_lifetime_secs: Some(60),
            ..SessionConfig::default()
        };
        assert_eq!(
            session_cookie(&config, "id1"),
            "brrtcore_session=id1; Path=/; Domain=example.com; Max-Age=60; Secure; HttpOnly"
        );
    }

    #[test]
    fn test_expired_cookie() {
        let cookie = expired_cookie(&SessionConfig::default());
        assert!(cookie.starts_with("brrtcore_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
