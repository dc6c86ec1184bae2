//! Post-sign-in callback handling.

use url::form_urlencoded;

use super::routes::ROUTES;

pub const CALLBACK_PARAM: &str = "callbackUrl";

/// Reduce an untrusted callback to a same-origin path.
///
/// Only values starting with a single `/` survive. `//host` and `/\host` are
/// protocol-relative in browsers and collapse to `/`, as does anything with
/// control characters.
#[must_use]
pub fn sanitize(callback: Option<&str>) -> String {
    match callback {
        Some(value)
            if value.starts_with('/')
                && !value.starts_with("//")
                && !value.starts_with("/\\")
                && !value.chars().any(char::is_control) =>
        {
            value.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Decoded `callbackUrl` from a raw query string.
#[must_use]
pub fn callback_from_query(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == CALLBACK_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// `/login?callbackUrl=<path[?query]>`, percent-encoded.
#[must_use]
pub fn sign_in_redirect(path: &str, query: Option<&str>) -> String {
    let target = match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    };
    let encoded = form_urlencoded::Serializer::new(String::new())
        .append_pair(CALLBACK_PARAM, &target)
        .finish();
    format!("{}?{encoded}", ROUTES.sign_in)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_same_origin_paths() {
        assert_eq!(sanitize(Some("/dashboard")), "/dashboard");
        assert_eq!(sanitize(Some("/dashboard/users?page=2")), "/dashboard/users?page=2");
        assert_eq!(sanitize(Some("/")), "/");
    }

    #[test]
    fn rejects_everything_else() {
        for value in [
            "https://evil.example",
            "//evil.example",
            "/\\evil.example",
            "javascript:alert(1)",
            "dashboard",
            "",
            "/ok\r\nSet-Cookie: x=1",
        ] {
            assert_eq!(sanitize(Some(value)), "/", "{value:?}");
        }
        assert_eq!(sanitize(None), "/");
    }

    #[test]
    fn reads_decoded_callback_from_query() {
        assert_eq!(
            callback_from_query(Some("callbackUrl=%2Fdashboard%3Ftab%3D1&x=1")).as_deref(),
            Some("/dashboard?tab=1")
        );
        assert_eq!(callback_from_query(Some("x=1")), None);
        assert_eq!(callback_from_query(None), None);
    }

    #[test]
    fn sign_in_redirect_encodes_path_and_query() {
        assert_eq!(sign_in_redirect("/dashboard", None), "/login?callbackUrl=%2Fdashboard");
        assert_eq!(
            sign_in_redirect("/dashboard/users", Some("page=2")),
            "/login?callbackUrl=%2Fdashboard%2Fusers%3Fpage%3D2"
        );
        assert_eq!(sign_in_redirect("/settings", Some("")), "/login?callbackUrl=%2Fsettings");
    }

    #[test]
    fn redirect_round_trips_through_sanitize() {
        let redirect = sign_in_redirect("/dashboard/users", Some("page=2"));
        let query = redirect.split_once('?').map(|(_, q)| q);
        let callback = callback_from_query(query);
        assert_eq!(sanitize(callback.as_deref()), "/dashboard/users?page=2");
    }
}
