use super::handlers::{auth, health};
use crate::rpc;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` document. Pages and `HEAD`/`OPTIONS
/// /health` are added outside and stay undocumented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::sign_up::sign_up))
        .routes(routes!(auth::session::sign_in))
        .routes(routes!(auth::session::sign_out))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::verification::verify_email))
        .routes(routes!(auth::password::forgot_password))
        .routes(routes!(auth::password::reset_password))
        .routes(routes!(rpc::rpc_handler));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Sign-up, sign-in, sessions and password reset".to_string());

    let mut rpc_tag = Tag::new("rpc");
    rpc_tag.description = Some("Typed procedures behind POST /api/rpc".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, rpc_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = match primary.split_once('<') {
        Some((name, rest)) => (name.trim(), rest.trim_end_matches('>').trim()),
        None => (primary, ""),
    };

    let mut contact = Contact::new();
    contact.name = optional_string(name);
    contact.email = optional_string(email);
    contact.url = optional_string(env!("CARGO_PKG_HOMEPAGE"));
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let license = env!("CARGO_PKG_LICENSE");
    if license.is_empty() {
        return None;
    }
    let mut license = License::new(license);
    license.identifier = Some(license.name.clone());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

fn optional_string(value: &str) -> Option<String> {
    optional_str(value).map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_auth_rpc_and_health_paths() {
        let doc = openapi();
        for path in [
            "/health",
            "/api/auth/sign-up",
            "/api/auth/sign-in",
            "/api/auth/sign-out",
            "/api/auth/session",
            "/api/auth/verify-email",
            "/api/auth/forgot-password",
            "/api/auth/reset-password",
            "/api/rpc",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        assert_eq!(doc.info.title, "tollgate");
    }

    #[test]
    fn contact_comes_from_cargo_authors() {
        let contact = cargo_contact();
        assert_eq!(
            contact.and_then(|c| c.email).as_deref(),
            Some("team@tollgate.dev")
        );
    }
}
