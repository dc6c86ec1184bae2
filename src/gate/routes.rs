//! Static route table and path classification.

/// Access tier of a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTier {
    /// Only for visitors without a session (sign-in, registration).
    GuestOnly,
    Protected,
    Admin,
    Unrestricted,
}

/// Ordered prefix lists, checked exempt → guest-only → admin → protected.
#[derive(Clone, Copy, Debug)]
pub struct RouteTable {
    pub exempt: &'static [&'static str],
    pub guest_only: &'static [&'static str],
    pub admin: &'static [&'static str],
    pub protected: &'static [&'static str],
    pub sign_in: &'static str,
}

pub const ROUTES: RouteTable = RouteTable {
    exempt: &["/api", "/health", "/static", "/favicon.ico", "/api-docs"],
    guest_only: &["/login", "/register", "/forgot-password", "/reset-password"],
    admin: &["/admin"],
    protected: &["/dashboard", "/settings"],
    sign_in: "/login",
};

/// `/dashboard` matches `/dashboard` and `/dashboard/users`, not `/dashboards`.
fn matches_route(path: &str, route: &str) -> bool {
    path.strip_prefix(route)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn any_match(path: &str, routes: &[&str]) -> bool {
    routes.iter().any(|route| matches_route(path, route))
}

impl RouteTable {
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteTier {
        if any_match(path, self.exempt) {
            RouteTier::Unrestricted
        } else if any_match(path, self.guest_only) {
            RouteTier::GuestOnly
        } else if any_match(path, self.admin) {
            RouteTier::Admin
        } else if any_match(path, self.protected) {
            RouteTier::Protected
        } else {
            RouteTier::Unrestricted
        }
    }
}

/// Classify against the built-in table.
#[must_use]
pub fn classify(path: &str) -> RouteTier {
    ROUTES.classify(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_tier() {
        assert_eq!(classify("/login"), RouteTier::GuestOnly);
        assert_eq!(classify("/reset-password"), RouteTier::GuestOnly);
        assert_eq!(classify("/dashboard"), RouteTier::Protected);
        assert_eq!(classify("/dashboard/users"), RouteTier::Protected);
        assert_eq!(classify("/settings"), RouteTier::Protected);
        assert_eq!(classify("/admin"), RouteTier::Admin);
        assert_eq!(classify("/admin/users"), RouteTier::Admin);
        assert_eq!(classify("/"), RouteTier::Unrestricted);
        assert_eq!(classify("/verify-email"), RouteTier::Unrestricted);
    }

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        assert_eq!(classify("/dashboards"), RouteTier::Unrestricted);
        assert_eq!(classify("/loginx"), RouteTier::Unrestricted);
        assert_eq!(classify("/administrator"), RouteTier::Unrestricted);
    }

    #[test]
    fn exempt_paths_skip_every_check() {
        assert_eq!(classify("/api/rpc"), RouteTier::Unrestricted);
        assert_eq!(classify("/api/auth/sign-in"), RouteTier::Unrestricted);
        assert_eq!(classify("/health"), RouteTier::Unrestricted);
        assert_eq!(classify("/static/app.css"), RouteTier::Unrestricted);
        assert_eq!(classify("/favicon.ico"), RouteTier::Unrestricted);
    }

    #[test]
    fn earlier_lists_win() {
        const OVERLAP: RouteTable = RouteTable {
            exempt: &["/dashboard/public"],
            guest_only: &[],
            admin: &["/dashboard/admin"],
            protected: &["/dashboard"],
            sign_in: "/login",
        };
        assert_eq!(OVERLAP.classify("/dashboard/public/x"), RouteTier::Unrestricted);
        assert_eq!(OVERLAP.classify("/dashboard/admin"), RouteTier::Admin);
        assert_eq!(OVERLAP.classify("/dashboard/other"), RouteTier::Protected);
    }

    #[test]
    fn classification_is_deterministic() {
        for path in ["/", "/login", "/dashboard/x", "/admin", "/api"] {
            assert_eq!(classify(path), classify(path));
        }
    }
}
