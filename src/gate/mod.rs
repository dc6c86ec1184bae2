//! Edge gate: route classification, callback sanitizing and the optimistic
//! cookie-presence middleware.

pub mod callback;
pub mod edge;
pub mod routes;

pub use callback::{sanitize, sign_in_redirect};
pub use edge::{EdgeDecision, decide, edge_gate, see_other};
pub use routes::{ROUTES, RouteTable, RouteTier, classify};
