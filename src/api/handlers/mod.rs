//! HTTP handlers: auth endpoints, health and the page shells.

pub mod auth;
pub mod health;
pub mod pages;
