//! # DishDash server
//! This crate hosts the HTTP surface of the DishDash order engine. It is responsible for:
//! * Authenticating callers with bearer tokens and enforcing role-based access on each route.
//! * Translating requests into calls on the engine APIs, and engine errors into HTTP responses.
//! * Receiving payment processor webhooks.
//! * Streaming real-time status bus rooms to clients as Server-Sent Events.
//! * Retrying side effects that failed, in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! `/health` and `/payments/webhook` are public. Everything else lives under `/api` and needs a bearer token. See
//! [routes](routes/index.html) for the full list.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod outbox_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
