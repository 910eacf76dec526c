//! HTTP access to the organization's REST API.

mod rest;

pub use rest::RestClient;
