pub mod authentication;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod rate_limit;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod templates;
pub mod utils;
