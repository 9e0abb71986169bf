pub mod activity;
pub mod auth;
mod client;
pub mod notifications;
mod provider;
pub mod rate_limit;

pub use client::GitHubClient;
pub use provider::GitHubProvider;
