//! Edge server for the hireline marketplace.
//!
//! The edge sits in front of page rendering. It handles:
//!
//! - Route guarding from the `user-roles` cookie, before any page renders
//! - Writing and clearing the signed, HTTP-only role cookie for the client
//! - Legacy path rewrites
//!
//! The cookie is trusted for routing only. Data requests go to the API,
//! which checks the caller's token on every call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Browser                            │
//! │              (page navigation / role cookie)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       hireline-edge                         │
//! │  ┌─────────────┐ ┌─────────────────┐ ┌─────────────────┐   │
//! │  │ Route Guard │ │ /session/roles  │ │  Page fallback  │   │
//! │  │ (policy)    │ │ PUT / DELETE    │ │                 │   │
//! │  └─────────────┘ └─────────────────┘ └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  Marketplace API │
//!                    │  (GET /auth/me)  │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hireline_edge::{create_router, EdgeConfig, EdgeState, HttpRoleResolver};
//! use hireline_http::{ClientConfig, HttpGateway, NoToken};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EdgeConfig::default();
//! let gateway = HttpGateway::new(
//!     ClientConfig::with_base_url(config.api_base_url.clone()),
//!     Arc::new(NoToken),
//! )?;
//! let resolver = Arc::new(HttpRoleResolver::new(gateway, config.identity_endpoint.clone()));
//!
//! let listen_addr = config.listen_addr.clone();
//! let app = create_router(EdgeState::new(resolver, config)?, None);
//!
//! let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cookie;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod resolver;
pub mod routes;
pub mod state;

pub use config::EdgeConfig;
pub use error::EdgeError;
pub use guard::{evaluate, normalize_path, Decision, GuardRequest};
pub use policy::{LegacyRedirect, PolicyStep, RoleRule, RoutePolicy, RouteTables};
pub use resolver::{HttpRoleResolver, RoleResolver};
pub use routes::create_router;
pub use state::EdgeState;
