//! HTTP server layer for the image gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                   GET /cdn/{*name}?w=&h=&f=&q=&fit=             │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌───────────────────┐   │
//! │  │  handlers   │  │      client      │  │      routes       │   │
//! │  │ (requests,  │  │ (caller address  │  │  (router config,  │   │
//! │  │  errors)    │  │  for admission)  │  │   CORS, tracing)  │   │
//! │  └─────────────┘  └──────────────────┘  └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod handlers;
pub mod routes;

pub use client::{ClientAddress, ForwardedFor, FORWARDED_FOR_HEADER};
pub use handlers::{
    asset_handler, health_handler, missing_asset_handler, AppState, ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig, DEFAULT_ROUTE_PREFIX};
