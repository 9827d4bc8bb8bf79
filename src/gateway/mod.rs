//! Gateway layer.
//!
//! Ties the collaborators together into the per-request protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ AssetRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                Gateway                  │
//! │  ┌─────────────┐  ┌──────────────────┐  │
//! │  │ RateLimiter │  │ DerivativeCache  │  │
//! │  └─────────────┘  └──────────────────┘  │
//! │  ┌─────────────┐  ┌──────────────────┐  │
//! │  │ Transformer │  │   OriginStore    │  │
//! │  └─────────────┘  └──────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ AssetResponse + CacheStatus
//!                      ▼
//! ```
//!
//! # Components
//!
//! - [`Gateway`]: runs the request protocol
//! - [`AssetRequest`] / [`AssetResponse`]: transport-independent request and result
//! - [`CacheStatus`]: the status marker carried by every response

mod service;
mod status;

pub use service::{AssetRequest, AssetResponse, Gateway};
pub use status::{CacheStatus, CACHE_STATUS_HEADER};
