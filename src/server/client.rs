//! Caller identification for admission control.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use http::request::Parts;

/// Header set by reverse proxies with the original client chain.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Whether `X-Forwarded-For` is believed.
///
/// Only enable this behind a proxy that overwrites the header; otherwise any
/// caller can pick its own rate-limit bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardedFor {
    pub trusted: bool,
}

impl ForwardedFor {
    pub fn trusted() -> Self {
        Self { trusted: true }
    }

    pub fn ignored() -> Self {
        Self { trusted: false }
    }
}

/// The caller's network address, as best it can be determined.
///
/// With [`ForwardedFor::trusted`], the first `X-Forwarded-For` entry wins.
/// Otherwise the TCP peer address is used when the server was started with
/// connect info. `None` when neither is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub Option<String>);

impl ClientAddress {
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl<S> FromRequestParts<S> for ClientAddress
where
    ForwardedFor: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if ForwardedFor::from_ref(state).trusted {
            let forwarded = parts
                .headers
                .get(FORWARDED_FOR_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            if forwarded.is_some() {
                return Ok(ClientAddress(forwarded));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientAddress(peer))
    }
}
