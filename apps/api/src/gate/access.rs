//! Access classification: who is calling and what they are entitled to.
//!
//! `classify_request` runs once per request, before routing, and stores an
//! `Access` in the request extensions. Everything downstream (the response
//! gate, the paid-only and admin guards, handlers) reads that value instead
//! of looking at headers again.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::debug;

use crate::auth::tokens::{Identity, TokenKeys};
use crate::errors::AppError;

/// Entitlement tiers, ordered from least to most access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entitlement {
    Anonymous,
    Free,
    Paid,
    Admin,
}

impl Entitlement {
    pub fn of(identity: Option<&Identity>) -> Self {
        match identity {
            None => Entitlement::Anonymous,
            Some(id) if id.is_admin => Entitlement::Admin,
            Some(id) if id.is_paid => Entitlement::Paid,
            Some(_) => Entitlement::Free,
        }
    }

    /// Admins see everything paid users see.
    pub fn has_paid_access(self) -> bool {
        self >= Entitlement::Paid
    }
}

/// What the `Authorization` header amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Missing,
    /// Present but malformed, expired or badly signed.
    Invalid,
    Verified(Identity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    credential: Credential,
    tier: Entitlement,
}

impl Access {
    pub fn anonymous() -> Self {
        Self {
            credential: Credential::Missing,
            tier: Entitlement::Anonymous,
        }
    }

    pub fn verified(identity: Identity) -> Self {
        Self {
            tier: Entitlement::of(Some(&identity)),
            credential: Credential::Verified(identity),
        }
    }

    /// Classifies a raw `Authorization` header value. Anything that fails
    /// verification is treated as anonymous, never as a paid caller.
    pub fn from_authorization(header: Option<&str>, keys: &TokenKeys) -> Self {
        let Some(header) = header else {
            return Self::anonymous();
        };
        let token = bearer_token(header);
        match keys.verify(token) {
            Ok(identity) => Self::verified(identity),
            Err(e) => {
                debug!("Rejected bearer token, continuing as anonymous: {e}");
                Self {
                    credential: Credential::Invalid,
                    tier: Entitlement::Anonymous,
                }
            }
        }
    }

    pub fn tier(&self) -> Entitlement {
        self.tier
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.credential {
            Credential::Verified(identity) => Some(identity),
            _ => None,
        }
    }

    /// The verified identity, or the 401 a protected endpoint should return.
    pub fn require_identity(&self) -> Result<&Identity, AppError> {
        match &self.credential {
            Credential::Verified(identity) => Ok(identity),
            Credential::Missing => Err(AppError::Unauthorized),
            Credential::Invalid => Err(AppError::InvalidToken),
        }
    }
}

fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    match header.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => header[7..].trim(),
        _ => header,
    }
}

/// Middleware: classify the caller and stash the result in request extensions.
pub async fn classify_request(
    State(keys): State<TokenKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let access = Access::from_authorization(header, &keys);
    request.extensions_mut().insert(access);
    next.run(request).await
}

/// Middleware: only authenticated admins get past this layer.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let access = request
        .extensions()
        .get::<Access>()
        .cloned()
        .unwrap_or_else(Access::anonymous);
    access.require_identity()?;
    if access.tier() != Entitlement::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(next.run(request).await)
}

fn access_from_parts(parts: &Parts) -> Access {
    parts
        .extensions
        .get::<Access>()
        .cloned()
        .unwrap_or_else(Access::anonymous)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Access {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(access_from_parts(parts))
    }
}

/// Extractor for endpoints reserved to paid users and admins.
#[derive(Debug, Clone)]
pub struct PaidAccess(pub Access);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PaidAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let access = access_from_parts(parts);
        if access.tier().has_paid_access() {
            Ok(PaidAccess(access))
        } else {
            Err(AppError::PaidPlanRequired)
        }
    }
}

/// Extractor for endpoints that need a signed-in user of any tier.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        access_from_parts(parts)
            .require_identity()
            .cloned()
            .map(AuthUser)
    }
}
