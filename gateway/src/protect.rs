//! Handshake authorization.
//!
//! Every gateway instance is deployed with one [`PermissionChain`], chosen from
//! its [`PermissionPolicy`]. A chain is an ordered list of [`Predicate`]s
//! evaluated against the [`HandshakeRequest`] before the websocket upgrade is
//! accepted. Stricter policies run every layer of the policy they extend first,
//! so `StaffOnly` also checks everything `AuthenticatedOnly` checks.
//!
//! A failing layer rejects the handshake with **403 Permission denied**. No
//! connection state exists at that point, so there is nothing to undo.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use domain::{Identity, SessionStore};
use log::*;
use service::config::PermissionPolicy;

use crate::error::Error;

/// Connection metadata seen by the permission chain.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub path: String,
    pub headers: HeaderMap,
    /// Session key taken from the token query parameter. Empty values are `None`.
    pub token: Option<String>,
    /// `None` until resolved, and after resolution when the session store
    /// could not be consulted.
    pub identity: Option<Identity>,
}

impl HandshakeRequest {
    pub fn new(uri: &Uri, headers: HeaderMap, token_param: &str) -> Self {
        let token = Query::<HashMap<String, String>>::try_from_uri(uri)
            .ok()
            .and_then(|Query(mut params)| params.remove(token_param))
            .filter(|token| !token.is_empty());

        Self {
            path: uri.path().to_string(),
            headers,
            token,
            identity: None,
        }
    }

    /// Turns the token into an identity. A missing token or an unknown session
    /// key is the anonymous identity.
    pub async fn resolve(&mut self, sessions: &dyn SessionStore) {
        self.identity = match &self.token {
            None => Some(Identity::Anonymous),
            Some(token) => match sessions.find_user(token).await {
                Ok(Some(user)) => Some(Identity::User(user)),
                Ok(None) => Some(Identity::Anonymous),
                Err(e) => {
                    warn!("Session lookup failed during handshake on {}: {e}", self.path);
                    None
                }
            },
        };
    }
}

/// A single handshake rule: **"may this connection proceed?"**
///
/// ```rust,ignore
/// struct SameOrigin;
///
/// #[async_trait]
/// impl Check for SameOrigin {
///     async fn eval(&self, request: &HandshakeRequest) -> bool {
///         request.headers.get("origin").is_some_and(|origin| origin == "https://example.org")
///     }
/// }
/// ```
#[async_trait]
pub trait Check: Send + Sync {
    async fn eval(&self, request: &HandshakeRequest) -> bool;
}

/// A [`Check`] together with the name used when it rejects a handshake.
pub struct Predicate {
    predicate: Box<dyn Check>,
    name: &'static str,
}

impl Predicate {
    pub fn new<C: Check + 'static>(predicate: C) -> Self {
        let name = std::any::type_name::<C>()
            .rsplit("::")
            .next()
            .unwrap_or("Check");
        Self {
            predicate: Box::new(predicate),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn check(&self, request: &HandshakeRequest) -> bool {
        self.predicate.eval(request).await
    }
}

pub struct PermissionChain {
    policy: PermissionPolicy,
    predicates: Vec<Predicate>,
}

impl PermissionChain {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self {
            policy,
            predicates: Self::layers(policy),
        }
    }

    fn layers(policy: PermissionPolicy) -> Vec<Predicate> {
        let (parent, check) = match policy {
            PermissionPolicy::Open => return vec![],
            PermissionPolicy::TokenRequired => return vec![Predicate::new(TokenPresent)],
            PermissionPolicy::AnyUser => {
                (PermissionPolicy::TokenRequired, Predicate::new(IdentityResolved))
            }
            PermissionPolicy::AnonymousOnly => {
                (PermissionPolicy::AnyUser, Predicate::new(UserIsAnonymous))
            }
            PermissionPolicy::AuthenticatedOnly => {
                (PermissionPolicy::AnyUser, Predicate::new(UserIsAuthenticated))
            }
            PermissionPolicy::StaffOnly => {
                (PermissionPolicy::AuthenticatedOnly, Predicate::new(UserIsStaff))
            }
            PermissionPolicy::SuperuserOnly => {
                (PermissionPolicy::StaffOnly, Predicate::new(UserIsSuperuser))
            }
        };

        let mut layers = Self::layers(parent);
        layers.push(check);
        layers
    }

    /// Appends a deployment specific rule after the policy's own layers.
    pub fn with_check<C: Check + 'static>(mut self, check: C) -> Self {
        self.predicates.push(Predicate::new(check));
        self
    }

    pub fn policy(&self) -> PermissionPolicy {
        self.policy
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.predicates.iter().map(Predicate::name).collect()
    }

    /// Resolves the handshake's identity and runs every layer in order.
    pub async fn authorize(
        &self,
        sessions: &dyn SessionStore,
        mut request: HandshakeRequest,
    ) -> Result<Identity, Error> {
        request.resolve(sessions).await;

        for predicate in &self.predicates {
            if !predicate.check(&request).await {
                info!(
                    "Permission denied for handshake on {} ({} chain): {} failed",
                    request.path,
                    self.policy,
                    predicate.name()
                );
                return Err(Error::rejected(predicate.name()));
            }
        }

        // Only chains without IdentityResolved get here with no identity.
        Ok(request.identity.unwrap_or_default())
    }
}

pub struct TokenPresent;

#[async_trait]
impl Check for TokenPresent {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request.token.is_some()
    }
}

pub struct IdentityResolved;

#[async_trait]
impl Check for IdentityResolved {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request.identity.is_some()
    }
}

pub struct UserIsAnonymous;

#[async_trait]
impl Check for UserIsAnonymous {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request.identity.as_ref().is_some_and(Identity::is_anonymous)
    }
}

pub struct UserIsAuthenticated;

#[async_trait]
impl Check for UserIsAuthenticated {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request
            .identity
            .as_ref()
            .is_some_and(Identity::is_authenticated)
    }
}

pub struct UserIsStaff;

#[async_trait]
impl Check for UserIsStaff {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request.identity.as_ref().is_some_and(Identity::is_staff)
    }
}

pub struct UserIsSuperuser;

#[async_trait]
impl Check for UserIsSuperuser {
    async fn eval(&self, request: &HandshakeRequest) -> bool {
        request.identity.as_ref().is_some_and(Identity::is_superuser)
    }
}
