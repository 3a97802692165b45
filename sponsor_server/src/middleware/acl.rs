//! Access control middleware for the admin routes.
//!
//! Requests must carry `Authorization: Bearer <token>`, where the token matches the configured admin token
//! ([`AdminCredentials`], registered as app data). Anything else is answered with 401, or 403 if no admin token has
//! been configured at all, before the wrapped handler runs.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    web,
    Error,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use sha2::{Digest, Sha256};
use sponsor_common::Secret;

use crate::errors::{AuthError, ServerError};

/// The admin bearer token
#[derive(Clone, Debug, Default)]
pub struct AdminCredentials {
    token: Secret<String>,
}

impl AdminCredentials {
    pub fn new(token: Secret<String>) -> Self {
        Self { token }
    }

    pub fn is_enabled(&self) -> bool {
        !self.token.reveal().trim().is_empty()
    }

    /// Compares digests rather than the tokens themselves, so the comparison time does not depend on how much of the
    /// token was guessed correctly.
    pub fn matches(&self, presented: &str) -> bool {
        self.is_enabled() && Sha256::digest(presented.as_bytes()) == Sha256::digest(self.token.reveal().as_bytes())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

#[derive(Clone, Copy, Default)]
pub struct AclMiddlewareFactory;

impl AclMiddlewareFactory {
    pub fn admin_only() -> Self {
        AclMiddlewareFactory
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let verdict = match req.app_data::<web::Data<AdminCredentials>>() {
                None => {
                    error!("🔐️ No admin credentials are registered with the app. Denying access.");
                    Err(ServerError::ConfigurationError("Admin access is misconfigured".into()))
                },
                Some(creds) if !creds.is_enabled() => Err(AuthError::AdminDisabled.into()),
                Some(creds) => match bearer_token(req.headers()) {
                    None => Err(AuthError::MissingCredentials.into()),
                    Some(token) if creds.matches(token) => Ok(()),
                    Some(_) => Err(AuthError::InvalidCredentials.into()),
                },
            };
            match verdict {
                Ok(()) => {
                    trace!("🔐️ Admin access granted for {}", req.path());
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                },
                Err(e) => {
                    warn!("🔐️ Admin access denied for {}. {e}", req.path());
                    Ok(req.error_response(e).map_into_right_body())
                },
            }
        })
    }
}
