//! Gateway authentication middleware for Actix Web.
//!
//! The server sits behind the marketplace's API gateway, which authenticates users and forwards who they are in
//! three headers:
//! * `fps-user-id`: the caller's user id,
//! * `fps-roles`: a comma-separated list of roles,
//! * `fps-signature`: hex-encoded HMAC-SHA256 of `"{user_id}:{roles}"`, keyed with `FPS_GATEWAY_SECRET`.
//!
//! Requests with a missing or bad signature are refused with 401. Otherwise the caller's [`Principal`] is stored in
//! the request extensions, where the ACL middleware and the handlers pick it up.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use fee_payment_engine::db_types::{Principal, UserId};
use fpe_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{
    errors::{AuthError, ServerError},
    helpers::{parse_roles, verify_signature, ROLES_HEADER, SIGNATURE_HEADER, USER_ID_HEADER},
};

pub struct GatewayAuthFactory {
    secret: Secret<String>,
}

impl GatewayAuthFactory {
    pub fn new(secret: Secret<String>) -> Self {
        GatewayAuthFactory { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GatewayAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = GatewayAuthService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GatewayAuthService { secret: self.secret.clone(), service: Rc::new(service) }))
    }
}

pub struct GatewayAuthService<S> {
    secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for GatewayAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let identity = authenticate(&req, self.secret.reveal());
        Box::pin(async move {
            let principal = identity.map_err(|e| {
                warn!("🔐️ Refusing {} {}. {e}", req.method(), req.path());
                Error::from(ServerError::AuthenticationError(e))
            })?;
            trace!("🔐️ {} authenticated with roles {:?}", principal.user_id, principal.roles);
            req.extensions_mut().insert(principal);
            service.call(req).await
        })
    }
}

fn header<'a>(req: &'a ServiceRequest, name: &'static str) -> Result<&'a str, AuthError> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).ok_or(AuthError::MissingIdentity(name))
}

fn authenticate(req: &ServiceRequest, secret: &str) -> Result<Principal, AuthError> {
    let user_id = header(req, USER_ID_HEADER)?.trim();
    if user_id.is_empty() {
        return Err(AuthError::MissingIdentity(USER_ID_HEADER));
    }
    let roles = header(req, ROLES_HEADER)?;
    let signature = header(req, SIGNATURE_HEADER)?;
    // An unset secret must never validate anything
    if secret.is_empty() || !verify_signature(secret, user_id, roles, signature) {
        return Err(AuthError::InvalidSignature);
    }
    let roles = parse_roles(roles)?;
    Ok(Principal { user_id: UserId::from(user_id), roles })
}
