//! Access control list middleware for the platform fee server.
//! This middleware can be placed on any route or service inside the gateway-authenticated scope.
//!
//! It checks the caller attached by the gateway authentication middleware against the roles the route requires. If
//! the caller holds every required role, the request continues. Otherwise a 403 Forbidden response is returned.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use fee_payment_engine::db_types::{Principal, Role};
use futures::future::{ok, Ready};
use log::warn;

use crate::{
    errors::{AuthError, ServerError},
    helpers::USER_ID_HEADER,
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
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
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
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
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let principal = req.extensions().get::<Principal>().cloned().ok_or_else(|| {
                warn!("🔐️ No authenticated caller found in request extensions");
                Error::from(ServerError::AuthenticationError(AuthError::MissingIdentity(USER_ID_HEADER)))
            })?;
            if required_roles.iter().all(|role| principal.has_role(*role)) {
                service.call(req).await
            } else {
                warn!("🔐️ {} lacks {required_roles:?} for {}", principal.user_id, req.path());
                let needed = required_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(format!("Requires {needed}")))
                    .into())
            }
        })
    }
}
