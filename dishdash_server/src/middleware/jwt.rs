//! Bearer token middleware for Actix Web.
//!
//! Wrap a scope with this middleware to require a valid access token on every request in it. The token is read from
//! the `Authorization: Bearer <token>` header and verified with [`TokenValidator`]. On success, the token's
//! [`JwtClaims`] are placed in the request extensions, where handlers (and the ACL middleware) pick them up. Requests
//! without a valid token get a 401 response.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{JwtClaims, TokenValidator},
    errors::ServerError,
};

pub struct JwtAuthMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtAuthMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        JwtAuthMiddlewareFactory { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService { validator: self.validator.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    validator: TokenValidator,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
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
        let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let result = self.validator.validate_header(header);
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let claims: JwtClaims = result.map_err(|e| {
                debug!("💻️ Rejecting request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("💻️ {} ({}) authenticated for {}", claims.user_id, claims.role, req.path());
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
