use crate::config::AuthConfig;
use crate::errors::RailError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Checks `x-api-key` / `x-api-secret` against the configured credentials.
/// With no credentials configured every request passes through.
pub struct ApiKeyAuth {
    credentials: Rc<AuthConfig>,
}

impl ApiKeyAuth {
    pub fn new(credentials: AuthConfig) -> Self {
        Self {
            credentials: Rc::new(credentials),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service: Rc::new(service),
            credentials: self.credentials.clone(),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: Rc<S>,
    credentials: Rc<AuthConfig>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Skip auth for health and metrics endpoints
        if !self.credentials.is_enforced() || req.path() == "/health" || req.path() == "/metrics"
        {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await });
        }

        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        let api_key = header(API_KEY_HEADER);
        let api_secret = header(API_SECRET_HEADER);

        if api_key != self.credentials.api_key || api_secret != self.credentials.api_secret {
            tracing::warn!("Rejected request to {} with invalid API credentials", req.path());
            return Box::pin(async { Err(RailError::Unauthorized.into()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
