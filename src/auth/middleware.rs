use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::cookie::token_from_headers;
use crate::auth::token::{Identity, TokenCodec};

/// Outcome of looking at a request's session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// No session cookie was sent.
    Anonymous,
    /// A cookie was sent but its token did not verify.
    Invalid,
    Authenticated(Identity),
}

pub fn resolve_session(codec: &TokenCodec, headers: &HeaderMap) -> Session {
    match token_from_headers(headers) {
        None => Session::Anonymous,
        Some(token) => match codec.verify(&token) {
            Some(identity) => Session::Authenticated(identity),
            None => Session::Invalid,
        },
    }
}

/// Resolves the session cookie of every request it wraps and stores the
/// [`Session`] in request extensions.
///
/// It never rejects a request itself: routes that need a user ask for an
/// `AuthenticatedUser`, public routes simply ignore the session.
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService { service }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let session = match req.app_data::<web::Data<TokenCodec>>() {
            Some(codec) => resolve_session(codec, req.headers()),
            None => {
                log::error!("TokenCodec is not registered as app data; no session can be verified");
                Session::Anonymous
            }
        };

        if session == Session::Invalid {
            log::debug!("invalid session cookie on {} {}", req.method(), req.path());
        }

        req.extensions_mut().insert(session);
        Box::pin(self.service.call(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use uuid::Uuid;

    #[test]
    fn test_resolve_session() {
        let codec = TokenCodec::new("middleware_secret");
        let identity = Identity {
            user_id: Uuid::new_v4(),
            email: "user@example.com".into(),
        };
        let token = codec.issue(&identity).unwrap();

        let anonymous = TestRequest::default().to_http_request();
        assert_eq!(resolve_session(&codec, anonymous.headers()), Session::Anonymous);

        let invalid = TestRequest::default()
            .insert_header(("Cookie", "token=garbage"))
            .to_http_request();
        assert_eq!(resolve_session(&codec, invalid.headers()), Session::Invalid);

        let valid = TestRequest::default()
            .insert_header(("Cookie", format!("token={}", token)))
            .to_http_request();
        assert_eq!(
            resolve_session(&codec, valid.headers()),
            Session::Authenticated(identity)
        );
    }
}
