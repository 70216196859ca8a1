use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::middleware::Session;
use crate::auth::token::Identity;
use crate::error::AppError;

/// The verified caller of a request.
///
/// Resolved by `SessionMiddleware`; handlers that take this extractor reject
/// anonymous and invalid sessions with `AppError::Unauthorized` before their
/// body runs, so no store access happens for them.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<Session>() {
            Some(Session::Authenticated(identity)) => Ok(AuthenticatedUser(identity.clone())),
            Some(Session::Anonymous) => Err(AppError::Unauthorized("No token provided".into())),
            Some(Session::Invalid) => Err(AppError::Unauthorized("Invalid token".into())),
            None => {
                log::error!("no session resolved for {}; is SessionMiddleware applied?", req.path());
                Err(AppError::Unauthorized("Unauthorized".into()))
            }
        };
        ready(result.map_err(ActixError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use uuid::Uuid;

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_success() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            email: "user@example.com".into(),
        };
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut()
            .insert(Session::Authenticated(identity.clone()));

        let mut payload = Payload::None;
        let extracted = AuthenticatedUser::from_request(&req, &mut payload).await;
        assert_eq!(extracted.unwrap().0, identity);
    }

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_rejections() {
        for session in [Some(Session::Anonymous), Some(Session::Invalid), None] {
            let req = test::TestRequest::default().to_http_request();
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }

            let mut payload = Payload::None;
            let err = AuthenticatedUser::from_request(&req, &mut payload)
                .await
                .unwrap_err();
            assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
        }
    }
}
