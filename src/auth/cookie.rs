//! The session cookie: reading it from request headers and writing or clearing
//! it on responses.

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header::{HeaderMap, COOKIE};
use actix_web::HttpResponseBuilder;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Finds the session token in raw `Cookie` header values.
///
/// Only an exact `token=` pair counts; empty values are treated as absent.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Looks through every `Cookie` header of a request for the session token.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_owned)
}

/// Builds the session cookie for `token`, living as long as the token does.
pub fn session_cookie(token: &str, max_age: chrono::Duration) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_owned())
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .same_site(SameSite::Lax)
        .finish()
}

/// An empty, already expired session cookie that replaces the current one.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .http_only(true)
        .path("/")
        .max_age(time::Duration::ZERO)
        .same_site(SameSite::Lax)
        .finish()
}

pub fn attach(response: &mut HttpResponseBuilder, token: &str, max_age: chrono::Duration) {
    response.cookie(session_cookie(token, max_age));
}

pub fn clear(response: &mut HttpResponseBuilder) {
    response.cookie(removal_cookie());
}
