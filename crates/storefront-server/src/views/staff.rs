//! Staff sign-in for browser sessions.
//!
//! A valid staff token is stored in an http-only, same-site cookie that the
//! staff gate accepts in place of a bearer header.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::middleware::{StaffAuth, STAFF_COOKIE};

use super::{render, PageResult};

const DEFAULT_NEXT: &str = "/products/";

#[derive(Template)]
#[template(path = "staff/login.html")]
struct LoginTemplate {
    next: String,
    error: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    token: String,
    next: Option<String>,
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_next(raw: Option<&str>) -> String {
    match raw {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_owned()
        }
        _ => DEFAULT_NEXT.to_owned(),
    }
}

fn staff_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((STAFF_COOKIE, token.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// GET /staff/login/
pub(super) async fn login_form(Query(query): Query<LoginQuery>) -> PageResult {
    render(&LoginTemplate {
        next: safe_next(query.next.as_deref()),
        error: None,
    })
}

/// POST /staff/login/
pub(super) async fn login(
    State(staff): State<StaffAuth>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult<Response> {
    let next = safe_next(form.next.as_deref());
    let token = form.token.trim();

    if !token.is_empty() && staff.is_staff(token) {
        tracing::info!("staff session started");
        return Ok((jar.add(staff_cookie(token)), Redirect::to(&next)).into_response());
    }

    tracing::warn!("staff sign-in refused");
    let page = render(&LoginTemplate {
        next,
        error: Some("That is not a staff token."),
    })?;
    Ok((StatusCode::UNAUTHORIZED, page).into_response())
}

/// POST /staff/logout/
pub(super) async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(Cookie::build(STAFF_COOKIE).path("/")),
        Redirect::to(DEFAULT_NEXT),
    )
}
