use std::collections::HashMap;

use actix_web::web;
use actix_web::web::Data;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use bytes::Bytes;
use serde_json::Value;

use crate::options::{form_url, OptionsClient};
use crate::settings::Settings;
use crate::state::LocalState;

pub const API_NAMESPACE: &str = "slurm-provisioner";

pub struct AppState {
    pub settings: Settings,
    pub local: LocalState,
    pub options: OptionsClient,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            local: LocalState::new(&settings),
            options: OptionsClient::new()?,
            settings,
        })
    }
}

/// Join URL path pieces with single slashes, keeping a leading slash of the
/// first piece and a trailing slash of the last.
pub fn url_path_join(pieces: &[&str]) -> String {
    let initial = pieces.first().is_some_and(|p| p.starts_with('/'));
    let trailing = pieces.last().is_some_and(|p| p.ends_with('/'));

    let mut result = pieces
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if initial {
        result.insert(0, '/');
    }
    if trailing {
        result.push('/');
    }
    if result == "//" {
        result = "/".to_string();
    }

    result
}

/// Register the three endpoints under `{base_url}/slurm-provisioner/`.
pub fn configure(cfg: &mut web::ServiceConfig, base_url: &str) {
    let route = |name: &str| url_path_join(&[base_url, API_NAMESPACE, name]);

    cfg.route(&route("local"), web::get().to(handle_local))
        .route(&route("all"), web::get().to(handle_all))
        .route(&route("configure"), web::post().to(handle_configure));
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Token from `Authorization: token <t>` or `Authorization: Bearer <t>`,
/// scheme matched case-insensitively.
fn header_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;

    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

fn authorized(settings: &Settings, req: &HttpRequest) -> bool {
    let Some(expected) = settings.token.as_deref() else {
        return settings.allow_unauthenticated;
    };

    let from_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(header_token);

    if from_header.is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes())) {
        return true;
    }

    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.get("token").cloned())
        .is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
}

fn forbidden(req: &HttpRequest) -> HttpResponse {
    log::warn!("rejected unauthenticated request to {}", req.path());

    HttpResponse::Forbidden().json(serde_json::json!({ "message": "Forbidden" }))
}

// File access below runs on the blocking pool, not on the actix workers.

async fn handle_local(data: Data<AppState>, req: HttpRequest) -> actix_web::Result<HttpResponse> {
    if !authorized(&data.settings, &req) {
        return Ok(forbidden(&req));
    }

    let snapshot = web::block(move || data.local.read_local_state()).await?;

    Ok(HttpResponse::Ok().json(snapshot))
}

async fn handle_all(data: Data<AppState>, req: HttpRequest) -> actix_web::Result<HttpResponse> {
    if !authorized(&data.settings, &req) {
        return Ok(forbidden(&req));
    }

    let settings = &data.settings;

    let api_url = match &settings.hub_api_url {
        Some(url) => url.clone(),
        None => {
            let info = req.connection_info();
            format!("{}://{}/hub/api", info.scheme(), info.host())
        }
    };

    let url = form_url(
        &api_url,
        settings.hub_user.as_deref(),
        settings.server_name.as_deref(),
    );

    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let mut body = data.options.fetch_form(&url, authorization).await;

    let local = data.clone();
    let snapshot = web::block(move || local.local.read_local_state()).await?;

    body.insert("allocations".to_string(), snapshot.allocations);
    body.insert("current_config".to_string(), snapshot.current_config);
    body.insert(
        "documentationhref".to_string(),
        Value::String(settings.documentation_href.clone()),
    );

    Ok(HttpResponse::Ok().json(body))
}

async fn handle_configure(
    data: Data<AppState>,
    req: HttpRequest,
    body: Bytes,
) -> actix_web::Result<HttpResponse> {
    if !authorized(&data.settings, &req) {
        return Ok(forbidden(&req));
    }

    web::block(move || data.local.write_config(&body)).await??;

    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_path_join() {
        assert_eq!(
            url_path_join(&["/", "slurm-provisioner", "local"]),
            "/slurm-provisioner/local"
        );
        assert_eq!(
            url_path_join(&["/user/alice/", "slurm-provisioner", "configure"]),
            "/user/alice/slurm-provisioner/configure"
        );
        assert_eq!(url_path_join(&["/", "/"]), "/");
        assert_eq!(url_path_join(&["a", "b/"]), "a/b/");
    }

    #[test]
    fn test_header_token_schemes() {
        assert_eq!(header_token("token abc"), Some("abc"));
        assert_eq!(header_token("Token abc"), Some("abc"));
        assert_eq!(header_token("Bearer abc"), Some("abc"));
        assert_eq!(header_token("bearer abc"), Some("abc"));
        assert_eq!(header_token("Basic abc"), None);
        assert_eq!(header_token("abc"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cret!"));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
