use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bootstrap::config::Config;

/// Tokens are issued by the account service; this API only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub struct Bearer(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 1) Prefer Authorization header if present
        if let Some(auth) = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(t) = auth.strip_prefix("Bearer ") {
                return Ok(Bearer(t.to_string()));
            }
        }

        // 2) Fallback to HttpOnly cookie `access_token`
        if let Some(cookie_hdr) = parts
            .headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = get_cookie(cookie_hdr, "access_token") {
                return Ok(Bearer(token));
            }
        }

        Err(StatusCode::UNAUTHORIZED)
    }
}

pub(crate) fn validate_bearer(cfg: &Config, bearer: Bearer) -> Result<String, StatusCode> {
    let data = jsonwebtoken::decode::<Claims>(
        &bearer.0,
        &DecodingKey::from_secret(cfg.jwt_secret_pem.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok(data.claims.sub)
}

/// The authenticated user id, or 401.
pub fn require_user(cfg: &Config, bearer: Bearer) -> Result<Uuid, StatusCode> {
    let sub = validate_bearer(cfg, bearer)?;
    Uuid::parse_str(&sub).map_err(|_| StatusCode::UNAUTHORIZED)
}

/// Anonymous readers are allowed; an invalid token is treated as anonymous.
pub fn optional_user(cfg: &Config, bearer: Option<Bearer>) -> Option<Uuid> {
    bearer.and_then(|b| require_user(cfg, b).ok())
}

fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    for part in cookie_header.split(';') {
        let kv = part.trim();
        if let Some((k, v)) = kv.split_once('=') {
            if k.trim() == name {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::config::DbBackend;
    use jsonwebtoken::{EncodingKey, Header};

    fn cfg() -> Config {
        Config {
            api_port: 0,
            frontend_url: None,
            database_url: String::new(),
            db_max_connections: 10,
            db_backend: DbBackend::Memory,
            jwt_secret_pem: "test-secret-for-hobbylog".into(),
            tag_name_max_chars: 64,
            referrers_default_limit: 20,
            is_production: false,
        }
    }

    fn token(secret: &str, sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let cfg = cfg();
        let uid = Uuid::new_v4();
        let got = require_user(&cfg, Bearer(token(&cfg.jwt_secret_pem, &uid.to_string())));
        assert_eq!(got, Ok(uid));
    }

    #[test]
    fn wrong_secret_or_subject_is_unauthorized() {
        let cfg = cfg();
        let forged = Bearer(token("another-secret", &Uuid::new_v4().to_string()));
        assert_eq!(require_user(&cfg, forged), Err(StatusCode::UNAUTHORIZED));
        let not_uuid = Bearer(token(&cfg.jwt_secret_pem, "someone"));
        assert_eq!(require_user(&cfg, not_uuid), Err(StatusCode::UNAUTHORIZED));
        assert_eq!(optional_user(&cfg, Some(Bearer("garbage".into()))), None);
    }

    #[test]
    fn cookie_lookup_matches_exact_name() {
        let hdr = "theme=dark; access_token=abc.def ; other=1";
        assert_eq!(get_cookie(hdr, "access_token").as_deref(), Some("abc.def"));
        assert_eq!(get_cookie(hdr, "access"), None);
    }
}
