//! Access tokens, password hashing and the authenticated-user extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::task::spawn_blocking;

use super::error::ApiError;
use super::ApiState;
use crate::config::AuthSettings;
use crate::errors::StudyError;
use crate::store::users::{find_by_email, UserRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the token holder.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

/// Signs and verifies HS256 access tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.secret_key.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(settings.token_ttl_minutes.saturating_mul(60)),
        }
    }

    pub fn issue(&self, email: &str) -> Result<AccessToken, StudyError> {
        self.issue_at(email, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, email: &str, now: OffsetDateTime) -> Result<AccessToken, StudyError> {
        let expires = now.checked_add(self.ttl).ok_or_else(|| {
            log::error!("token lifetime {} overflows the clock", self.ttl);
            StudyError::Unknown
        })?;
        let claims = Claims {
            sub: email.to_string(),
            exp: expires.unix_timestamp(),
            iat: now.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|err| {
            log::error!("failed to sign access token: {err}");
            StudyError::Unknown
        })?;
        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".into(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, StudyError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                log::debug!("rejected access token: {err}");
                StudyError::Unauthenticated
            })
    }
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    let hashed = spawn_blocking(move || bcrypt::hash(password, cost)).await?;
    hashed.map_err(|err| {
        log::error!("password hashing failed: {err}");
        ApiError(StudyError::Unknown)
    })
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let verified = spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    // A malformed stored hash never matches.
    Ok(verified.unwrap_or(false))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The active user named by the request's bearer token.
pub struct AuthUser(pub UserRecord);

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError(StudyError::Unauthenticated))?;
        let claims = state.tokens.verify(token)?;
        let user = state
            .with_conn(move |conn| find_by_email(conn, &claims.sub))
            .await?
            .ok_or(ApiError(StudyError::Unauthenticated))?;
        if !user.is_active {
            return Err(ApiError(StudyError::InactiveUser));
        }
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use secrecy::SecretString;

    fn service(ttl_minutes: i64) -> TokenService {
        TokenService::new(&AuthSettings {
            secret_key: SecretString::from("test-secret"),
            token_ttl_minutes: ttl_minutes,
            password_cost: 4,
        })
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = service(30);
        let issued = tokens.issue("ada@example.com").unwrap();
        assert_eq!(issued.token_type, "bearer");

        let claims = tokens.verify(&issued.access_token).unwrap();
        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let tokens = service(30);
        let stale = tokens
            .issue_at("ada@example.com", OffsetDateTime::now_utc() - Duration::hours(2))
            .unwrap();
        assert!(matches!(
            tokens.verify(&stale.access_token),
            Err(StudyError::Unauthenticated)
        ));

        let other = TokenService::new(&AuthSettings {
            secret_key: SecretString::from("other-secret"),
            ..AuthSettings::default()
        });
        let foreign = other.issue("ada@example.com").unwrap();
        assert!(tokens.verify(&foreign.access_token).is_err());
        assert!(tokens.verify("not-a-token").is_err());
    }

    #[test]
    fn unrepresentable_lifetime_fails_without_panicking() {
        let tokens = service(i64::MAX);
        assert!(matches!(
            tokens.issue("ada@example.com"),
            Err(StudyError::Unknown)
        ));
    }

    #[tokio::test]
    async fn password_round_trip() {
        let hash = hash_password("hunter22".into(), 4).await.unwrap();
        assert!(verify_password("hunter22".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".into(), hash).await.unwrap());
        assert!(!verify_password("x".into(), "garbage".into()).await.unwrap());
    }

    #[test]
    fn bearer_header_parsing() {
        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
