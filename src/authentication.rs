// callers are browsers that already hold a session with the hosted auth
// platform; they forward the platform's access token (a HS256 JWT) as a bearer
// token, and all we need out of it is the user id in `sub`

mod middleware;

use actix_web::http::header::HeaderMap;
use actix_web::http::header::AUTHORIZATION;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
pub use middleware::reject_unauthenticated;
pub use middleware::UserId;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// The subset of the platform's claims that we check. `exp` and `aud` are
/// validated by `jsonwebtoken` itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub aud: String,
    pub exp: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(
        jwt_secret: &Secret<String>,
        audience: &str,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Returns the authenticated user id (`sub`)
    pub fn verify(
        &self,
        token: &str,
    ) -> Result<Uuid, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(AuthError::InvalidToken)?;
        Ok(data.claims.sub)
    }
}

/// Parse the `Authorization: Bearer <token>` header. This does not validate
/// the token; for that, see `TokenVerifier::verify`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}
