//! Bearer token authentication.
//!
//! Every `/api` request carries an `Authorization: Bearer <token>` header. The token is an HS256-signed JWT whose
//! custom claims are [`JwtClaims`]: the caller's user id and role. Tokens for end users are minted by the external
//! user service, which shares `DD_JWT_SECRET` with this server. Tokens for sibling services are minted with
//! `dishdash_server --issue-service-token <name>`.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use dishdash_common::Secret;
use dishdash_engine::{db_types::Role, realtime::Room};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    TimeOptions,
    Token,
    UntrustedToken,
};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: String,
    pub role: Role,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(user_id: S, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Staff may act on anyone's behalf. Everyone else may only act on their own.
    pub fn may_act_for(&self, user_id: &str) -> bool {
        self.is_staff() || self.user_id == user_id
    }
}

/// The claims are placed in the request extensions by the authentication middleware. Extracting them in a handler
/// outside the authenticated scope fails with 401.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

fn signing_key(secret: &Secret<String>) -> Hs256Key {
    Hs256Key::new(secret.reveal().as_bytes())
}

/// Signs access tokens.
pub struct TokenIssuer {
    secret: Secret<String>,
    lifetime: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.jwt_secret.clone(), lifetime: config.token_lifetime }
    }

    /// Issue a new access token carrying the given claims, valid for `duration`, or the configured lifetime if
    /// `None`.
    pub fn issue_token(&self, claims: JwtClaims, duration: Option<chrono::Duration>) -> Result<String, AuthError> {
        if !Room::is_valid_user_id(&claims.user_id) {
            return Err(AuthError::CouldNotIssueToken(format!("'{}' is not a usable user id", claims.user_id)));
        }
        let duration = duration.unwrap_or(self.lifetime);
        let header = Header::empty().with_token_type("JWT");
        let claims = Claims::new(claims).set_duration_and_issuance(&TimeOptions::default(), duration);
        Hs256
            .token(&header, &claims, &signing_key(&self.secret))
            .map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))
    }

    /// Issue a token for a sibling service. Services carry the `service` role and their name as the user id.
    pub fn issue_service_token(&self, name: &str) -> Result<String, AuthError> {
        info!("🔑️ Issuing a service token for {name}");
        self.issue_token(JwtClaims::new(name, Role::Service), None)
    }
}

/// Verifies access tokens.
#[derive(Clone)]
pub struct TokenValidator {
    secret: Secret<String>,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.jwt_secret.clone() }
    }

    /// Checks the signature and expiry of the token and returns its claims.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let token: Token<JwtClaims> = Hs256
            .validator(&signing_key(&self.secret))
            .validate(&untrusted)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        token.claims().validate_expiration(&TimeOptions::default()).map_err(|e| {
            debug!("🔑️ Access token for {} has expired", token.claims().custom.user_id);
            AuthError::ValidationError(e.to_string())
        })?;
        let (_, claims) = token.into_parts();
        Ok(claims.custom)
    }

    /// Pulls the token out of an `Authorization: Bearer <token>` header value.
    pub fn validate_header(&self, header: Option<&str>) -> Result<JwtClaims, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Bearer <token>'".into()))?;
        self.validate(token)
    }
}
