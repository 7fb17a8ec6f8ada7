//! Authentication middleware
//!
//! Tokens are issued by the external auth service; this layer only verifies
//! them and turns the claims into the actor context used by the services.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorDetail, ErrorResponse};
use crate::AppState;

/// Organization role of the actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Officer,
    Manager,
    Owner,
    Admin,
}

impl Role {
    /// Managers, owners and admins oversee every farmer of their organization
    pub fn oversees_organization(&self) -> bool {
        matches!(self, Role::Manager | Role::Owner | Role::Admin)
    }
}

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub user_name: String,
    pub organization_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Whether the actor manages a farmer with the given organization and
    /// officer
    pub fn manages(&self, organization_id: Uuid, officer_id: Uuid) -> bool {
        if self.organization_id != organization_id {
            return false;
        }
        self.role.oversees_organization() || self.user_id == officer_id
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    organization_id: String,
    role: Role,
    exp: i64,
    iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let organization_id = match Uuid::parse_str(&claims.organization_id) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid organization ID in token"),
    };

    let auth_user = AuthUser {
        user_id,
        user_name: claims.name,
        organization_id,
        role: claims.role,
    };

    tracing::trace!(user_id = %auth_user.user_id, role = ?auth_user.role, "authenticated request");
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            user_name: "Officer".to_string(),
            organization_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_officer_manages_own_farmers_only() {
        let officer = user(Role::Officer);
        assert!(officer.manages(officer.organization_id, officer.user_id));
        assert!(!officer.manages(officer.organization_id, Uuid::new_v4()));
    }

    #[test]
    fn test_manager_scoped_to_organization() {
        let manager = user(Role::Manager);
        assert!(manager.manages(manager.organization_id, Uuid::new_v4()));
        assert!(!manager.manages(Uuid::new_v4(), Uuid::new_v4()));
    }

    #[test]
    fn test_claims_decode_with_matching_secret() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            name: "Rahim".to_string(),
            organization_id: Uuid::new_v4().to_string(),
            role: Role::Officer,
            exp: now + 3600,
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let decoded = decode_jwt(&token, "test-secret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, Role::Officer);
        assert!(decode_jwt(&token, "other-secret").is_err());
    }
}
