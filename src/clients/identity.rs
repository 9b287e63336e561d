use uuid::Uuid;

use crate::{
    api::error,
    utils::{Claims, TypeClaims},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Introspection {
    pub valid: bool,
    pub user_id: Option<Uuid>,
}

impl Introspection {
    pub fn invalid() -> Self {
        Self { valid: false, user_id: None }
    }
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<Introspection, error::SystemError>;
}

/// Verify access token bằng shared secret (HS256) do identity service phát hành
#[derive(Clone)]
pub struct JwtIdentityVerifier {
    secret: Vec<u8>,
}

impl JwtIdentityVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: secret.as_ref().to_vec() }
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn introspect(&self, token: &str) -> Result<Introspection, error::SystemError> {
        let claims = match Claims::decode(token, &self.secret) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Token introspection failed: {}", e);
                return Ok(Introspection::invalid());
            }
        };

        // Chỉ chấp nhận access token
        if claims._type.as_ref() != Some(&TypeClaims::AccessToken) {
            return Ok(Introspection::invalid());
        }

        Ok(Introspection { valid: true, user_id: Some(claims.sub) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_access_token_is_valid() {
        let user_id = Uuid::now_v7();
        let token = Claims::new(&user_id, 300)
            .with_type(TypeClaims::AccessToken)
            .encode(b"identity-secret")
            .unwrap();

        let verifier = JwtIdentityVerifier::new("identity-secret");
        let result = verifier.introspect(&token).await.unwrap();
        assert_eq!(result, Introspection { valid: true, user_id: Some(user_id) });
    }

    #[actix_web::test]
    async fn test_refresh_token_rejected() {
        let token = Claims::new(&Uuid::now_v7(), 300)
            .with_type(TypeClaims::RefreshToken)
            .encode(b"identity-secret")
            .unwrap();

        let verifier = JwtIdentityVerifier::new("identity-secret");
        assert!(!verifier.introspect(&token).await.unwrap().valid);
    }

    #[actix_web::test]
    async fn test_garbage_token_rejected() {
        let verifier = JwtIdentityVerifier::new("identity-secret");
        assert_eq!(verifier.introspect("not-a-jwt").await.unwrap(), Introspection::invalid());
    }
}
