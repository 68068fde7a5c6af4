use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, Result};

/// The capability set a verified caller is allowed to exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Inference,
    Admin,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub subject_id: String,
    pub capabilities: Vec<Capability>,
    pub is_admin: bool,
    pub expires_at: i64,
}

impl Identity {
    pub fn has(&self, capability: &Capability) -> bool {
        self.is_admin || self.capabilities.contains(capability)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    admin: bool,
}

/// Verifies a caller-supplied bearer credential and exposes its identity.
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity>;
}

/// Asymmetric (RS256) JWT verification against a public key loaded once at
/// startup. `auth_disabled` is a deliberate, logged development bypass that
/// grants every capability without verifying anything.
pub struct JwtAuthGate {
    decoding_key: Option<DecodingKey>,
    auth_disabled: bool,
}

impl JwtAuthGate {
    pub fn new(public_key_pem: Option<&[u8]>, auth_disabled: bool) -> Result<Self> {
        if auth_disabled {
            warn!("AuthGate running with auth_disabled=true; all bearer tokens are bypassed");
            return Ok(JwtAuthGate {
                decoding_key: None,
                auth_disabled: true,
            });
        }

        let pem = public_key_pem.ok_or_else(|| {
            CoreError::Internal("public_key_path must be set unless auth_disabled".into())
        })?;
        let decoding_key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| CoreError::Internal(format!("invalid public key: {e}")))?;

        Ok(JwtAuthGate {
            decoding_key: Some(decoding_key),
            auth_disabled: false,
        })
    }
}

#[async_trait]
impl AuthGate for JwtAuthGate {
    async fn verify(&self, token: &str) -> Result<Identity> {
        if self.auth_disabled {
            return Ok(Identity {
                subject_id: "dev-bypass".to_string(),
                capabilities: vec![Capability::Inference, Capability::Admin],
                is_admin: true,
                expires_at: i64::MAX,
            });
        }

        let decoding_key = self
            .decoding_key
            .as_ref()
            .expect("decoding_key is set whenever auth_disabled is false");

        let validation = Validation::new(Algorithm::RS256);
        let data = decode::<Claims>(token, decoding_key, &validation)
            .map_err(|e| CoreError::AuthFailed(e.to_string()))?;

        let claims = data.claims;
        let capabilities = claims
            .capabilities
            .iter()
            .filter_map(|c| match c.as_str() {
                "inference" => Some(Capability::Inference),
                "admin" => Some(Capability::Admin),
                _ => None,
            })
            .collect();

        Ok(Identity {
            subject_id: claims.sub,
            capabilities,
            is_admin: claims.admin,
            expires_at: claims.exp,
        })
    }
}
