use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::JwtConfig;

/// Tokens are good for one day from issuance.
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Signing material derived once from configuration at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: TOKEN_TTL,
        }
    }

    pub fn sign(&self, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// `None` for anything short of a well-formed, correctly signed,
    /// unexpired token from this issuer.
    pub fn validate(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        let decoded = decode::<Claims>(token, &self.decoding, &validation);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match decoded {
            // decode still accepts exp == now; valid only while now < exp
            Ok(data) if data.claims.exp as i64 <= now => {
                debug!(exp = data.claims.exp, "jwt rejected: expires this second");
                None
            }
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(reason = %e, "jwt rejected");
                None
            }
        }
    }
}
