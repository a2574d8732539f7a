use axum::http::{header, HeaderMap, StatusCode};
use base64::engine::{general_purpose, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::models::user::Role;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

// Session tokens are valid for 24 hours
const TOKEN_TTL_SECS: i64 = 86_400;

/// Claims carried by a verified session token
#[derive(Debug, Clone)]
pub struct Claims {
    pub username: String,
    pub role: Role,
    pub expires_at: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    // Admin and faculty may act on other users' pending bookings
    pub fn can_moderate(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Faculty)
    }
}

/// Authentication utilities: session token issue/verify plus the request
/// signature used when calling the notification webhook
pub struct AuthService {
    token_secret: String,
}

impl AuthService {
    pub fn new(token_secret: &str) -> Self {
        Self {
            token_secret: token_secret.to_string(),
        }
    }

    /// Create the service from environment variables
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let token_secret = std::env::var("ROOMSYNC_AUTH_SECRET")
            .expect("ROOMSYNC_AUTH_SECRET must be set in environment");
        Self::new(&token_secret)
    }

    /// Generate a random nonce for signed requests
    pub fn generate_nonce() -> String {
        rand::thread_rng().gen_range(10000000..99999999).to_string()
    }

    /// Get current timestamp in seconds
    pub fn get_timestamp() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Generate the HMAC-SHA256 signature for an outbound signed request
    pub fn generate_signature(
        secret_id: &str,
        secret_key: &str,
        method: &str,
        uri: &str,
        timestamp: i64,
        nonce: &str,
        body: &str,
    ) -> String {
        let header_string = format!(
            "X-RS-Key={}&X-RS-Nonce={}&X-RS-Timestamp={}",
            secret_id, nonce, timestamp
        );

        let content = format!("{}\n{}\n{}\n{}", method, header_string, uri, body);

        debug!("String to sign: {}", content);

        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(content.as_bytes());

        let hex_hash = hex::encode(mac.finalize().into_bytes());
        general_purpose::STANDARD.encode(hex_hash.as_bytes())
    }

    fn payload_signature(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.token_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Issue a signed session token for a logged-in user
    pub fn issue_token(&self, username: &str, role: Role) -> String {
        let expires_at = Self::get_timestamp() + TOKEN_TTL_SECS;
        let nonce = Self::generate_nonce();
        let payload = format!("{}|{}|{}|{}", username, role.as_str(), expires_at, nonce);
        let signature = self.payload_signature(&payload);

        format!(
            "{}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            general_purpose::URL_SAFE_NO_PAD.encode(signature.as_bytes())
        )
    }

    /// Verify a session token and return its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, String> {
        let (payload_part, signature_part) = token
            .split_once('.')
            .ok_or_else(|| "Malformed token".to_string())?;

        let payload_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| "Malformed token payload".to_string())?;
        let payload =
            String::from_utf8(payload_bytes).map_err(|_| "Malformed token payload".to_string())?;

        let signature_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| "Malformed token signature".to_string())?;
        let signature = String::from_utf8(signature_bytes)
            .map_err(|_| "Malformed token signature".to_string())?;

        if self.payload_signature(&payload) != signature {
            return Err("Invalid token signature".to_string());
        }

        let parts: Vec<&str> = payload.split('|').collect();
        if parts.len() != 4 {
            return Err("Malformed token payload".to_string());
        }

        let expires_at: i64 = parts[2]
            .parse()
            .map_err(|_| "Malformed token expiry".to_string())?;
        if expires_at < Self::get_timestamp() {
            return Err("Token has expired".to_string());
        }

        Ok(Claims {
            username: parts[0].to_string(),
            role: Role::parse(parts[1])?,
            expires_at,
        })
    }

    /// Extract and verify the Bearer token from request headers
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, StatusCode> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        self.verify_token(token).map_err(|e| {
            warn!("Rejected session token: {}", e);
            StatusCode::UNAUTHORIZED
        })
    }
}
