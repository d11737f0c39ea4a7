use sha2::{Digest, Sha256};

use crate::{errors::Error, Result};

/// Scheme prefix of the `Authorization` header value.
pub const AUTH_SCHEME: &str = "authkey ";

// ============== Authorization ==============

/// Shared-secret gate for every channel endpoint.
///
/// A request passes iff its `Authorization` header is exactly `authkey <secret>`.
#[derive(Clone)]
pub struct AuthGate {
    expected: [u8; 32],
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

impl AuthGate {
    pub fn new(secret: &str) -> Self {
        Self {
            expected: digest(&format!("{AUTH_SCHEME}{secret}")),
        }
    }

    pub fn is_authorized(&self, header: Option<&str>) -> bool {
        let Some(header) = header else {
            return false;
        };
        // Timing must not depend on where (or whether) the header length differs.
        constant_time_eq(&digest(header), &self.expected)
    }

    /// Missing and wrong credentials are indistinguishable to the caller.
    pub fn authorize(&self, header: Option<&str>) -> Result<()> {
        if self.is_authorized(header) {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
