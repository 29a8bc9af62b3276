//! Request protocol server configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};

/// Request protocol server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the request protocol, `host:port`
    pub bind_addr: String,

    /// Static token table mapping principals to their shared secrets.
    /// The authentication subsystem proper is an external collaborator;
    /// this is the built-in minimal implementation.
    pub auth_tokens: Vec<AuthToken>,
}

/// One principal/token pair accepted by the static authenticator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub principal: String,
    pub token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:34048".to_string(),
            auth_tokens: Vec::new(),
        }
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_addr, "bind_addr", self.domain_name())?;
        for entry in &self.auth_tokens {
            validate_required_string(&entry.principal, "principal", self.domain_name())?;
            validate_required_string(&entry.token, "token", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}
