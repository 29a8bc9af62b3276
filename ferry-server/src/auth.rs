//! Connection authentication

use ferry_config::ServerConfig;

/// Validates the first message of every connection
pub trait Authenticator: Send + Sync {
    /// Whether `token` authenticates `principal`.
    fn authenticate(&self, principal: &str, token: &str) -> bool;
}

/// Static principal/token table from the server configuration
pub struct StaticTokenAuthenticator {
    tokens: Vec<(String, String)>,
}

impl StaticTokenAuthenticator {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            tokens: config
                .auth_tokens
                .iter()
                .map(|t| (t.principal.clone(), t.token.clone()))
                .collect(),
        }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, principal: &str, token: &str) -> bool {
        self.tokens
            .iter()
            .any(|(p, t)| p == principal && t == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_config::AuthToken;

    fn authenticator() -> StaticTokenAuthenticator {
        StaticTokenAuthenticator::from_config(&ServerConfig {
            auth_tokens: vec![AuthToken {
                principal: "alice".to_string(),
                token: "s3cret".to_string(),
            }],
            ..Default::default()
        })
    }

    #[test]
    fn accepts_known_pair() {
        assert!(authenticator().authenticate("alice", "s3cret"));
    }

    #[test]
    fn rejects_wrong_token_and_unknown_principal() {
        let auth = authenticator();
        assert!(!auth.authenticate("alice", "wrong"));
        assert!(!auth.authenticate("bob", "s3cret"));
    }
}
