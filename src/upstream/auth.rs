//! Outbound `Authorization` header

use base64::Engine;

use crate::config::{AuthMode, Credentials};

/// Header value for the configured auth mode, `None` when unauthenticated.
pub fn authorization_header(auth: &AuthMode) -> Option<String> {
    match auth {
        AuthMode::None => None,
        AuthMode::Basic(creds) => Some(basic(creds)),
        AuthMode::Bearer(token) => Some(format!("Bearer {}", token)),
    }
}

fn basic(creds: &Credentials) -> String {
    let raw = format!("{}:{}", creds.username, creds.password);
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_per_mode() {
        assert_eq!(authorization_header(&AuthMode::None), None);
        assert_eq!(
            authorization_header(&AuthMode::Bearer("tok-123".into())).as_deref(),
            Some("Bearer tok-123")
        );

        let creds = Credentials {
            username: "user".into(),
            password: "pass".into(),
        };
        // base64("user:pass")
        assert_eq!(
            authorization_header(&AuthMode::Basic(creds)).as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }
}
