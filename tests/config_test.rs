//! Configuration resolver: allow-listing, override guard, env and file loading

mod common;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use common::config_from;
use workflow_mcp::config::{AuthMode, FileConfig, ServerConfig};
use workflow_mcp::Error;

const BASE: &str = "https://bi.example.com";

mod project_paths {
    use super::*;

    #[test]
    fn test_allow_list_accepts_only_matching_prefixes() {
        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_ALLOWED_PROJECT_PREFIXES", "/mcptest/, /shared/reports"),
        ])
        .unwrap();

        assert_eq!(
            config.validate_project_path("/mcptest/demo.iox").unwrap(),
            "/mcptest/demo.iox"
        );
        assert_eq!(
            config.validate_project_path("  /shared/reports/q1.iox ").unwrap(),
            "/shared/reports/q1.iox"
        );

        for rejected in ["/other/demo.iox", "/mcptestother/demo.iox", "/shared/reportsX.iox"] {
            assert!(
                matches!(config.validate_project_path(rejected), Err(Error::ProjectNotAllowed { .. })),
                "{} should be rejected",
                rejected
            );
        }
    }

    #[test]
    fn test_dot_dot_segments_are_rejected() {
        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_ALLOWED_PROJECT_PREFIXES", "/mcptest"),
        ])
        .unwrap();

        for path in ["/mcptest/../secret.iox", "/mcptest/..", "/mcptest/a\\..\\b.iox"] {
            assert!(
                matches!(config.validate_project_path(path), Err(Error::InvalidProjectPath(_))),
                "{} should be rejected",
                path
            );
        }
        // Dots inside a name are fine
        assert!(config.validate_project_path("/mcptest/v1..2.iox").is_ok());
    }

    #[test]
    fn test_without_allow_list_any_well_formed_path_passes() {
        let config = config_from(&[("WORKFLOW_BASE_URL", BASE)]).unwrap();
        assert!(config.allowed_project_prefixes.is_empty());

        assert_eq!(config.validate_project_path("/anything/x.iox").unwrap(), "/anything/x.iox");
        assert!(matches!(config.validate_project_path(""), Err(Error::InvalidProjectPath(_))));
        assert!(matches!(config.validate_project_path("   "), Err(Error::InvalidProjectPath(_))));
        assert!(matches!(config.validate_project_path("relative.iox"), Err(Error::InvalidProjectPath(_))));
    }

    #[test]
    fn test_root_prefix_allows_everything() {
        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_ALLOWED_PROJECT_PREFIXES", "/"),
        ])
        .unwrap();
        assert!(config.validate_project_path("/any/where.iox").is_ok());
    }
}

mod base_url_guard {
    use super::*;

    #[test]
    fn test_override_must_be_registered() {
        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_ALLOWED_BASE_URLS", "https://staging.example.com/"),
        ])
        .unwrap();

        assert_eq!(config.resolve_base_url(None).unwrap(), config.base_url);
        assert_eq!(config.resolve_base_url(Some("  ")).unwrap(), config.base_url);
        assert_eq!(config.resolve_base_url(Some("https://bi.example.com/")).unwrap(), config.base_url);
        assert_eq!(
            config.resolve_base_url(Some("https://staging.example.com")).unwrap().as_str(),
            "https://staging.example.com/"
        );

        for rejected in ["https://evil.example.com", "http://169.254.169.254", "not a url", "file:///etc/passwd"] {
            assert!(
                matches!(config.resolve_base_url(Some(rejected)), Err(Error::BaseUrlNotAllowed(_))),
                "{} should be rejected",
                rejected
            );
        }
    }
}

mod loading {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = config_from(&[("WORKFLOW_BASE_URL", BASE)]).unwrap();
        assert_eq!(config.auth, AuthMode::None);
        assert_eq!(config.request_timeout, Duration::from_millis(30_000));
        assert_eq!(config.http.port, 3941);
        assert_eq!(config.http.host, "0.0.0.0");
        assert!(config.http.basic_auth.is_none());
        assert!(config.log_tool_calls);
        assert_eq!(config.http.session_idle_timeout, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_session_idle_timeout() {
        let config = config_from(&[("WORKFLOW_BASE_URL", BASE), ("MCP_SESSION_IDLE_TIMEOUT_MS", "250")]).unwrap();
        assert_eq!(config.http.session_idle_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_base_url_is_fatal() {
        assert!(matches!(config_from(&[]), Err(Error::Config(_))));
        assert!(matches!(config_from(&[("WORKFLOW_BASE_URL", "   ")]), Err(Error::Config(_))));
        assert!(matches!(config_from(&[("WORKFLOW_BASE_URL", "ftp://bi")]), Err(Error::Config(_))));
    }

    #[test]
    fn test_token_wins_over_basic() {
        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_USERNAME", "svc"),
            ("WORKFLOW_PASSWORD", "pw"),
            ("WORKFLOW_TOKEN", "tok-123"),
        ])
        .unwrap();
        assert_eq!(config.auth, AuthMode::Bearer("tok-123".into()));

        let config = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_USERNAME", "svc"),
            ("WORKFLOW_PASSWORD", "pw"),
        ])
        .unwrap();
        assert!(matches!(config.auth, AuthMode::Basic(ref c) if c.username == "svc"));
    }

    #[test]
    fn test_half_credentials_are_rejected() {
        let result = config_from(&[("WORKFLOW_BASE_URL", BASE), ("WORKFLOW_USERNAME", "svc")]);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = config_from(&[("WORKFLOW_BASE_URL", BASE), ("MCP_BASIC_AUTH_PASSWORD", "pw")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        for (key, value) in [
            ("WORKFLOW_REQUEST_TIMEOUT_MS", "0"),
            ("WORKFLOW_REQUEST_TIMEOUT_MS", "soon"),
            ("MCP_PORT", "70000"),
            ("MCP_LOG_TOOL_CALLS", "maybe"),
            ("MCP_SESSION_IDLE_TIMEOUT_MS", "0"),
            ("MCP_SESSION_IDLE_TIMEOUT_MS", "-5"),
        ] {
            let result = config_from(&[("WORKFLOW_BASE_URL", BASE), (key, value)]);
            assert!(matches!(result, Err(Error::Config(_))), "{}={} should fail", key, value);
        }
    }

    #[test]
    fn test_health_check_project_must_pass_allow_list() {
        let result = config_from(&[
            ("WORKFLOW_BASE_URL", BASE),
            ("WORKFLOW_ALLOWED_PROJECT_PREFIXES", "/mcptest"),
            ("MCP_HEALTH_CHECK_PROJECT", "/elsewhere/p.iox"),
        ]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_file_with_env_override() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(
            file,
            r#"
[upstream]
base_url = "https://file.example.com/api/"
allowed_project_prefixes = ["/team"]
request_timeout_ms = 5000

[mcp]
port = 4100
log_tool_calls = false
"#
        )
        .unwrap();

        let parsed = FileConfig::read(file.path()).expect("Failed to read config file");
        let config = ServerConfig::from_lookup(parsed.clone(), |_| None).unwrap();
        assert_eq!(config.base_url.as_str(), "https://file.example.com/api");
        assert_eq!(config.allowed_project_prefixes, vec!["/team".to_string()]);
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.http.port, 4100);
        assert!(!config.log_tool_calls);

        let config = ServerConfig::from_lookup(parsed, |key| match key {
            "MCP_PORT" => Some("4200".into()),
            "WORKFLOW_ALLOWED_PROJECT_PREFIXES" => Some("/ops,/team/".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.http.port, 4200);
        assert_eq!(config.allowed_project_prefixes, vec!["/ops".to_string(), "/team".to_string()]);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[upstream\nbase_url = ").unwrap();
        assert!(matches!(FileConfig::read(file.path()), Err(Error::Toml(_))));
    }
}
