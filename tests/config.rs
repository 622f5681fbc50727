// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, defaults, env resolution, and config discovery.

use apostello::config::*;
use apostello::error::Error;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.service.as_str(), "orders");
        assert_eq!(spec.image.repository(), "ghcr.io/acme/orders");
        assert_eq!(spec.host.host, "vm.example.com");
        assert_eq!(spec.host.port, 22);
        assert_eq!(spec.port, 8080);
    }

    #[test]
    fn defaults_apply_when_omitted() {
        let yaml = r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.published_port(), 8080);
        assert_eq!(spec.publish_retries, 3);
        assert_eq!(spec.publish_timeout, Duration::from_secs(300));
        assert_eq!(spec.deadline, Duration::from_secs(600));
        assert_eq!(spec.health.path, "/health");
        assert_eq!(spec.health.interval, Duration::from_secs(2));
        assert_eq!(spec.health.max_attempts, 3);
        assert_eq!(spec.health.expect_status, 200);
        assert!(spec.required_env.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
service: orders
source: ./services/orders
image: ghcr.io/acme/orders:v3

host:
  host: vm.example.com
  port: 2222
  user: deploy
  key_path: /home/op/.ssh/id_ed25519

port: 8080
host_port: 80

health:
  path: /healthz
  interval: 1s
  timeout: 3s
  max_attempts: 10
  expect_status: 204

required_env:
  - DATABASE_URL
  - API_KEY

env:
  RUST_LOG: info

publish_retries: 5
publish_timeout: 2m
deadline: 15m
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.source, std::path::PathBuf::from("./services/orders"));
        assert_eq!(spec.host.port, 2222);
        assert_eq!(spec.host.user.as_deref(), Some("deploy"));
        assert_eq!(spec.published_port(), 80);
        assert_eq!(spec.health.path, "/healthz");
        assert_eq!(spec.health.max_attempts, 10);
        assert_eq!(spec.health.expect_status, 204);
        assert_eq!(spec.required_env, vec!["DATABASE_URL", "API_KEY"]);
        assert_eq!(spec.publish_retries, 5);
        assert_eq!(spec.publish_timeout, Duration::from_secs(120));
        assert_eq!(spec.deadline, Duration::from_secs(900));
    }

    #[test]
    fn rejects_invalid_service_name() {
        let yaml = r#"
service: "Bad Name!"
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
"#;
        assert!(DeploymentSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_image_with_shell_metacharacters() {
        let yaml = r#"
service: orders
image: "ghcr.io/acme/orders:latest; rm -rf /"
host:
  host: vm.example.com
port: 8080
"#;
        assert!(DeploymentSpec::from_yaml(yaml).is_err());
    }
}

mod environment {
    use super::*;

    #[test]
    fn missing_required_env_fails_resolution() {
        let yaml = r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
required_env:
  - APOSTELLO_TEST_DEFINITELY_UNSET
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        let err = spec.resolve_instance_env().unwrap_err();
        assert!(matches!(err, Error::MissingEnvVar(name)
            if name == "APOSTELLO_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn required_env_resolves_from_invoking_environment() {
        let yaml = r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
required_env:
  - APOSTELLO_TEST_REQUIRED
env:
  RUST_LOG: info
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        temp_env::with_var("APOSTELLO_TEST_REQUIRED", Some("secret"), || {
            let env = spec.resolve_instance_env().unwrap();
            assert_eq!(env.get("APOSTELLO_TEST_REQUIRED").unwrap(), "secret");
            assert_eq!(env.get("RUST_LOG").unwrap(), "info");
        });
    }
}

mod discovery {
    use super::*;

    const MINIMAL: &str = r#"
service: orders
image: ghcr.io/acme/orders:latest
host:
  host: vm.example.com
port: 8080
"#;

    #[test]
    fn discovers_primary_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();
        assert!(DeploymentSpec::discover(dir.path()).is_ok());
    }

    #[test]
    fn discovers_dotdir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".apostello")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();
        assert!(DeploymentSpec::discover(dir.path()).is_ok());
    }

    #[test]
    fn missing_config_is_reported_with_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeploymentSpec::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_a_parseable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("orders"), Some("ghcr.io/acme/orders:latest"), false)
            .unwrap();

        let spec = DeploymentSpec::discover(dir.path()).unwrap();
        assert_eq!(spec.service.as_str(), "orders");
    }

    #[test]
    fn init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, None, false).unwrap();
        assert!(matches!(
            init_config(dir.path(), None, None, false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), None, None, true).is_ok());
    }
}
