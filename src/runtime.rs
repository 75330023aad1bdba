use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::utils::env::Environment;

#[cfg(windows)]
pub const DEFAULT_DOCKER_HOST: &str = "npipe:////./pipe/docker_engine";
#[cfg(not(windows))]
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

const DOCKER_BIN: &str = "docker";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unable to parse docker host `{0}`")]
    InvalidHost(String),

    #[error("protocol not available: `{0}`")]
    UnsupportedProtocol(String),

    #[error("could not read {} from DOCKER_CERT_PATH: {source}", path.display())]
    TlsMaterial {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Transport the runtime listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Unix,
    Tcp,
    Http,
    Https,
    Ssh,
    #[cfg(windows)]
    Npipe,
}

impl Protocol {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unix" => Some(Protocol::Unix),
            "tcp" => Some(Protocol::Tcp),
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            "ssh" => Some(Protocol::Ssh),
            #[cfg(windows)]
            "npipe" => Some(Protocol::Npipe),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Protocol::Unix => "unix",
            Protocol::Tcp => "tcp",
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ssh => "ssh",
            #[cfg(windows)]
            Protocol::Npipe => "npipe",
        }
    }
}

/// Parsed `DOCKER_HOST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub address: String,
}

impl Endpoint {
    pub fn parse(host: &str) -> Result<Self, RuntimeError> {
        let Some((proto, address)) = host.split_once("://") else {
            return Err(RuntimeError::InvalidHost(host.to_string()));
        };
        let protocol = Protocol::parse(proto)
            .ok_or_else(|| RuntimeError::UnsupportedProtocol(proto.to_string()))?;
        if address.is_empty() {
            return Err(RuntimeError::InvalidHost(host.to_string()));
        }
        Ok(Self {
            protocol,
            address: address.to_string(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol.as_str(), self.address)
    }
}

/// Client certificate bundle from `DOCKER_CERT_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_dir: PathBuf,
    pub ca: Option<PathBuf>,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub verify: bool,
}

impl TlsMaterial {
    fn load(cert_dir: &Path, verify: bool) -> Result<Self, RuntimeError> {
        let ca = if verify {
            Some(require_file(cert_dir.join("ca.pem"))?)
        } else {
            None
        };
        let cert = require_file(cert_dir.join("cert.pem"))?;
        let key = require_file(cert_dir.join("key.pem"))?;
        Ok(Self {
            cert_dir: cert_dir.to_path_buf(),
            ca,
            cert,
            key,
            verify,
        })
    }
}

fn require_file(path: PathBuf) -> Result<PathBuf, RuntimeError> {
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(RuntimeError::TlsMaterial {
            path,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        }),
        Err(source) => Err(RuntimeError::TlsMaterial { path, source }),
    }
}

/// Handle to the container runtime, configured from the ambient
/// `DOCKER_HOST`, `DOCKER_CERT_PATH`, `DOCKER_TLS_VERIFY` and
/// `DOCKER_API_VERSION` variables. Building it does not connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerClient {
    endpoint: Endpoint,
    tls: Option<TlsMaterial>,
    api_version: Option<String>,
}

impl DockerClient {
    pub fn from_env(env: &dyn Environment) -> Result<Self, RuntimeError> {
        let tls = match env.non_empty_var("DOCKER_CERT_PATH") {
            Some(cert_dir) => {
                let verify = env.non_empty_var("DOCKER_TLS_VERIFY").is_some();
                Some(TlsMaterial::load(Path::new(&cert_dir), verify)?)
            }
            None => None,
        };

        let host = env
            .non_empty_var("DOCKER_HOST")
            .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string());
        let endpoint = Endpoint::parse(&host)?;

        Ok(Self {
            endpoint,
            tls,
            api_version: env.non_empty_var("DOCKER_API_VERSION"),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// A `docker` CLI invocation pinned to this client's endpoint and TLS settings.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(DOCKER_BIN);
        cmd.env("DOCKER_HOST", self.endpoint.to_string());
        match &self.tls {
            Some(tls) => {
                cmd.env("DOCKER_CERT_PATH", &tls.cert_dir);
                if tls.verify {
                    cmd.env("DOCKER_TLS_VERIFY", "1");
                } else {
                    cmd.env_remove("DOCKER_TLS_VERIFY");
                }
            }
            None => {
                cmd.env_remove("DOCKER_CERT_PATH");
                cmd.env_remove("DOCKER_TLS_VERIFY");
            }
        }
        if let Some(version) = &self.api_version {
            cmd.env("DOCKER_API_VERSION", version);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::utils::env::testing::FakeEnvironment;

    fn command_env<'a>(cmd: &'a Command, key: &str) -> Option<Option<&'a OsStr>> {
        cmd.get_envs()
            .find(|(name, _)| *name == OsStr::new(key))
            .map(|(_, value)| value)
    }

    #[test]
    fn defaults_to_the_local_socket() {
        let client = DockerClient::from_env(&FakeEnvironment::homeless()).expect("client");
        assert_eq!(client.endpoint().to_string(), DEFAULT_DOCKER_HOST);
        assert!(client.tls().is_none());
        assert!(client.api_version().is_none());
    }

    #[test]
    fn honours_docker_host_and_api_version() {
        let env = FakeEnvironment::homeless()
            .set("DOCKER_HOST", "tcp://10.0.0.5:2376")
            .set("DOCKER_API_VERSION", "1.41");
        let client = DockerClient::from_env(&env).expect("client");

        assert_eq!(client.endpoint().protocol, Protocol::Tcp);
        assert_eq!(client.endpoint().address, "10.0.0.5:2376");
        assert_eq!(client.api_version(), Some("1.41"));
    }

    #[test]
    fn empty_docker_host_falls_back_to_default() {
        let env = FakeEnvironment::homeless().set("DOCKER_HOST", "");
        let client = DockerClient::from_env(&env).expect("client");
        assert_eq!(client.endpoint().to_string(), DEFAULT_DOCKER_HOST);
    }

    #[test]
    fn malformed_hosts_are_rejected() {
        let err = Endpoint::parse("localhost:2375").expect_err("no scheme");
        assert!(matches!(err, RuntimeError::InvalidHost(_)));

        let err = Endpoint::parse("gopher://localhost").expect_err("bad protocol");
        assert!(matches!(err, RuntimeError::UnsupportedProtocol(p) if p == "gopher"));

        let err = Endpoint::parse("tcp://").expect_err("no address");
        assert!(matches!(err, RuntimeError::InvalidHost(_)));
    }

    #[test]
    fn tls_requires_ca_only_when_verifying() {
        let tmp = tempdir().expect("temp dir");
        fs::write(tmp.path().join("cert.pem"), "cert").expect("write cert");
        fs::write(tmp.path().join("key.pem"), "key").expect("write key");
        let cert_dir = tmp.path().to_string_lossy().to_string();

        let insecure = FakeEnvironment::homeless().set("DOCKER_CERT_PATH", &cert_dir);
        let client = DockerClient::from_env(&insecure).expect("insecure tls");
        let tls = client.tls().expect("tls material");
        assert!(!tls.verify);
        assert!(tls.ca.is_none());

        let verifying = insecure.clone().set("DOCKER_TLS_VERIFY", "1");
        let err = DockerClient::from_env(&verifying).expect_err("ca.pem missing");
        match err {
            RuntimeError::TlsMaterial { path, .. } => assert!(path.ends_with("ca.pem")),
            other => panic!("expected TlsMaterial, got {other:?}"),
        }

        fs::write(tmp.path().join("ca.pem"), "ca").expect("write ca");
        let client = DockerClient::from_env(&verifying).expect("verified tls");
        assert!(client.tls().and_then(|tls| tls.ca.as_ref()).is_some());
    }

    #[test]
    fn command_exports_the_resolved_runtime() {
        let env = FakeEnvironment::homeless()
            .set("DOCKER_HOST", "unix:///tmp/kdk-test.sock")
            .set("DOCKER_API_VERSION", "1.40");
        let client = DockerClient::from_env(&env).expect("client");
        let cmd = client.command();

        assert_eq!(cmd.get_program(), OsStr::new("docker"));
        assert_eq!(
            command_env(&cmd, "DOCKER_HOST"),
            Some(Some(OsStr::new("unix:///tmp/kdk-test.sock")))
        );
        assert_eq!(
            command_env(&cmd, "DOCKER_API_VERSION"),
            Some(Some(OsStr::new("1.40")))
        );
        assert_eq!(command_env(&cmd, "DOCKER_CERT_PATH"), Some(None));
    }
}
