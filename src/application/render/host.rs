use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("no LaTeXML daemon configured")]
    Empty,
}

/// Configured daemon address(es): one URL or a pool picked from at random.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DaemonHosts {
    Single(String),
    Pool(Vec<String>),
}

impl DaemonHosts {
    pub fn len(&self) -> usize {
        match self {
            DaemonHosts::Single(_) => 1,
            DaemonHosts::Pool(hosts) => hosts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let hosts: &[String] = match self {
            DaemonHosts::Single(host) => std::slice::from_ref(host),
            DaemonHosts::Pool(hosts) => hosts,
        };
        hosts.iter().map(String::as_str)
    }

    /// Choose a daemon uniformly at random. There is no failover: a failing
    /// host is reported, not swapped for another one.
    pub fn pick(&self) -> Result<&str, HostError> {
        let host = match self {
            DaemonHosts::Single(host) => host.as_str(),
            DaemonHosts::Pool(hosts) if hosts.is_empty() => return Err(HostError::Empty),
            DaemonHosts::Pool(hosts) => {
                let index = rand::rng().random_range(0..hosts.len());
                hosts[index].as_str()
            }
        };
        debug!(
            target = "application::render::host",
            op = "host::pick",
            host,
            "Picked LaTeXML daemon"
        );
        Ok(host)
    }
}

impl From<&str> for DaemonHosts {
    fn from(host: &str) -> Self {
        DaemonHosts::Single(host.to_string())
    }
}

impl From<Vec<String>> for DaemonHosts {
    fn from(hosts: Vec<String>) -> Self {
        DaemonHosts::Pool(hosts)
    }
}
