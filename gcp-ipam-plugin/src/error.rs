use semver::Version;
use thiserror::Error;

use crate::response::{CniErrorResponse, Response};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid environment variables: {0}")]
    InvalidRequiredEnvVariables(String),

    #[error("invalid network config: {0}")]
    InvalidNetworkConfig(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("instance has no network interfaces")]
    NoNetworkInterfaces,

    #[error("pod {namespace}/{name} has no IP in status")]
    MissingPodIp { namespace: String, name: String },

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Gce(#[from] gcp_ipam_gce::Error),

    #[error("{0}")]
    Allocator(#[from] gcp_ipam_allocator::Error),
}

impl Error {
    /// Errors the orchestrator should simply retry: lost CAS races and
    /// cloud transport failures.
    fn is_transient(&self) -> bool {
        match self {
            Error::Allocator(gcp_ipam_allocator::Error::ConflictExhausted { .. }) => true,
            Error::Gce(gcp_ipam_gce::Error::Http(_)) => true,
            _ => false,
        }
    }

    pub fn into_response(self, cni_version: Version) -> Response {
        let (code, msg) = if self.is_transient() {
            (11, "Try Again Later")
        } else {
            match &self {
                Error::InvalidRequiredEnvVariables(_) => {
                    (4, "Invalid Required Environment Variables")
                }
                Error::Io(_) => (5, "I/O Error"),
                Error::Json(_) => (6, "JSON Error"),
                Error::InvalidNetworkConfig(_) | Error::Parse(_) => (7, "Invalid Network Config"),
                Error::NoNetworkInterfaces | Error::Gce(_) => (101, "Cloud API Error"),
                Error::MissingPodIp { .. } | Error::Kubeconfig(_) | Error::Kube(_) => {
                    (102, "Cluster API Error")
                }
                Error::Allocator(gcp_ipam_allocator::Error::Exhausted(_)) => (110, "Pool Exhausted"),
                Error::Allocator(_) => (103, "IPAM Error"),
            }
        };
        Response::Error(CniErrorResponse {
            cni_version,
            code,
            msg: msg.into(),
            details: self.to_string(),
        })
    }
}
