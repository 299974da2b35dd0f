use std::io::Write;
use std::process::ExitCode;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::types::{Dns, Interface, Ip, Route};

pub enum Response {
    Success(Success),
    /// DEL and CHECK succeed with an empty result under the negotiated
    /// version.
    Empty(Version),
    Error(CniErrorResponse),
    Version(VersionResponse),
}

impl Response {
    pub fn write_out(self) -> ExitCode {
        let (out, code) = match &self {
            Response::Success(success) => match serde_json::to_vec(success) {
                Ok(out) => (out, ExitCode::SUCCESS),
                Err(e) => (e.to_string().into_bytes(), ExitCode::FAILURE),
            },
            Response::Empty(version) => {
                let body = serde_json::json!({"cniVersion": version.to_string()});
                match serde_json::to_vec(&body) {
                    Ok(out) => (out, ExitCode::SUCCESS),
                    Err(e) => (e.to_string().into_bytes(), ExitCode::FAILURE),
                }
            }
            Response::Error(error) => match serde_json::to_vec(error) {
                Ok(out) => (out, ExitCode::FAILURE),
                Err(e) => (e.to_string().into_bytes(), ExitCode::FAILURE),
            },
            Response::Version(version) => match serde_json::to_vec(version) {
                Ok(out) => (out, ExitCode::SUCCESS),
                Err(e) => (e.to_string().into_bytes(), ExitCode::FAILURE),
            },
        };
        std::io::stdout()
            .write_all(&out)
            .expect("failed to write out response to stdout");
        code
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Success {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub cni_version: Version,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(default)]
    pub ips: Vec<Ip>,

    #[serde(default)]
    pub routes: Vec<Route>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub cni_version: Version,

    #[serde(
        serialize_with = "crate::serialize_to_string_slice",
        deserialize_with = "crate::deserialize_from_str_vec"
    )]
    pub supported_versions: Vec<Version>,
}

/// Standard CNI error envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CniErrorResponse {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub cni_version: Version,
    pub code: u32,
    pub msg: String,
    pub details: String,
}
