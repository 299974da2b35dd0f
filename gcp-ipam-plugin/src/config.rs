use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use crate::{Error, Result};

/// The CNI invocation contract: everything arrives through the environment.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Possible values are ADD, DEL, CHECK
    #[arg(long, env = "CNI_COMMAND", value_parser = parse_command)]
    pub command: Command,

    /// Container ID
    #[arg(long, env = "CNI_CONTAINERID")]
    pub container_id: String,

    /// Path to the network namespace
    #[arg(long, env = "CNI_NETNS")]
    pub net_ns: Option<PathBuf>,

    /// Interface name inside the container
    #[arg(long, env = "CNI_IFNAME")]
    pub ifname: String,

    /// Key-value pairs separated by semi-colons
    #[arg(long, env = "CNI_ARGS", default_value = "", value_parser = parse_key_value)]
    pub args: BTreeMap<String, String>,

    /// List of paths to search for plugins
    #[arg(long, env = "CNI_PATH", default_value = "")]
    pub paths: String,
}

impl Args {
    /// Required pod coordinates from CNI_ARGS.
    pub fn pod_identity(&self) -> Result<(&str, &str)> {
        let namespace = self
            .args
            .get("K8S_POD_NAMESPACE")
            .ok_or_else(|| Error::InvalidRequiredEnvVariables("K8S_POD_NAMESPACE missing from CNI_ARGS".into()))?;
        let name = self
            .args
            .get("K8S_POD_NAME")
            .ok_or_else(|| Error::InvalidRequiredEnvVariables("K8S_POD_NAME missing from CNI_ARGS".into()))?;
        Ok((namespace, name))
    }
}

fn parse_key_value(value: &str) -> Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();

    if value.is_empty() {
        return Ok(pairs);
    }

    for split in value.split(";") {
        if let Some((k, v)) = split.split_once("=") {
            pairs.insert(k.to_owned(), v.to_owned());
        }
    }

    Ok(pairs)
}

fn parse_command(value: &str) -> Result<Command> {
    let command = match value {
        "ADD" => Command::Add,
        "DEL" => Command::Delete,
        "CHECK" => Command::Check,
        _ => return Err(Error::Parse(format!("command {value} not supported"))),
    };
    Ok(command)
}

#[derive(Clone)]
pub enum Command {
    Add,
    Delete,
    Check,
}
