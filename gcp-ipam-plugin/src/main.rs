use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use gcp_ipam_plugin::delete::delete;
use gcp_ipam_plugin::response::{Response, VersionResponse};
use gcp_ipam_plugin::types::Input;
use gcp_ipam_plugin::{CNI_VERSION, SUPPORTED_CNI_VERSIONS, add::add, check::check};
use gcp_ipam_plugin::{Result, config::Args};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> ExitCode {
    let _guard = setup_logging();

    // VERSION arrives without the rest of the CNI environment.
    if std::env::var("CNI_COMMAND").as_deref() == Ok("VERSION") {
        return Response::Version(VersionResponse {
            cni_version: CNI_VERSION,
            supported_versions: SUPPORTED_CNI_VERSIONS.to_vec(),
        })
        .write_out();
    }

    let args = Args::parse();
    let resp = match args.command {
        gcp_ipam_plugin::config::Command::Add => {
            let input = read_input();
            match input {
                Ok(input) => add(&args, input),
                Err(e) => e.into_response(CNI_VERSION),
            }
        }
        gcp_ipam_plugin::config::Command::Delete => {
            let input = read_input();
            match input {
                Ok(input) => delete(&args, input),
                Err(e) => e.into_response(CNI_VERSION),
            }
        }
        gcp_ipam_plugin::config::Command::Check => {
            let input = read_input();
            match input {
                Ok(input) => check(&args, input),
                Err(e) => e.into_response(CNI_VERSION),
            }
        }
    };

    resp.write_out()
}

fn read_input() -> Result<Input> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

fn setup_logging() -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never("/tmp", "gcp-ipam.log");
    let (nonblocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcp_ipam=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(nonblocking)
                .with_ansi(false),
        )
        .init();
    guard
}
