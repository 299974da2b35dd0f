use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gcp_ipam_allocator::KubePoolStore;
use gcp_ipam_gce::{GceClient, MetadataClient};
use gcp_ipam_provisioner::cluster;
use gcp_ipam_provisioner::provision::{Config, Provisioner};

#[derive(Parser)]
#[command(version, about = "Provisions the secondary range and IPPool for gcp-ipam")]
struct Flags {
    /// Name for the secondary IP range
    #[arg(long, default_value = "live")]
    secondary_range_name: String,

    /// Size of the secondary range in bits (e.g. 16 for /16)
    #[arg(long, default_value_t = 16)]
    range_size_bits: i32,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run mode - don't make any changes
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&flags.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        secondary_range_name = %flags.secondary_range_name,
        range_size_bits = flags.range_size_bits,
        dry_run = flags.dry_run,
        "starting gcp-ipam provisioner"
    );

    let metadata = MetadataClient::new();
    let identity = metadata.identity().await?;
    let token = metadata.access_token().await?;
    let compute = GceClient::new(token);

    let cluster_info = cluster::discover(&compute, identity).await?;
    info!(
        project = %cluster_info.project,
        region = %cluster_info.region,
        network = %cluster_info.network_name,
        subnetwork = %cluster_info.subnetwork_name,
        "cluster information retrieved"
    );

    let client = kube::Client::try_default().await?;
    let provisioner = Provisioner::new(
        compute,
        KubePoolStore::new(client),
        Config {
            secondary_range_name: flags.secondary_range_name,
            range_size_bits: flags.range_size_bits,
            dry_run: flags.dry_run,
        },
    );
    provisioner.provision(&cluster_info).await?;
    info!("provisioning completed");

    // Runs as a pod; stay up so the workload does not crash-loop.
    tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
    Ok(())
}
