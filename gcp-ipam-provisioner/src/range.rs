use tracing::info;

use gcp_ipam_gce::{ComputeApi, InternalRange, wait_global_operation};

use crate::Result;
use crate::cluster::ClusterInfo;

/// All reservations are carved out of the conventional private block.
pub const INTERNAL_RANGE_TARGET_CIDR: &str = "10.0.0.0/8";

/// Fetch-or-create the named internal range reservation and return its CIDR.
/// The create is a long-running operation; the assigned CIDR is only known
/// once it finishes.
pub async fn ensure_internal_range<C>(
    compute: &C,
    info: &ClusterInfo,
    name: &str,
    prefix_length: i32,
) -> Result<String>
where
    C: ComputeApi + ?Sized,
{
    match compute.get_internal_range(&info.project, name).await {
        Ok(existing) => {
            info!(
                name = %name,
                cidr = %existing.ip_cidr_range,
                "internal range reservation already exists"
            );
            return Ok(existing.ip_cidr_range);
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    info!(
        name = %name,
        prefix_length,
        network = %info.network_name,
        "creating internal range reservation"
    );
    let range = InternalRange {
        name: name.to_string(),
        network: format!(
            "projects/{}/global/networks/{}",
            info.project, info.network_name
        ),
        prefix_length: Some(prefix_length),
        target_cidr_range: vec![INTERNAL_RANGE_TARGET_CIDR.to_string()],
        usage: "FOR_VPC".to_string(),
        description: "Reserved internal IP range for gcp-ipam".to_string(),
        ip_cidr_range: String::new(),
    };
    let operation = compute
        .create_internal_range(&info.project, name, &range)
        .await?;
    wait_global_operation(compute, &operation.name).await?;

    let created = compute.get_internal_range(&info.project, name).await?;
    info!(cidr = %created.ip_cidr_range, "internal range reservation created");
    Ok(created.ip_cidr_range)
}

#[cfg(test)]
mod tests {
    use gcp_ipam_gce::MockCompute;

    use super::*;

    fn info() -> ClusterInfo {
        ClusterInfo {
            project: "p".into(),
            zone: "us-central1-a".into(),
            region: "us-central1".into(),
            network_name: "default".into(),
            subnetwork_name: "subnet-a".into(),
        }
    }

    #[tokio::test]
    async fn creates_a_reservation_when_none_exists() {
        let compute = MockCompute::new();
        let cidr = ensure_internal_range(&compute, &info(), "live", 16)
            .await
            .unwrap();
        assert!(!cidr.is_empty());
        assert_eq!(compute.created_internal_ranges(), 1);

        let created = compute.internal_range("live").unwrap();
        assert_eq!(created.prefix_length, Some(16));
        assert_eq!(created.usage, "FOR_VPC");
        assert_eq!(created.target_cidr_range, vec![INTERNAL_RANGE_TARGET_CIDR]);
        assert_eq!(created.network, "projects/p/global/networks/default");
    }

    #[tokio::test]
    async fn reuses_an_existing_reservation() {
        let compute = MockCompute::new();
        compute.put_internal_range(InternalRange {
            name: "live".into(),
            ip_cidr_range: "10.50.0.0/16".into(),
            ..Default::default()
        });

        let cidr = ensure_internal_range(&compute, &info(), "live", 16)
            .await
            .unwrap();
        assert_eq!(cidr, "10.50.0.0/16");
        assert_eq!(compute.created_internal_ranges(), 0);
    }
}
