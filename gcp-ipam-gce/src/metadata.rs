//! Instance metadata server client. Every GCE VM serves its own identity and
//! service-account tokens at a fixed link-local name; requests must carry the
//! `Metadata-Flavor: Google` header.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::Result;

pub const METADATA_BASE_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// The identity of the VM this process runs on.
#[derive(Clone, Debug)]
pub struct InstanceIdentity {
    pub project: String,
    pub zone: String,
    pub region: String,
    pub instance: String,
}

pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    async fn get(&self, path: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Metadata(format!("GET {path} returned {status}")));
        }
        Ok(response.text().await?)
    }

    pub async fn project_id(&self) -> Result<String> {
        self.get("project/project-id").await
    }

    /// Zone short name. The metadata value is a full path like
    /// "projects/1234/zones/us-central1-a".
    pub async fn zone(&self) -> Result<String> {
        let value = self.get("instance/zone").await?;
        Ok(parse_zone_value(&value))
    }

    pub async fn instance_name(&self) -> Result<String> {
        self.get("instance/name").await
    }

    /// Access token of the default service account, for Authorization
    /// headers against the compute APIs.
    pub async fn access_token(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let body = self
            .get("instance/service-accounts/default/token")
            .await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Metadata(format!("decode token response: {e}")))?;
        Ok(token.access_token)
    }

    pub async fn identity(&self) -> Result<InstanceIdentity> {
        let project = self.project_id().await?;
        let zone = self.zone().await?;
        let region = region_from_zone(&zone)?;
        let instance = self.instance_name().await?;
        Ok(InstanceIdentity {
            project,
            zone,
            region,
            instance,
        })
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_zone_value(value: &str) -> String {
    value.rsplit('/').next().unwrap_or(value).to_string()
}

/// Region by convention is the zone minus its final two characters
/// ("us-central1-a" -> "us-central1"). Anything shorter than three
/// characters cannot name a zone and is rejected.
pub fn region_from_zone(zone: &str) -> Result<String> {
    if zone.len() > 2 {
        Ok(zone[..zone.len() - 2].to_string())
    } else {
        Err(Error::Metadata(format!(
            "cannot determine region from zone: {zone}"
        )))
    }
}
