//! REST client over the compute and networkconnectivity endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::compute::ComputeApi;
use crate::error::Error;
use crate::models::{GlobalOperation, Instance, InternalRange, NetworkInterface, Operation, Subnetwork};
use crate::Result;

const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";
const NETWORK_CONNECTIVITY_BASE_URL: &str = "https://networkconnectivity.googleapis.com/v1";

pub struct GceClient {
    http: reqwest::Client,
    token: String,
    compute_base_url: String,
    connectivity_base_url: String,
}

impl GceClient {
    /// `token` is a bearer token for the compute scopes, normally the default
    /// service-account token from the metadata server.
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token,
            compute_base_url: COMPUTE_BASE_URL.to_string(),
            connectivity_base_url: NETWORK_CONNECTIVITY_BASE_URL.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        url: String,
        body: &B,
    ) -> Result<T> {
        debug!(%method, %url, "request");
        let response = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.as_u16() == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NotFound(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ComputeApi for GceClient {
    async fn get_instance(&self, project: &str, zone: &str, instance: &str) -> Result<Instance> {
        self.get_json(format!(
            "{}/projects/{project}/zones/{zone}/instances/{instance}",
            self.compute_base_url
        ))
        .await
    }

    async fn get_subnetwork(
        &self,
        project: &str,
        region: &str,
        subnetwork: &str,
    ) -> Result<Subnetwork> {
        self.get_json(format!(
            "{}/projects/{project}/regions/{region}/subnetworks/{subnetwork}",
            self.compute_base_url
        ))
        .await
    }

    async fn patch_subnetwork(
        &self,
        project: &str,
        region: &str,
        subnetwork: &str,
        patch: &Subnetwork,
    ) -> Result<Operation> {
        self.send_json(
            reqwest::Method::PATCH,
            format!(
                "{}/projects/{project}/regions/{region}/subnetworks/{subnetwork}",
                self.compute_base_url
            ),
            patch,
        )
        .await
    }

    async fn update_network_interface(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        interface: &str,
        update: &NetworkInterface,
    ) -> Result<Operation> {
        self.send_json(
            reqwest::Method::PATCH,
            format!(
                "{}/projects/{project}/zones/{zone}/instances/{instance}/updateNetworkInterface?networkInterface={interface}",
                self.compute_base_url
            ),
            update,
        )
        .await
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation> {
        self.get_json(format!(
            "{}/projects/{project}/zones/{zone}/operations/{operation}",
            self.compute_base_url
        ))
        .await
    }

    async fn get_region_operation(
        &self,
        project: &str,
        region: &str,
        operation: &str,
    ) -> Result<Operation> {
        self.get_json(format!(
            "{}/projects/{project}/regions/{region}/operations/{operation}",
            self.compute_base_url
        ))
        .await
    }

    async fn get_internal_range(&self, project: &str, name: &str) -> Result<InternalRange> {
        self.get_json(format!(
            "{}/projects/{project}/locations/global/internalRanges/{name}",
            self.connectivity_base_url
        ))
        .await
    }

    async fn create_internal_range(
        &self,
        project: &str,
        name: &str,
        range: &InternalRange,
    ) -> Result<GlobalOperation> {
        self.send_json(
            reqwest::Method::POST,
            format!(
                "{}/projects/{project}/locations/global/internalRanges?internalRangeId={name}",
                self.connectivity_base_url
            ),
            range,
        )
        .await
    }

    async fn get_global_operation(&self, name: &str) -> Result<GlobalOperation> {
        self.get_json(format!("{}/{name}", self.connectivity_base_url))
            .await
    }
}
