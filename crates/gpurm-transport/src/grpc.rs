//! gRPC node manager client
//!
//! Node managers expose the `NMServer` service. Every request wraps a JSON
//! document in `JsonResponse.response`; launch and terminate answer with a
//! `BooleanResponse` acknowledgement, metrics with another `JsonResponse`.

use async_trait::async_trait;
use gpurm_core::{GpurmError, GpurmResult, JobId, MetricsResult, NodeAddr, TransportConfig};
use std::time::Duration;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::traits::NodeManagerClient;
use crate::wire::{JobIdPayload, LaunchPayload};

const LAUNCH_JOB: &str = "/NMServer/LaunchJob";
const TERMINATE_JOB: &str = "/NMServer/TerminateJob";
const GET_METRICS: &str = "/NMServer/GetMetrics";

/// Protobuf messages of the node manager service
pub mod proto {
    /// String envelope carrying a JSON document
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct JsonResponse {
        #[prost(string, tag = "1")]
        pub response: String,
    }

    /// Acknowledgement
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BooleanResponse {
        #[prost(bool, tag = "1")]
        pub value: bool,
    }
}

use proto::{BooleanResponse, JsonResponse};

/// Node manager client speaking gRPC
pub struct GrpcNodeClient {
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl GrpcNodeClient {
    /// Create a new client from transport configuration
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            call_timeout: config.call_timeout(),
        }
    }

    async fn connect(&self, job_id: JobId, node: &NodeAddr) -> GpurmResult<Channel> {
        let endpoint = Endpoint::from_shared(node.uri())
            .map_err(|e| GpurmError::transport(job_id, node, format!("invalid address: {}", e)))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.call_timeout);

        endpoint
            .connect()
            .await
            .map_err(|e| GpurmError::transport(job_id, node, format!("connect failed: {}", e)))
    }

    async fn unary<Req, Resp>(
        &self,
        job_id: JobId,
        node: &NodeAddr,
        path: &'static str,
        request: Req,
    ) -> GpurmResult<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let channel = self.connect(job_id, node).await?;
        let mut grpc = tonic::client::Grpc::new(channel);

        grpc.ready().await.map_err(|e| {
            GpurmError::transport(job_id, node, format!("channel not ready: {}", e))
        })?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await
            .map_err(|status| {
                GpurmError::transport(
                    job_id,
                    node,
                    format!("{:?}: {}", status.code(), status.message()),
                )
            })?;

        Ok(response.into_inner())
    }

    fn json_request<T: serde::Serialize>(payload: &T) -> GpurmResult<JsonResponse> {
        Ok(JsonResponse {
            response: serde_json::to_string(payload)?,
        })
    }
}

#[async_trait]
impl NodeManagerClient for GrpcNodeClient {
    async fn launch(&self, node: &NodeAddr, payload: &LaunchPayload) -> GpurmResult<()> {
        let request = Self::json_request(payload)?;
        let ack: BooleanResponse = self.unary(payload.job_id, node, LAUNCH_JOB, request).await?;

        debug!(
            job_id = %payload.job_id,
            node = %node,
            gpu = payload.local_gpu_id,
            ack = ack.value,
            "Launch request answered"
        );

        if ack.value {
            Ok(())
        } else {
            Err(GpurmError::transport(
                payload.job_id,
                node,
                "launch not acknowledged",
            ))
        }
    }

    async fn terminate(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<()> {
        let request = Self::json_request(&JobIdPayload::new(job_id))?;
        let ack: BooleanResponse = self.unary(job_id, node, TERMINATE_JOB, request).await?;

        debug!(job_id = %job_id, node = %node, ack = ack.value, "Terminate request answered");

        if ack.value {
            Ok(())
        } else {
            Err(GpurmError::transport(job_id, node, "terminate not acknowledged"))
        }
    }

    async fn fetch_metrics(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<MetricsResult> {
        let request = Self::json_request(&JobIdPayload::new(job_id))?;
        let reply: JsonResponse = self.unary(job_id, node, GET_METRICS, request).await?;

        MetricsResult::from_json(&reply.response).map_err(|e| {
            GpurmError::transport(job_id, node, format!("malformed metrics: {}", e))
        })
    }

    fn name(&self) -> &'static str {
        "grpc"
    }
}
