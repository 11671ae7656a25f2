//! Job, placement, and node address type definitions

use crate::error::{GpurmError, GpurmResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Job identifier issued by the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        JobId(id)
    }
}

/// Launch specification produced by the job submitter
///
/// Read-only to the control plane. Fields this crate does not interpret
/// (container location, config parser names, tracked parameters) are kept
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    /// Command the node manager runs for each device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_command: Option<String>,
    /// Whether the job is advanced in-process instead of on a node
    pub simulation: bool,
    /// Resume marker forwarded to the node manager as `should_resume`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<Value>,
    /// Number of GPUs requested
    #[serde(rename = "num_GPUs", default)]
    pub num_gpus: u32,
    /// Policy-specific and submitter-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobDescription {
    /// Create a live job description with the given launch command
    pub fn live(launch_command: impl Into<String>) -> Self {
        Self {
            launch_command: Some(launch_command.into()),
            simulation: false,
            suspended: None,
            num_gpus: 1,
            extra: Map::new(),
        }
    }

    /// Create a simulated job description
    pub fn simulated() -> Self {
        Self {
            launch_command: None,
            simulation: true,
            suspended: None,
            num_gpus: 1,
            extra: Map::new(),
        }
    }

    /// Validate an untyped submission record
    ///
    /// The `simulation` flag must be present and boolean; everything else is
    /// decoded leniently. The launch command is checked at launch time since
    /// simulated jobs never need one.
    pub fn from_value(value: Value) -> GpurmResult<Self> {
        let record = value.as_object().ok_or_else(|| {
            GpurmError::ContractViolation("job description must be an object".to_string())
        })?;

        match record.get("simulation") {
            Some(Value::Bool(_)) => {}
            Some(other) => {
                return Err(GpurmError::ContractViolation(format!(
                    "simulation flag must be a boolean, got {}",
                    other
                )))
            }
            None => {
                return Err(GpurmError::ContractViolation(
                    "job description is missing the simulation flag".to_string(),
                ))
            }
        }

        serde_json::from_value(value).map_err(|e| {
            GpurmError::ContractViolation(format!("invalid job description: {}", e))
        })
    }

    /// Launch command, or a contract violation naming the job
    pub fn require_launch_command(&self, job_id: JobId) -> GpurmResult<&str> {
        self.launch_command
            .as_deref()
            .ok_or_else(|| {
                GpurmError::ContractViolation(format!("job {} has no launch command", job_id))
            })
    }

    /// Value forwarded as `should_resume`: the suspended marker, or `"0"`
    pub fn should_resume(&self) -> Value {
        self.suspended
            .clone()
            .unwrap_or_else(|| Value::String("0".to_string()))
    }
}

/// One device a job occupies: node address plus node-local GPU index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSlot {
    /// Node host address
    pub node: String,
    /// GPU index local to the node
    pub local_gpu_id: u32,
}

impl DeviceSlot {
    pub fn new(node: impl Into<String>, local_gpu_id: u32) -> Self {
        Self {
            node: node.into(),
            local_gpu_id,
        }
    }
}

impl std::fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/gpu{}", self.node, self.local_gpu_id)
    }
}

/// Placement of a job as decided by the allocator
///
/// `nodes` and `local_gpu_ids` are parallel lists zipped positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Node address per device
    pub nodes: Vec<String>,
    /// Node-local GPU index per device
    pub local_gpu_ids: Vec<u32>,
}

impl Placement {
    /// Create a placement from parallel lists
    pub fn new(nodes: Vec<String>, local_gpu_ids: Vec<u32>) -> Self {
        Self {
            nodes,
            local_gpu_ids,
        }
    }

    /// Create a single-device placement
    pub fn single(node: impl Into<String>, local_gpu_id: u32) -> Self {
        Self::new(vec![node.into()], vec![local_gpu_id])
    }

    /// Zip nodes to device indices, rejecting mismatched or empty lists
    pub fn devices(&self, job_id: JobId) -> GpurmResult<Vec<DeviceSlot>> {
        if self.nodes.len() != self.local_gpu_ids.len() {
            return Err(GpurmError::ContractViolation(format!(
                "placement of job {} has {} nodes but {} device indices",
                job_id,
                self.nodes.len(),
                self.local_gpu_ids.len()
            )));
        }
        if self.nodes.is_empty() {
            return Err(GpurmError::ContractViolation(format!(
                "placement of job {} is empty",
                job_id
            )));
        }

        Ok(self
            .nodes
            .iter()
            .zip(&self.local_gpu_ids)
            .map(|(node, gpu)| DeviceSlot::new(node.clone(), *gpu))
            .collect())
    }

    /// First node of the placement, where terminate and metrics calls go
    pub fn primary_node(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }
}

/// Network address of a node manager
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    /// Host address
    pub host: String,
    /// Node manager RPC port
    pub port: u16,
}

impl NodeAddr {
    /// Create a new node address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI used to open a channel to this node manager
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
