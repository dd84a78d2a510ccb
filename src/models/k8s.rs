use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// Wire shapes of `kubectl get ... -o=json`. Required fields are plain
// values so a missing one rejects the item; optional ones default.

/// Top-level listing. Items are kept raw so each one decodes on its own.
#[derive(Debug, Deserialize)]
pub struct ItemList {
    pub items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    pub name: String,
    pub namespace: String,
    pub creation_timestamp: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    pub name: String,
    pub creation_timestamp: String,
}

// --- Pod ---

#[derive(Debug, Deserialize)]
pub struct Pod {
    pub metadata: PodMeta,
    #[serde(default)]
    pub spec: PodSpec,
    pub status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    pub phase: String,
    #[serde(default, rename = "hostIP")]
    pub host_ip: Option<String>,
    #[serde(default, rename = "podIP")]
    pub pod_ip: Option<String>,
    pub container_statuses: Vec<ContainerStatus>,
}

/// One entry of `status.containerStatuses`. Both fields are optional so a
/// malformed container drops only itself, not the whole pod.
#[derive(Debug, Deserialize)]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<Map<String, Value>>,
}

// --- Node ---

#[derive(Debug, Deserialize)]
pub struct Node {
    pub metadata: NodeMeta,
    pub status: NodeStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub node_info: NodeSystemInfo,
    pub capacity: Capacity,
    #[serde(default)]
    pub allocatable: Option<Allocatable>,
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    pub os_image: String,
}

#[derive(Debug, Deserialize)]
pub struct Capacity {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Allocatable {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeAddress {
    #[serde(default, rename = "type")]
    pub address_type: String,
    #[serde(default)]
    pub address: String,
}
