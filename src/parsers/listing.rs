use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::helpers::parse_timestamp;
use crate::models::cluster::{Node, Pod, PodPhase};
use crate::models::k8s;
use crate::quantity::{parse_cpu, parse_memory};

const EXTERNAL_ADDRESS_TYPE: &str = "ExternalIP";

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("listing is not a JSON object with an items array: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Decode a pod listing. A malformed listing yields no pods; a malformed
/// item is dropped on its own.
pub fn parse_pods(text: &str) -> Vec<Pod> {
    decode_items::<k8s::Pod>(text, "pod")
        .into_iter()
        .map(pod_from_wire)
        .collect()
}

pub fn parse_nodes(text: &str) -> Vec<Node> {
    decode_items::<k8s::Node>(text, "node")
        .into_iter()
        .map(node_from_wire)
        .collect()
}

fn decode_items<T: DeserializeOwned>(text: &str, kind: &str) -> Vec<T> {
    let list = match item_list(text) {
        Ok(list) => list,
        Err(e) => {
            warn!("ignoring {} listing: {}", kind, e);
            return Vec::new();
        }
    };

    list.items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("skipping {} record: {}", kind, e);
                None
            }
        })
        .collect()
}

fn item_list(text: &str) -> Result<k8s::ItemList, ListingError> {
    Ok(serde_json::from_str(text)?)
}

fn pod_from_wire(pod: k8s::Pod) -> Pod {
    Pod {
        name: pod.metadata.name,
        namespace: pod.metadata.namespace,
        phase: PodPhase::from(pod.status.phase.as_str()),
        start_time: parse_timestamp(&pod.metadata.creation_timestamp),
        host_address: pod.status.host_ip,
        pod_address: pod.status.pod_ip,
        node_name: pod.spec.node_name,
        labels: pod.metadata.labels,
        containers: container_states(&pod.status.container_statuses),
    }
}

fn node_from_wire(node: k8s::Node) -> Node {
    let status = node.status;
    let allocatable = status.allocatable.unwrap_or_default();

    // Allocatable wins when it decodes; otherwise the raw capacity is used.
    let cpu_capacity = allocatable
        .cpu
        .as_deref()
        .and_then(parse_cpu)
        .or_else(|| parse_cpu(&status.capacity.cpu));
    let memory_capacity = allocatable
        .memory
        .as_deref()
        .and_then(parse_memory)
        .or_else(|| parse_memory(&status.capacity.memory));

    let external_address = status
        .addresses
        .into_iter()
        .filter(|a| a.address_type == EXTERNAL_ADDRESS_TYPE)
        .map(|a| a.address)
        .last();

    Node {
        name: node.metadata.name,
        created: parse_timestamp(&node.metadata.creation_timestamp),
        os_image: status.node_info.os_image,
        external_address,
        cpu_capacity,
        memory_capacity,
    }
}

fn container_states(statuses: &[k8s::ContainerStatus]) -> BTreeMap<String, String> {
    statuses
        .iter()
        .filter_map(|c| {
            let name = c.name.clone()?;
            let state = c.state.as_ref().and_then(state_label)?;
            Some((name, state))
        })
        .collect()
}

/// `{"waiting": {"reason": "ContainerCreating"}}` -> `ContainerCreating`,
/// `{"running": {...}}` -> `running`.
fn state_label(state: &Map<String, Value>) -> Option<String> {
    let (key, value) = state.iter().next()?;
    let reason = value.get("reason").and_then(Value::as_str);
    Some(reason.unwrap_or(key).to_string())
}
