use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::helpers::{age_since, truncate_middle};
use crate::quantity::{format_cpu, format_memory};

use super::cluster::{Cluster, Group, Node, Pod, PodKey, PodPhase, ResourceSummary, UsageOverlay};

const UNKNOWN_TEXT: &str = "Unknown";
const SECTION_SEPARATOR: &str = "---";
const GROUP_SEPARATOR: &str = " : ";
const NAME_TRUNCATION: usize = 30;

// Everything a presentation layer needs, already formatted.

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub cluster: ClusterView,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub name: String,
    pub context: Option<String>,
    pub summary: ResourceSummary,
    pub cpu_info: Option<String>,
    pub memory_info: Option<String>,
    pub nodes: Vec<NodeView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub name: String,
    pub os_image: String,
    pub external_address: Option<String>,
    pub age: String,
    pub cpu_capacity: Option<String>,
    pub memory_capacity: Option<String>,
    pub cpu_used: Option<String>,
    pub memory_used: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub name: String,
    pub collapsed: bool,
    pub worst_phase: PodPhase,
    pub running: usize,
    pub pod_count: usize,
    pub cpu: String,
    pub memory: String,
    pub pods: Vec<PodView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodView {
    pub name: String,
    pub display_name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub created: Option<DateTime<Utc>>,
    pub age: String,
    pub host_address: Option<String>,
    pub pod_address: Option<String>,
    pub node_name: Option<String>,
    pub node_address: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub containers: Vec<ContainerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerView {
    pub name: String,
    pub state: String,
}

// --- View Builders ---

pub fn build_snapshot_view(
    cluster: Option<&Cluster>,
    groups: &[Group],
    pod_usage: &UsageOverlay<PodKey>,
    node_usage: &UsageOverlay<String>,
    now: DateTime<Utc>,
) -> SnapshotView {
    SnapshotView {
        cluster: build_cluster_view(cluster, groups, pod_usage, node_usage, now),
        groups: build_group_views(cluster, groups, pod_usage, now),
    }
}

pub fn build_cluster_view(
    cluster: Option<&Cluster>,
    groups: &[Group],
    pod_usage: &UsageOverlay<PodKey>,
    node_usage: &UsageOverlay<String>,
    now: DateTime<Utc>,
) -> ClusterView {
    let Some(cluster) = cluster else {
        return ClusterView {
            name: super::cluster::MISSING_CLUSTER_NAME.to_string(),
            context: None,
            summary: ResourceSummary::default(),
            cpu_info: None,
            memory_info: None,
            nodes: Vec::new(),
        };
    };

    let (cpu_info, memory_info) = cluster_info(cluster, groups, pod_usage);
    ClusterView {
        name: cluster.display_name().to_string(),
        context: cluster.name().map(str::to_string),
        summary: cluster.resource_summary,
        cpu_info,
        memory_info,
        nodes: cluster
            .nodes
            .iter()
            .map(|n| build_node_view(n, node_usage, now))
            .collect(),
    }
}

pub fn build_group_views(
    cluster: Option<&Cluster>,
    groups: &[Group],
    pod_usage: &UsageOverlay<PodKey>,
    now: DateTime<Utc>,
) -> Vec<GroupView> {
    let node_index = cluster.map(Cluster::node_index).unwrap_or_default();
    groups
        .iter()
        .map(|g| build_group_view(g, pod_usage, &node_index, now))
        .collect()
}

fn build_group_view(
    group: &Group,
    pod_usage: &UsageOverlay<PodKey>,
    node_index: &HashMap<&str, &Node>,
    now: DateTime<Utc>,
) -> GroupView {
    let usage = group.combined_usage(pod_usage);
    GroupView {
        name: group.name().to_string(),
        collapsed: group.collapsed,
        worst_phase: group.worst_phase(),
        running: group.running_count(),
        pod_count: group.pods().len(),
        cpu: usage.cpu.map(format_cpu).unwrap_or_else(|| UNKNOWN_TEXT.to_string()),
        memory: usage
            .memory
            .map(format_memory)
            .unwrap_or_else(|| UNKNOWN_TEXT.to_string()),
        pods: group
            .pods()
            .iter()
            .map(|p| build_pod_view(p, pod_usage, node_index, now))
            .collect(),
    }
}

fn build_pod_view(
    pod: &Pod,
    pod_usage: &UsageOverlay<PodKey>,
    node_index: &HashMap<&str, &Node>,
    now: DateTime<Utc>,
) -> PodView {
    let usage = pod_usage.get(&pod.key()).copied().unwrap_or_default();
    let node = pod
        .node_name
        .as_deref()
        .and_then(|name| node_index.get(name));

    PodView {
        name: pod.name.clone(),
        display_name: truncate_middle(&pod.name, NAME_TRUNCATION),
        namespace: pod.namespace.clone(),
        phase: pod.phase,
        created: pod.start_time,
        age: age_since(pod.start_time, now),
        host_address: pod.host_address.clone(),
        pod_address: pod.pod_address.clone(),
        node_name: pod.node_name.clone(),
        node_address: node.and_then(|n| n.external_address.clone()),
        cpu: usage.cpu.map(format_cpu),
        memory: usage.memory.map(format_memory),
        containers: pod
            .containers
            .iter()
            .map(|(name, state)| ContainerView {
                name: name.clone(),
                state: state.clone(),
            })
            .collect(),
    }
}

fn build_node_view(node: &Node, node_usage: &UsageOverlay<String>, now: DateTime<Utc>) -> NodeView {
    let usage = node_usage.get(&node.name).copied().unwrap_or_default();
    NodeView {
        name: node.name.clone(),
        os_image: node.os_image.clone(),
        external_address: node.external_address.clone(),
        age: age_since(node.created, now),
        cpu_capacity: node.cpu_capacity.map(format_cpu),
        memory_capacity: node.memory_capacity.map(format_memory),
        cpu_used: usage.cpu.map(format_cpu),
        memory_used: usage.memory.map(format_memory),
    }
}

/// Cluster CPU and memory summary text. A section exists only when both its
/// total and used figures are known; the per-group breakdown is appended
/// only when both sections exist.
pub fn cluster_info(
    cluster: &Cluster,
    groups: &[Group],
    pod_usage: &UsageOverlay<PodKey>,
) -> (Option<String>, Option<String>) {
    let summary = cluster.resource_summary;
    let mut cpu = resource_section(summary.cpu_total, summary.cpu_used, format_cpu);
    let mut memory = resource_section(summary.mem_total, summary.mem_used, format_memory);

    if let (Some(cpu), Some(memory)) = (cpu.as_mut(), memory.as_mut()) {
        cpu.push('\n');
        cpu.push_str(SECTION_SEPARATOR);
        memory.push('\n');
        memory.push_str(SECTION_SEPARATOR);
        for group in groups {
            let usage = group.combined_usage(pod_usage);
            let prefix = format!("{}{}", group.name(), GROUP_SEPARATOR);
            cpu.push_str(&format!(
                "\n{}{}",
                prefix,
                usage.cpu.map(format_cpu).as_deref().unwrap_or(UNKNOWN_TEXT)
            ));
            memory.push_str(&format!(
                "\n{}{}",
                prefix,
                usage.memory.map(format_memory).as_deref().unwrap_or(UNKNOWN_TEXT)
            ));
        }
    }

    (cpu, memory)
}

fn resource_section(
    total: Option<i64>,
    used: Option<i64>,
    format: fn(i64) -> String,
) -> Option<String> {
    let (total, used) = (total?, used?);
    let utilization = if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    Some(format!(
        "Total:\t\t{}\nIn Use:\t\t{}\nUtilization:\t{:.1}%",
        format(total),
        format(used),
        utilization
    ))
}
