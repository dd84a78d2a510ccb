use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

pub const SYSTEM_NAMESPACE: &str = "kube-system";
pub const UNLABELED_GROUP: &str = "Unlabeled";
pub const MISSING_CLUSTER_NAME: &str = "Not Found";

// --- Pod ---

/// Pod lifecycle phase. Declaration order is severity order, so `max()`
/// over a set of pods gives the worst phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PodPhase {
    Succeeded,
    Running,
    Pending,
    Unknown,
    Failed,
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        match s {
            "Succeeded" => Self::Succeeded,
            "Running" => Self::Running,
            "Pending" => Self::Pending,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub host_address: Option<String>,
    pub pod_address: Option<String>,
    pub node_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Container name to status label (`running`, `ContainerCreating`, ...).
    pub containers: BTreeMap<String, String>,
}

impl Pod {
    pub fn key(&self) -> PodKey {
        PodKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Display order: oldest first, pods without a start time last, name
    /// as the tie-breaker.
    pub fn display_order(a: &Pod, b: &Pod) -> Ordering {
        match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        }
    }
}

// Labels only matter through the group a pod lands in, so a label edit that
// keeps the pod in its group is not a change.
impl PartialEq for Pod {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.namespace == other.namespace
            && self.phase == other.phase
            && self.start_time == other.start_time
            && self.host_address == other.host_address
            && self.pod_address == other.pod_address
            && self.node_name == other.node_name
            && self.containers == other.containers
    }
}

impl Eq for Pod {}

// --- Node ---

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub os_image: String,
    pub external_address: Option<String>,
    pub cpu_capacity: Option<i64>,
    pub memory_capacity: Option<i64>,
}

// --- Usage ---

/// Latest `kubectl top` figures for one pod or node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
}

/// Usage figures keyed by entity identity. Listings are rebuilt every cycle;
/// this is the only part that is refreshed in place.
#[derive(Debug, Clone)]
pub struct UsageOverlay<K> {
    entries: HashMap<K, Usage>,
}

impl<K> Default for UsageOverlay<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> UsageOverlay<K> {
    pub fn get(&self, key: &K) -> Option<&Usage> {
        self.entries.get(key)
    }

    /// Record a top result. `None` clears any previous figure.
    pub fn set(&mut self, key: K, usage: Option<Usage>) {
        match usage {
            Some(u) => {
                self.entries.insert(key, u);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

}

// --- Group ---

/// Group identity. Variant order is display order: labelled groups
/// alphabetically, then unlabeled, then the system namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Label(String),
    Unlabeled,
    System,
}

impl GroupKey {
    /// Label values that spell a reserved bucket name join that bucket.
    pub fn for_pod(pod: &Pod, grouping_label: &str) -> Self {
        if let Some(value) = pod.labels.get(grouping_label) {
            match value.as_str() {
                SYSTEM_NAMESPACE => Self::System,
                UNLABELED_GROUP => Self::Unlabeled,
                _ => Self::Label(value.clone()),
            }
        } else if pod.namespace == SYSTEM_NAMESPACE {
            Self::System
        } else {
            Self::Unlabeled
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Label(value) => value,
            Self::Unlabeled => UNLABELED_GROUP,
            Self::System => SYSTEM_NAMESPACE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub key: GroupKey,
    pods: Vec<Pod>,
    pub collapsed: bool,
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.pods == other.pods
    }
}

impl Group {
    pub fn new(key: GroupKey, mut pods: Vec<Pod>) -> Self {
        pods.sort_by(Pod::display_order);
        Self {
            key,
            pods,
            collapsed: true,
        }
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }

    pub fn worst_phase(&self) -> PodPhase {
        self.pods
            .iter()
            .map(|p| p.phase)
            .max()
            .unwrap_or(PodPhase::Succeeded)
    }

    pub fn running_count(&self) -> usize {
        self.pods
            .iter()
            .filter(|p| p.phase == PodPhase::Running)
            .count()
    }

    /// Sum of pod usage. Pods without figures are skipped one by one; a
    /// field is absent only when no pod reported it.
    pub fn combined_usage(&self, usage: &UsageOverlay<PodKey>) -> Usage {
        let mut total = Usage::default();
        for pod in &self.pods {
            if let Some(u) = usage.get(&pod.key()) {
                total.cpu = add_present(total.cpu, u.cpu);
                total.memory = add_present(total.memory, u.memory);
            }
        }
        total
    }
}

fn add_present(acc: Option<i64>, value: Option<i64>) -> Option<i64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a + v),
        (None, v) => v,
        (a, None) => a,
    }
}

// --- Cluster ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub cpu_total: Option<i64>,
    pub mem_total: Option<i64>,
    pub cpu_used: Option<i64>,
    pub mem_used: Option<i64>,
}

impl ResourceSummary {
    /// Sum node figures. One node missing a figure makes that total unknown.
    pub fn aggregate(nodes: &[Node], usage: &UsageOverlay<String>) -> Self {
        let mut summary = Self {
            cpu_total: Some(0),
            mem_total: Some(0),
            cpu_used: Some(0),
            mem_used: Some(0),
        };
        for node in nodes {
            let used = usage.get(&node.name).copied().unwrap_or_default();
            summary.cpu_total = add_all(summary.cpu_total, node.cpu_capacity);
            summary.mem_total = add_all(summary.mem_total, node.memory_capacity);
            summary.cpu_used = add_all(summary.cpu_used, used.cpu);
            summary.mem_used = add_all(summary.mem_used, used.memory);
        }
        summary
    }
}

fn add_all(acc: Option<i64>, value: Option<i64>) -> Option<i64> {
    Some(acc? + value?)
}

#[derive(Debug, Clone)]
pub struct Cluster {
    name: Option<String>,
    pub nodes: Vec<Node>,
    pub resource_summary: ResourceSummary,
}

impl Cluster {
    pub fn new(name: Option<String>, nodes: Vec<Node>, usage: &UsageOverlay<String>) -> Self {
        let resource_summary = ResourceSummary::aggregate(&nodes, usage);
        Self {
            name,
            nodes,
            resource_summary,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(MISSING_CLUSTER_NAME)
    }

    /// Lookup for resolving `Pod::node_name`; valid for this snapshot only.
    pub fn node_index(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.name.as_str(), n)).collect()
    }
}
