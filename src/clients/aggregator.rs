use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::cluster::{
    Cluster, Group, GroupKey, Pod, PodKey, PodPhase, Usage, UsageOverlay,
};
use crate::reconcile::{Reconciliation, reconcile};

use super::{CommandExecutor, Kubectl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotEvent {
    /// Group structure changed (or a group was collapsed/expanded).
    Groups,
    /// Pod usage figures were refreshed.
    Usage,
    /// Cluster identity, nodes or node usage were refreshed.
    Cluster,
}

impl SnapshotEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotEvent::Groups => "groups",
            SnapshotEvent::Usage => "usage",
            SnapshotEvent::Cluster => "cluster",
        }
    }
}

/// Latest published state. Readers clone what they need under the lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub cluster: Option<Cluster>,
    pub groups: Vec<Group>,
    pub pod_usage: UsageOverlay<PodKey>,
    pub node_usage: UsageOverlay<String>,
}

pub struct Aggregator {
    executor: Arc<dyn CommandExecutor>,
    config: watch::Receiver<Arc<Config>>,
    state: RwLock<Snapshot>,
    events: broadcast::Sender<SnapshotEvent>,
}

impl Aggregator {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: watch::Receiver<Arc<Config>>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            executor,
            config,
            state: RwLock::new(Snapshot::default()),
            events,
        }
    }

    /// Config in effect for the next cycle.
    pub fn config(&self) -> Arc<Config> {
        self.config.borrow().clone()
    }

    pub fn kubectl(&self, cfg: &Config) -> Kubectl {
        Kubectl::new(self.executor.clone(), cfg.kubectl_path.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    /// One refresh cycle: the pod side and the cluster side run side by side
    /// and only meet at the snapshot lock.
    pub async fn refresh_once(&self) {
        let cfg = self.config();
        tokio::join!(self.refresh_pods(&cfg), self.refresh_cluster(&cfg));
    }

    pub async fn run_refresher(self: Arc<Self>, cancel: CancellationToken) {
        info!("refresher started");
        loop {
            self.refresh_once().await;

            let interval = self.config().refresh_interval();
            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    info!("refresher stopped");
                    return;
                }
            }
        }
    }

    pub async fn build_groups(&self, cfg: &Config) -> Vec<Group> {
        let pods = self.kubectl(cfg).list_pods().await;
        group_pods(pods, cfg)
    }

    async fn refresh_pods(&self, cfg: &Config) {
        let mut groups = self.build_groups(cfg).await;

        let running = {
            let mut state = self.state.write().await;
            match reconcile(&state.groups, &mut groups) {
                Reconciliation::Unchanged => debug!("pod groups unchanged"),
                Reconciliation::Changed => {
                    info!(groups = groups.len(), "pod groups changed");
                    state.groups = groups;
                    self.publish(SnapshotEvent::Groups);
                }
            }
            running_pods(&state.groups)
        };

        let kubectl = self.kubectl(cfg);
        let kubectl = &kubectl;
        let results: Vec<(PodKey, Option<Usage>)> = stream::iter(running)
            .map(|key| async move {
                let usage = kubectl.top_pod(&key.namespace, &key.name).await;
                (key, usage)
            })
            .buffer_unordered(cfg.usage_concurrency.max(1))
            .collect()
            .await;

        let mut state = self.state.write().await;
        for (key, usage) in results {
            state.pod_usage.set(key, usage);
        }
        // Usage is only meaningful for pods that are running in the latest
        // listing.
        let live = running_pods(&state.groups);
        state.pod_usage.retain(|key| live.contains(key));
        debug!(pods = state.pod_usage.len(), "pod usage refreshed");
        self.publish(SnapshotEvent::Usage);
    }

    pub async fn build_cluster(&self, cfg: &Config) -> (Cluster, UsageOverlay<String>) {
        let kubectl = self.kubectl(cfg);
        let (nodes, name) = tokio::join!(kubectl.list_nodes(), kubectl.current_context());
        if name.is_none() {
            warn!("could not determine current kubectl context");
        }

        let kubectl = &kubectl;
        let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        let results: Vec<(String, Option<Usage>)> = stream::iter(names)
            .map(|name| async move {
                let usage = kubectl.top_node(&name).await;
                (name, usage)
            })
            .buffer_unordered(cfg.usage_concurrency.max(1))
            .collect()
            .await;

        let mut usage = UsageOverlay::default();
        for (name, u) in results {
            usage.set(name, u);
        }

        (Cluster::new(name, nodes, &usage), usage)
    }

    async fn refresh_cluster(&self, cfg: &Config) {
        let (cluster, usage) = self.build_cluster(cfg).await;
        debug!(
            cluster = cluster.display_name(),
            nodes = cluster.nodes.len(),
            "cluster refreshed"
        );

        let mut state = self.state.write().await;
        state.cluster = Some(cluster);
        state.node_usage = usage;
        self.publish(SnapshotEvent::Cluster);
    }

    /// Flip a group's collapsed flag. Returns the new value, or `None` when
    /// no group has that name.
    pub async fn toggle_group(&self, name: &str) -> Option<bool> {
        let mut state = self.state.write().await;
        let group = state.groups.iter_mut().find(|g| g.name() == name)?;
        group.collapsed = !group.collapsed;
        let collapsed = group.collapsed;
        self.publish(SnapshotEvent::Groups);
        Some(collapsed)
    }

    /// Delete a pod and hand kubectl's message back to the caller.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> String {
        let cfg = self.config();
        info!("deleting pod {}/{}", namespace, name);
        match self.kubectl(&cfg).delete_pod(namespace, name).await {
            Some(output) => output,
            None => {
                warn!("kubectl returned nothing deleting pod {}/{}", namespace, name);
                format!("no output from kubectl deleting pod {}/{}", namespace, name)
            }
        }
    }

    fn publish(&self, event: SnapshotEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Bucket pods by the grouping label and apply the visibility flags.
/// Returned groups are in display order.
pub fn group_pods(pods: Vec<Pod>, cfg: &Config) -> Vec<Group> {
    let mut buckets: BTreeMap<GroupKey, Vec<Pod>> = BTreeMap::new();
    for pod in pods {
        let key = GroupKey::for_pod(&pod, &cfg.grouping_label);
        buckets.entry(key).or_default().push(pod);
    }

    buckets
        .into_iter()
        .filter(|(key, _)| match key {
            GroupKey::System => cfg.show_system_pods,
            GroupKey::Unlabeled => cfg.show_unlabeled_pods,
            GroupKey::Label(_) => true,
        })
        .map(|(key, pods)| Group::new(key, pods))
        .collect()
}

fn running_pods(groups: &[Group]) -> HashSet<PodKey> {
    groups
        .iter()
        .flat_map(|g| g.pods())
        .filter(|p| p.phase == PodPhase::Running)
        .map(Pod::key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::ScriptedExecutor;
    use tokio::sync::broadcast::error::TryRecvError;

    const PODS: &str = r#"{"items": [
        {"metadata": {"name": "web-1", "namespace": "default", "creationTimestamp": "2017-06-01T10:00:00Z", "labels": {"app": "web"}},
         "spec": {"nodeName": "n1"},
         "status": {"phase": "Running", "containerStatuses": [{"name": "nginx", "state": {"running": {}}}]}},
        {"metadata": {"name": "web-2", "namespace": "default", "creationTimestamp": "2017-06-01T09:00:00Z", "labels": {"app": "web"}},
         "status": {"phase": "Pending", "containerStatuses": [{"name": "nginx", "state": {"waiting": {"reason": "ContainerCreating"}}}]}},
        {"metadata": {"name": "api-1", "namespace": "shop", "creationTimestamp": "2017-06-01T08:00:00Z", "labels": {"app": "api"}},
         "status": {"phase": "Running", "containerStatuses": []}},
        {"metadata": {"name": "kube-dns", "namespace": "kube-system", "creationTimestamp": "2017-05-01T08:00:00Z"},
         "status": {"phase": "Running", "containerStatuses": []}},
        {"metadata": {"name": "migrate", "namespace": "default", "creationTimestamp": "2017-06-01T07:00:00Z"},
         "status": {"phase": "Succeeded", "containerStatuses": []}}
    ]}"#;

    const NODES: &str = r#"{"items": [
        {"metadata": {"name": "n1", "creationTimestamp": "2017-05-01T00:00:00Z"},
         "status": {"nodeInfo": {"osImage": "COS"}, "capacity": {"cpu": "2", "memory": "7500000Ki"},
                    "allocatable": {"cpu": "1930m", "memory": "5000000Ki"}}},
        {"metadata": {"name": "n2", "creationTimestamp": "2017-05-01T00:00:00Z"},
         "status": {"nodeInfo": {"osImage": "COS"}, "capacity": {"cpu": "2", "memory": "4Gi"}}}
    ]}"#;

    const POD_TOP_HEADER: &str = "NAME   CPU(cores)   MEMORY(bytes)\n";
    const NODE_TOP_HEADER: &str = "NAME   CPU(cores)   CPU%   MEMORY(bytes)   MEMORY%\n";

    fn scripted() -> ScriptedExecutor {
        ScriptedExecutor::default()
            .respond("get pods --all-namespaces -o=json", PODS)
            .respond("get nodes -o=json", NODES)
            .respond(
                "config view -o=template --template='{{ index . \"current-context\" }}'",
                "'prod'",
            )
            .respond(
                "top pod web-1 --namespace=default",
                &format!("{}web-1   5m   20Mi\n", POD_TOP_HEADER),
            )
            .respond(
                "top pod kube-dns --namespace=kube-system",
                &format!("{}kube-dns   3m   10Mi\n", POD_TOP_HEADER),
            )
            .respond(
                "top node n1",
                &format!("{}n1   250m   12%   1000Mi   20%\n", NODE_TOP_HEADER),
            )
            .respond(
                "top node n2",
                &format!("{}n2   100m   5%   500Mi   12%\n", NODE_TOP_HEADER),
            )
    }

    fn aggregator(exec: ScriptedExecutor, cfg: Config) -> (Arc<Aggregator>, Arc<ScriptedExecutor>) {
        let exec = Arc::new(exec);
        let (_tx, rx) = watch::channel(Arc::new(cfg));
        (Arc::new(Aggregator::new(exec.clone(), rx)), exec)
    }

    fn drain(rx: &mut broadcast::Receiver<SnapshotEvent>) -> Vec<SnapshotEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(e) => events.push(e),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn names(groups: &[Group]) -> Vec<&str> {
        groups.iter().map(|g| g.name()).collect()
    }

    #[test]
    fn test_group_pods_visibility_flags() {
        let pods = crate::parsers::parse_pods(PODS);

        let all = group_pods(pods.clone(), &Config::default());
        assert_eq!(names(&all), vec!["api", "web", "Unlabeled", "kube-system"]);

        let cfg = Config {
            show_system_pods: false,
            show_unlabeled_pods: false,
            ..Config::default()
        };
        let labelled = group_pods(pods.clone(), &cfg);
        assert_eq!(names(&labelled), vec!["api", "web"]);

        let by_namespace_label = Config {
            grouping_label: "tier".to_string(),
            ..Config::default()
        };
        let grouped = group_pods(pods, &by_namespace_label);
        assert_eq!(names(&grouped), vec!["Unlabeled", "kube-system"]);
        assert_eq!(grouped[0].pods().len(), 4);
    }

    #[test]
    fn test_reserved_label_value_merges_into_system_bucket() {
        use crate::models::cluster::tests::pod;

        let mut labelled = pod("default", "proxy", PodPhase::Running);
        labelled.labels.insert("app".to_string(), "kube-system".to_string());
        let mut zeta = pod("default", "zeta-1", PodPhase::Running);
        zeta.labels.insert("app".to_string(), "zeta".to_string());
        let dns = pod("kube-system", "kube-dns", PodPhase::Running);
        let pods = vec![labelled, dns, zeta];

        let grouped = group_pods(pods.clone(), &Config::default());
        assert_eq!(names(&grouped), vec!["zeta", "kube-system"]);
        assert_eq!(grouped[1].pods().len(), 2);

        let cfg = Config {
            show_system_pods: false,
            ..Config::default()
        };
        assert_eq!(names(&group_pods(pods, &cfg)), vec!["zeta"]);
    }

    #[tokio::test]
    async fn test_refresh_builds_snapshot() {
        let (agg, _) = aggregator(scripted(), Config::default());
        let mut rx = agg.subscribe();

        agg.refresh_once().await;
        let snap = agg.snapshot().await;

        assert_eq!(names(&snap.groups), vec!["api", "web", "Unlabeled", "kube-system"]);
        let web = &snap.groups[1];
        assert_eq!(web.pods().first().map(|p| p.name.as_str()), Some("web-2"));
        assert_eq!(web.worst_phase(), PodPhase::Pending);

        let cluster = snap.cluster.as_ref().unwrap();
        assert_eq!(cluster.display_name(), "prod");
        let summary = cluster.resource_summary;
        assert_eq!(summary.cpu_total, Some(3930));
        assert_eq!(summary.mem_total, Some(9_000_000_000));
        assert_eq!(summary.cpu_used, Some(350));
        assert_eq!(summary.mem_used, Some(1_500_000_000));

        let web_usage = web.combined_usage(&snap.pod_usage);
        assert_eq!(web_usage.cpu, Some(5));
        assert_eq!(web_usage.memory, Some(20_000_000));
        // api-1 is running but top gave nothing.
        assert_eq!(snap.groups[0].combined_usage(&snap.pod_usage), Usage::default());
        assert_eq!(snap.pod_usage.len(), 2);

        let events: HashSet<_> = drain(&mut rx).into_iter().collect();
        assert!(events.contains(&SnapshotEvent::Groups));
        assert!(events.contains(&SnapshotEvent::Usage));
        assert!(events.contains(&SnapshotEvent::Cluster));
    }

    #[tokio::test]
    async fn test_only_running_pods_are_topped() {
        let (agg, exec) = aggregator(scripted(), Config::default());
        agg.refresh_once().await;

        let tops: Vec<String> = exec
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("top pod"))
            .collect();
        assert_eq!(tops.len(), 3);
        assert!(!tops.iter().any(|c| c.contains("web-2") || c.contains("migrate")));
    }

    #[tokio::test]
    async fn test_unchanged_refresh_keeps_ui_state() {
        let (agg, _) = aggregator(scripted(), Config::default());
        agg.refresh_once().await;

        assert_eq!(agg.toggle_group("web").await, Some(false));
        assert_eq!(agg.toggle_group("nope").await, None);

        let mut rx = agg.subscribe();
        agg.refresh_once().await;

        let events = drain(&mut rx);
        assert!(!events.contains(&SnapshotEvent::Groups));
        assert!(events.contains(&SnapshotEvent::Usage));

        let snap = agg.snapshot().await;
        let web = snap.groups.iter().find(|g| g.name() == "web").unwrap();
        assert!(!web.collapsed);
    }

    #[tokio::test]
    async fn test_missing_kubectl_degrades_to_empty_snapshot() {
        let (agg, _) = aggregator(ScriptedExecutor::missing(), Config::default());
        agg.refresh_once().await;

        let snap = agg.snapshot().await;
        assert!(snap.groups.is_empty());
        let cluster = snap.cluster.unwrap();
        assert_eq!(cluster.display_name(), "Not Found");
        assert!(cluster.nodes.is_empty());
        assert!(snap.pod_usage.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pod_reports_message() {
        let exec = scripted().respond("--namespace default delete pod web-1", "pod \"web-1\" deleted\n");
        let (agg, _) = aggregator(exec, Config::default());

        assert_eq!(agg.delete_pod("default", "web-1").await, "pod \"web-1\" deleted\n");
        assert!(agg.delete_pod("default", "ghost").await.contains("no output"));
    }

    #[tokio::test]
    async fn test_refresher_stops_when_cancelled() {
        let (agg, exec) = aggregator(scripted(), Config::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Already cancelled: one cycle runs to completion, then no rescheduling.
        agg.clone().run_refresher(cancel).await;
        let listings = exec
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("get pods"))
            .count();
        assert_eq!(listings, 1);
    }
}
