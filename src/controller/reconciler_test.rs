//! Tests for the reconciler module
//!
//! These tests drive full passes against an in-memory cluster store that
//! enforces resourceVersion preconditions and counts writes:
//! - Status commits and the no-op short-circuit
//! - Conflict handling
//! - Machine creation, replacement and deletion
//! - Inactive sets and dry-run

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Node;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use kube::core::SelectorExt;
    use kube::ResourceExt;

    use super::super::actions::MachineAction;
    use super::super::conditions::*;
    use super::super::reconciler::*;
    use super::super::store::ClusterStore;
    use crate::crd::{
        ControlPlaneMachineSet, ControlPlaneMachineSetStatus, Machine, PlatformType,
        RolloutStrategyType,
    };
    use crate::error::{Error, Result};
    use crate::labels::{label_selector, MACHINE_INDEX_LABEL};
    use crate::providerconfig::{AwsFailureDomain, AwsFailureDomainPlacement, FailureDomains};
    use crate::test_support::{
        aws_provider_spec, machine, machine_set, node, openstack_provider_spec, TEST_NAMESPACE,
    };

    const NOW: &str = "2026-03-01T12:00:00+00:00";
    const LATER: &str = "2026-03-01T12:10:00+00:00";

    #[derive(Default)]
    struct FakeState {
        set: Option<ControlPlaneMachineSet>,
        machines: Vec<Machine>,
        nodes: Vec<Node>,
        status_writes: usize,
        created: Vec<Machine>,
        deleted: Vec<String>,
        /// Simulate another writer touching the set right before the next status write
        concurrent_write: bool,
    }

    #[derive(Default)]
    struct FakeStore {
        state: Mutex<FakeState>,
    }

    impl FakeStore {
        fn new(set: ControlPlaneMachineSet, machines: Vec<Machine>, nodes: Vec<Node>) -> Self {
            Self {
                state: Mutex::new(FakeState {
                    set: Some(set),
                    machines,
                    nodes,
                    ..Default::default()
                }),
            }
        }

        fn status_writes(&self) -> usize {
            self.state.lock().unwrap().status_writes
        }

        fn created(&self) -> Vec<Machine> {
            self.state.lock().unwrap().created.clone()
        }

        fn deleted(&self) -> Vec<String> {
            self.state.lock().unwrap().deleted.clone()
        }

        fn stored_status(&self) -> Option<ControlPlaneMachineSetStatus> {
            self.state
                .lock()
                .unwrap()
                .set
                .as_ref()
                .and_then(|set| set.status.clone())
        }

        fn bump(version: Option<&String>) -> String {
            let current: u64 = version.and_then(|v| v.parse().ok()).unwrap_or(0);
            (current + 1).to_string()
        }
    }

    fn not_found() -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        })
    }

    #[async_trait]
    impl ClusterStore for FakeStore {
        async fn get_machine_set(&self, namespace: &str, name: &str) -> Result<ControlPlaneMachineSet> {
            self.state
                .lock()
                .unwrap()
                .set
                .clone()
                .ok_or_else(|| Error::read(format!("{}/{}", namespace, name), not_found()))
        }

        async fn list_machines(&self, _namespace: &str, selector: &LabelSelector) -> Result<Vec<Machine>> {
            let selector = label_selector(selector)?;
            let state = self.state.lock().unwrap();
            Ok(state
                .machines
                .iter()
                .filter(|m| selector.matches(m.labels()))
                .cloned()
                .collect())
        }

        async fn list_control_plane_nodes(&self) -> Result<Vec<Node>> {
            Ok(self.state.lock().unwrap().nodes.clone())
        }

        async fn patch_status(
            &self,
            set: &ControlPlaneMachineSet,
            status: &ControlPlaneMachineSetStatus,
        ) -> Result<ControlPlaneMachineSet> {
            let mut state = self.state.lock().unwrap();
            let concurrent_write = std::mem::take(&mut state.concurrent_write);
            let stored = state
                .set
                .as_mut()
                .ok_or_else(|| Error::read("set", not_found()))?;
            if concurrent_write {
                stored.metadata.resource_version =
                    Some(Self::bump(stored.metadata.resource_version.as_ref()));
            }
            if stored.metadata.resource_version != set.metadata.resource_version {
                return Err(Error::Conflict(set.name_any()));
            }

            stored.status = Some(status.clone());
            stored.metadata.resource_version =
                Some(Self::bump(stored.metadata.resource_version.as_ref()));
            let updated = stored.clone();
            state.status_writes += 1;
            Ok(updated)
        }

        async fn create_machine(&self, machine: &Machine) -> Result<Machine> {
            let mut state = self.state.lock().unwrap();
            state.machines.push(machine.clone());
            state.created.push(machine.clone());
            Ok(machine.clone())
        }

        async fn delete_machine(&self, _namespace: &str, name: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.machines.retain(|m| m.name_any() != name);
            state.deleted.push(name.to_string());
            Ok(())
        }
    }

    fn healthy_machines() -> Vec<Machine> {
        (0..3)
            .map(|i| machine(i).with_node(&format!("master-{}", i)).build())
            .collect()
    }

    fn ready_nodes() -> Vec<Node> {
        (0..3).map(|i| node(&format!("master-{}", i), true)).collect()
    }

    fn aws_zones(zones: &[&str]) -> FailureDomains {
        FailureDomains {
            platform: PlatformType::Aws,
            aws: zones
                .iter()
                .map(|zone| AwsFailureDomain {
                    placement: AwsFailureDomainPlacement {
                        availability_zone: zone.to_string(),
                    },
                    subnet: None,
                })
                .collect(),
            azure: vec![],
            gcp: vec![],
            openstack: vec![],
            vsphere: vec![],
            nutanix: vec![],
        }
    }

    async fn pass(store: &FakeStore, now: &str) -> Result<PassOutcome> {
        reconcile_pass(store, TEST_NAMESPACE, MACHINE_SET_NAME, PassOptions::default(), now).await
    }

    #[tokio::test]
    async fn test_first_pass_commits_status() {
        let store = FakeStore::new(machine_set().build(), healthy_machines(), ready_nodes());

        let outcome = pass(&store, NOW).await.unwrap();
        assert!(outcome.status_updated);
        assert!(outcome.actions.is_empty());
        assert_eq!(store.status_writes(), 1);

        let status = store.stored_status().unwrap();
        assert_eq!(status.replicas, 3);
        assert_eq!(status.ready_replicas, 3);
        assert_eq!(status.updated_replicas, 3);
        assert_eq!(status.unavailable_replicas, 0);
        assert_eq!(status.observed_generation, Some(1));
        assert!(is_condition_true(&status.conditions, CONDITION_TYPE_AVAILABLE));
        assert_eq!(requeue_delay(&outcome), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_second_pass_without_changes_writes_nothing() {
        let store = FakeStore::new(machine_set().build(), healthy_machines(), ready_nodes());

        pass(&store, NOW).await.unwrap();
        let second = pass(&store, LATER).await.unwrap();

        assert!(!second.status_updated);
        assert_eq!(store.status_writes(), 1);
        assert!(second
            .status
            .conditions
            .iter()
            .all(|c| c.last_transition_time == NOW));
    }

    #[tokio::test]
    async fn test_changed_observation_commits_again() {
        let store = FakeStore::new(machine_set().build(), healthy_machines(), ready_nodes());
        pass(&store, NOW).await.unwrap();

        store.state.lock().unwrap().nodes[2] = node("master-2", false);
        let outcome = pass(&store, LATER).await.unwrap();

        assert!(outcome.status_updated);
        assert_eq!(store.status_writes(), 2);
        assert_eq!(outcome.status.unavailable_replicas, 1);
        let available = find_condition(&outcome.status.conditions, CONDITION_TYPE_AVAILABLE).unwrap();
        assert_eq!(available.status, CONDITION_STATUS_FALSE);
        assert_eq!(available.last_transition_time, LATER);
        assert_eq!(requeue_delay(&outcome), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_by_next_pass() {
        let store = FakeStore::new(machine_set().build(), healthy_machines(), ready_nodes());
        store.state.lock().unwrap().concurrent_write = true;

        let err = pass(&store, NOW).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(retry_delay(&err), Duration::from_secs(1));
        assert_eq!(store.status_writes(), 0);
        assert!(store.stored_status().is_none());

        let retried = pass(&store, NOW).await.unwrap();
        assert!(retried.status_updated);
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_missing_set_is_a_transient_read() {
        let store = FakeStore::default();
        let err = pass(&store, NOW).await.unwrap_err();
        assert!(matches!(err, Error::TransientRead { .. }));
        assert_eq!(retry_delay(&err), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_missing_index_is_created_in_its_failure_domain() {
        let set = machine_set()
            .with_failure_domains(aws_zones(&["us-east-1a", "us-east-1b", "us-east-1c"]))
            .build();
        let mut machines = healthy_machines();
        machines.remove(1);
        let store = FakeStore::new(set, machines, ready_nodes());

        let outcome = pass(&store, NOW).await.unwrap();
        assert_eq!(outcome.status.replicas, 2);

        let created = store.created();
        assert_eq!(created.len(), 1);
        let new_machine = &created[0];
        assert!(new_machine.name_any().ends_with("-1"));
        assert_eq!(
            new_machine.labels().get(MACHINE_INDEX_LABEL).map(String::as_str),
            Some("1")
        );
        assert_eq!(new_machine.namespace().as_deref(), Some(TEST_NAMESPACE));
        let raw = new_machine.spec.provider_spec.value.as_ref().unwrap();
        assert_eq!(raw["placement"]["availabilityZone"], "us-east-1b");
        assert_eq!(raw["instanceType"], "m6i.xlarge");
    }

    #[tokio::test]
    async fn test_created_machine_is_counted_next_pass() {
        let mut machines = healthy_machines();
        machines.remove(2);
        let store = FakeStore::new(machine_set().build(), machines, ready_nodes());

        pass(&store, NOW).await.unwrap();
        let second = pass(&store, LATER).await.unwrap();

        // The new machine has no node yet
        assert_eq!(second.status.replicas, 3);
        assert_eq!(second.status.ready_replicas, 2);
        assert!(second.actions.is_empty());
        assert_eq!(store.created().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_acting() {
        let mut machines = healthy_machines();
        machines.remove(0);
        let store = FakeStore::new(machine_set().build(), machines, ready_nodes());

        let outcome = reconcile_pass(
            &store,
            TEST_NAMESPACE,
            MACHINE_SET_NAME,
            PassOptions { dry_run: true },
            NOW,
        )
        .await
        .unwrap();

        assert!(matches!(
            outcome.actions.as_slice(),
            [MachineAction::Create { index: 0, .. }]
        ));
        assert!(store.created().is_empty());
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_inactive_set_only_reports_status() {
        let mut machines = healthy_machines();
        machines.remove(0);
        let store = FakeStore::new(machine_set().inactive().build(), machines, ready_nodes());

        let outcome = pass(&store, NOW).await.unwrap();
        assert!(outcome.actions.is_empty());
        assert!(store.created().is_empty());
        assert_eq!(store.status_writes(), 1);
        assert_eq!(outcome.status.unavailable_replicas, 1);
    }

    #[tokio::test]
    async fn test_rolling_update_replaces_and_then_deletes() {
        let template = aws_provider_spec().with_instance_type("m6i.2xlarge").build_raw();
        let store = FakeStore::new(
            machine_set().with_provider_spec(template).build(),
            healthy_machines(),
            ready_nodes(),
        );

        let first = pass(&store, NOW).await.unwrap();
        assert_eq!(first.status.updated_replicas, 0);
        assert!(is_condition_true(&first.status.conditions, CONDITION_TYPE_PROGRESSING));
        let created = store.created();
        assert_eq!(created.len(), 1);
        let replacement = created[0].name_any();
        assert!(replacement.ends_with("-0"));

        // Replacement joins the cluster
        {
            let mut state = store.state.lock().unwrap();
            let m = state
                .machines
                .iter_mut()
                .find(|m| m.name_any() == replacement)
                .unwrap();
            m.status = machine(0).with_node("master-0-new").build().status;
            state.nodes.push(node("master-0-new", true));
        }

        let second = pass(&store, LATER).await.unwrap();
        assert_eq!(second.status.updated_replicas, 1);
        assert_eq!(store.deleted(), vec!["cluster-x7k2p-master-0".to_string()]);
        assert_eq!(store.created().len(), 1);
    }

    #[tokio::test]
    async fn test_on_delete_leaves_outdated_machines() {
        let template = aws_provider_spec().with_instance_type("m6i.2xlarge").build_raw();
        let store = FakeStore::new(
            machine_set()
                .with_provider_spec(template)
                .with_strategy(RolloutStrategyType::OnDelete)
                .build(),
            healthy_machines(),
            ready_nodes(),
        );

        let outcome = pass(&store, NOW).await.unwrap();
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.status.updated_replicas, 0);
    }

    #[tokio::test]
    async fn test_invalid_template_payload_degrades_and_stops() {
        let set = machine_set()
            .with_failure_domains(aws_zones(&["us-east-1a"]))
            .with_provider_spec(openstack_provider_spec().build_raw())
            .build();
        let store = FakeStore::new(set, healthy_machines(), ready_nodes());

        let err = pass(&store, NOW).await.unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { platform: PlatformType::Aws, .. }));
        assert!(!err.is_retriable());
        assert!(store.created().is_empty());

        let status = store.stored_status().unwrap();
        let degraded = find_condition(&status.conditions, CONDITION_TYPE_DEGRADED).unwrap();
        assert_eq!(degraded.reason, REASON_INVALID_PROVIDER_SPEC);
        assert_eq!(status.ready_replicas, 3);
        assert_eq!(status.updated_replicas, 0);
    }

    #[tokio::test]
    async fn test_invalid_spec_is_not_acted_on() {
        let mut machines = healthy_machines();
        machines.remove(0);
        let store = FakeStore::new(machine_set().with_replicas(4).build(), machines, ready_nodes());

        let err = pass(&store, NOW).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
        assert_eq!(retry_delay(&err), Duration::from_secs(60));
        assert!(store.created().is_empty());
        assert_eq!(store.status_writes(), 1);

        let status = store.stored_status().unwrap();
        let degraded = find_condition(&status.conditions, CONDITION_TYPE_DEGRADED).unwrap();
        assert_eq!(degraded.status, CONDITION_STATUS_TRUE);
        assert_eq!(degraded.reason, REASON_INVALID_SPEC);
        assert!(degraded.message.contains("replicas"));

        // The same invalid spec on the next pass is a no-op for status
        assert!(pass(&store, LATER).await.is_err());
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_unowned_node_is_reported() {
        let mut nodes = ready_nodes();
        nodes.push(node("stray-master", true));
        let store = FakeStore::new(machine_set().build(), healthy_machines(), nodes);

        let outcome = pass(&store, NOW).await.unwrap();
        let degraded = find_condition(&outcome.status.conditions, CONDITION_TYPE_DEGRADED).unwrap();
        assert_eq!(degraded.reason, REASON_UNMANAGED_NODES);
        assert_eq!(outcome.status.replicas, 3);
    }

    #[tokio::test]
    async fn test_machines_outside_selector_are_ignored() {
        let mut machines = healthy_machines();
        let mut worker = machine(3).build();
        worker.metadata.labels = None;
        machines.push(worker);
        let store = FakeStore::new(machine_set().build(), machines, ready_nodes());

        let outcome = pass(&store, NOW).await.unwrap();
        assert_eq!(outcome.status.replicas, 3);
    }
}
