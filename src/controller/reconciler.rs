//! Main reconciler for ControlPlaneMachineSet resources
//!
//! Every pass is level-triggered: it fetches the set, observes machines and
//! nodes, computes the status from scratch, commits it only when it changed,
//! and then drives corrective machine actions. Nothing before the status
//! commit has an observable effect, so an abandoned pass needs no cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        reflector::ObjectRef,
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{
    ControlPlaneMachineSet, ControlPlaneMachineSetSpec, ControlPlaneMachineSetStatus, Machine,
};
use crate::error::{Error, Result};
use crate::labels::CONTROL_PLANE_NODE_LABEL;
use crate::providerconfig::{FailureDomains, ProviderConfig};

use super::actions::{apply_actions, plan_actions, MachineAction};
use super::machine_info::build_machine_infos;
use super::status::{calculate_status, status_needs_update, StatusInput};
use super::store::{ClusterStore, KubeStore};

/// The only ControlPlaneMachineSet name a cluster may have
pub const MACHINE_SET_NAME: &str = "cluster";

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub operator_namespace: String,
    /// Compute and commit status, but never create or delete machines
    pub dry_run: bool,
    pub is_leader: Arc<AtomicBool>,
}

/// Knobs for a single pass
#[derive(Clone, Copy, Debug, Default)]
pub struct PassOptions {
    pub dry_run: bool,
}

/// What a pass computed and did
#[derive(Clone, Debug)]
pub struct PassOutcome {
    pub status: ControlPlaneMachineSetStatus,
    /// A status write was issued
    pub status_updated: bool,
    /// Planned machine actions; applied unless the set is inactive or dry-run
    pub actions: Vec<MachineAction>,
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let namespace = state.operator_namespace.clone();
    let machine_sets: Api<ControlPlaneMachineSet> = Api::namespaced(client.clone(), &namespace);

    info!("Starting ControlPlaneMachineSet controller in {}", namespace);

    // Verify CRD exists
    match machine_sets.list(&Default::default()).await {
        Ok(_) => info!("ControlPlaneMachineSet CRD is available"),
        Err(e) => {
            error!(
                "ControlPlaneMachineSet CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "ControlPlaneMachineSet CRD not installed".to_string(),
            ));
        }
    }

    let machine_namespace = namespace.clone();
    let node_namespace = namespace.clone();

    Controller::new(machine_sets, Config::default())
        // Every machine or control plane node event concerns the singleton set
        .watches(
            Api::<Machine>::namespaced(client.clone(), &namespace),
            Config::default(),
            move |_: Machine| Some(singleton_ref(&machine_namespace)),
        )
        .watches(
            Api::<Node>::all(client.clone()),
            Config::default().labels(CONTROL_PLANE_NODE_LABEL),
            move |_: Node| Some(singleton_ref(&node_namespace)),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

fn singleton_ref(namespace: &str) -> ObjectRef<ControlPlaneMachineSet> {
    ObjectRef::new(MACHINE_SET_NAME).within(namespace)
}

#[instrument(skip(set, ctx), fields(name = %set.name_any(), namespace = set.namespace()))]
async fn reconcile(set: Arc<ControlPlaneMachineSet>, ctx: Arc<ControllerState>) -> Result<Action> {
    if !ctx.is_leader.load(Ordering::Relaxed) {
        debug!("Not the leader, skipping reconciliation");
        return Ok(Action::requeue(Duration::from_secs(15)));
    }

    let name = set.name_any();
    if name != MACHINE_SET_NAME {
        warn!(
            "Ignoring ControlPlaneMachineSet {}: only {} is reconciled",
            name, MACHINE_SET_NAME
        );
        return Ok(Action::await_change());
    }

    let namespace = set
        .namespace()
        .unwrap_or_else(|| ctx.operator_namespace.clone());
    let store = KubeStore::new(ctx.client.clone());
    let options = PassOptions {
        dry_run: ctx.dry_run,
    };

    let outcome = reconcile_pass(&store, &namespace, &name, options, &Utc::now().to_rfc3339()).await?;
    Ok(Action::requeue(requeue_delay(&outcome)))
}

/// Run one fetch, observe, compute, commit and act cycle.
///
/// `now` stamps conditions whose status changes in this pass.
pub async fn reconcile_pass<S: ClusterStore + ?Sized>(
    store: &S,
    namespace: &str,
    name: &str,
    options: PassOptions,
    now: &str,
) -> Result<PassOutcome> {
    let set = store.get_machine_set(namespace, name).await?;
    let platform = set.spec.platform();
    let template_config = decode_template(&set.spec);

    let machines = store.list_machines(namespace, &set.spec.selector).await?;
    let nodes = store.list_control_plane_nodes().await?;
    debug!(
        "Observed {} machine(s) and {} control plane node(s)",
        machines.len(),
        nodes.len()
    );

    let machine_infos =
        build_machine_infos(platform, template_config.as_ref().ok(), &machines, &nodes);

    let spec_error = set.spec.validate().err().map(|errors| {
        errors
            .iter()
            .map(|e| format!("{}: {} ({})", e.field, e.message, e.how_to_fix))
            .collect::<Vec<_>>()
            .join("; ")
    });
    let template_error = template_config.as_ref().err().map(ToString::to_string);
    let previous_conditions = set
        .status
        .as_ref()
        .map(|status| status.conditions.as_slice())
        .unwrap_or_default();
    let status = calculate_status(StatusInput {
        desired_replicas: set.spec.replicas,
        generation: set.metadata.generation,
        machine_infos: &machine_infos,
        spec_error: spec_error.as_deref(),
        template_error: template_error.as_deref(),
        previous_conditions,
        now,
    });

    let status_updated = if status_needs_update(set.status.as_ref(), &status) {
        info!("Updating control plane machine set status");
        store.patch_status(&set, &status).await?;
        true
    } else {
        info!("No update to control plane machine set status required");
        false
    };

    let mut outcome = PassOutcome {
        status,
        status_updated,
        actions: Vec::new(),
    };

    if !set.is_active() {
        debug!("ControlPlaneMachineSet is inactive, not acting on machines");
        return Ok(outcome);
    }

    if let Some(message) = spec_error {
        warn!("Not acting on invalid ControlPlaneMachineSet: {}", message);
        return Err(Error::ValidationError(message));
    }

    let template_config = template_config?;
    let template = set
        .spec
        .template
        .machine
        .as_ref()
        .ok_or_else(|| Error::ValidationError("machine template is required".to_string()))?;
    let failure_domains = template
        .failure_domains
        .as_ref()
        .map(FailureDomains::to_failure_domains)
        .unwrap_or_default();

    outcome.actions = plan_actions(
        set.spec.strategy.type_,
        set.spec.replicas,
        &template_config,
        &failure_domains,
        &machine_infos,
    )?;

    if outcome.actions.is_empty() {
        debug!("No machine actions required");
    } else if options.dry_run {
        info!(
            "Dry run: skipping {} machine action(s): {:?}",
            outcome.actions.len(),
            outcome.actions
        );
    } else {
        apply_actions(store, &set, template, &outcome.actions).await?;
    }

    Ok(outcome)
}

/// Decode the template's provider payload for the set's platform
fn decode_template(spec: &ControlPlaneMachineSetSpec) -> Result<ProviderConfig> {
    let raw = spec
        .template
        .machine
        .as_ref()
        .and_then(|template| template.spec.provider_spec.value.as_ref())
        .ok_or_else(|| Error::ConfigError("template has no provider spec".to_string()))?;
    let platform = spec.platform().ok_or_else(|| {
        Error::ConfigError("cannot determine the platform of the template provider spec".to_string())
    })?;
    ProviderConfig::parse(raw, platform)
}

/// Requeue delay after a successful pass
pub fn requeue_delay(outcome: &PassOutcome) -> Duration {
    if outcome.status.unavailable_replicas == 0 && outcome.actions.is_empty() {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(15)
    }
}

/// Requeue delay after a failed pass
pub fn retry_delay(error: &Error) -> Duration {
    if error.is_conflict() {
        Duration::from_secs(1)
    } else if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    }
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(set: Arc<ControlPlaneMachineSet>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    if error.is_conflict() {
        debug!("Conflict reconciling {}, retrying: {}", set.name_any(), error);
    } else {
        error!("Reconciliation error for {}: {:?}", set.name_any(), error);
    }
    Action::requeue(retry_delay(error))
}
