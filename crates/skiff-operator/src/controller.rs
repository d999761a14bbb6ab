//! SkiffApp controller implementation
//!
//! This module implements the reconciliation loop for SkiffApp records. It
//! follows the Kubernetes controller pattern: observe the current
//! sub-resources, compare against the record's spec, and issue the minimal
//! corrective writes. Every invocation is idempotent — a converged app
//! produces zero writes.
//!
//! Cluster access goes through the [`AppKubeClient`] trait so the loop can be
//! exercised against a mock in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use skiff_common::crd::{Condition, ConditionStatus, SkiffApp, SkiffAppStatus};
use skiff_common::{Error, FIELD_MANAGER};

use crate::endpoint;
use crate::ownership;
use crate::workload;

/// Requeue delay after creating the Deployment.
///
/// A freshly created workload has no observed status yet; comparing replica
/// counts or computing availability in the same pass would read absent data,
/// so the remaining steps run on the next invocation.
const REQUEUE_AFTER_WORKLOAD_CREATE: Duration = Duration::from_secs(5);

/// Backoff for retryable reconcile failures.
const RETRY_DELAY: Duration = Duration::from_secs(30);

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Trait abstracting Kubernetes client operations for SkiffApp
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppKubeClient: Send + Sync {
    /// Get a SkiffApp by name and namespace
    async fn get_app(&self, name: &str, namespace: &str) -> Result<Option<SkiffApp>, Error>;

    /// Get a managed Deployment by name and namespace
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error>;

    /// Replace a Deployment, carrying its resourceVersion for conflict detection
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error>;

    /// Get a managed Service by name and namespace
    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), Error>;

    /// Replace a Service, carrying its resourceVersion for conflict detection
    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<(), Error>;

    /// Patch the status subresource of a SkiffApp
    async fn patch_app_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SkiffAppStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct AppKubeClientImpl {
    client: Client,
}

impl AppKubeClientImpl {
    /// Create a new AppKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AppKubeClient for AppKubeClientImpl {
    async fn get_app(&self, name: &str, namespace: &str) -> Result<Option<SkiffApp>, Error> {
        let api: Api<SkiffApp> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), deployment).await?;
        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&deployment.name_any(), &PostParams::default(), deployment)
            .await?;
        Ok(())
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>, Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), service).await?;
        Ok(())
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<(), Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&service.name_any(), &PostParams::default(), service)
            .await?;
        Ok(())
    }

    async fn patch_app_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SkiffAppStatus,
    ) -> Result<(), Error> {
        let api: Api<SkiffApp> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

// =============================================================================
// Controller context
// =============================================================================

/// Controller context shared across all reconciliation calls
pub struct Context {
    /// Kubernetes client for API operations
    pub kube: Arc<dyn AppKubeClient>,
}

impl Context {
    /// Create a new Context with the given client
    pub fn new(kube: Arc<dyn AppKubeClient>) -> Self {
        Self { kube }
    }

    /// Create a new Context from a Kubernetes client
    pub fn from_client(client: Client) -> Self {
        Self {
            kube: Arc::new(AppKubeClientImpl::new(client)),
        }
    }
}

// =============================================================================
// SkiffApp reconciliation
// =============================================================================

/// Reconcile a SkiffApp record
///
/// Steps, in order, each an early-return point:
///
/// 1. Validate the spec; invalid specs are reported on the status and wait
///    for a user edit.
/// 2. Ensure the Deployment exists. Creation requeues — every later step
///    depends on the workload's observed state.
/// 3. Correct replica drift with a single-field update; no write when the
///    counts already match.
/// 4. Ensure the Service exists; correct port drift. Its absence never blocks
///    status computation, so no requeue.
/// 5. Recompute and persist status from the workload observation, skipping
///    the write when nothing changed.
#[instrument(skip(app, ctx), fields(app = %app.name_any()))]
pub async fn reconcile(app: Arc<SkiffApp>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = ownership::subresource_name(&app);
    let namespace = app
        .namespace()
        .ok_or_else(|| Error::validation_for(name.clone(), "SkiffApp is missing a namespace"))?;

    if let Err(e) = app.spec.validate() {
        warn!(error = %e, "spec validation failed");
        report_invalid_spec(&ctx, &name, &namespace, &e.to_string()).await?;
        // Don't requeue for validation errors - they require spec changes
        return Ok(Action::await_change());
    }

    let deployment = match ctx.kube.get_deployment(&name, &namespace).await? {
        None => {
            let desired = workload::build_deployment(&app)?;
            info!(deployment = %name, "creating Deployment");
            ctx.kube.create_deployment(&namespace, &desired).await?;
            return Ok(Action::requeue(REQUEUE_AFTER_WORKLOAD_CREATE));
        }
        Some(deployment) => deployment,
    };

    let desired_replicas = workload::desired_replicas(&app)?;
    let observed_replicas = deployment.spec.as_ref().and_then(|s| s.replicas);
    if observed_replicas != Some(desired_replicas) {
        let mut updated = deployment.clone();
        if let Some(spec) = updated.spec.as_mut() {
            spec.replicas = Some(desired_replicas);
        }
        info!(
            from = ?observed_replicas,
            to = desired_replicas,
            "correcting replica drift"
        );
        ctx.kube.replace_deployment(&namespace, &updated).await?;
    }

    match ctx.kube.get_service(&name, &namespace).await? {
        None => {
            let desired = endpoint::build_service(&app)?;
            info!(service = %name, "creating Service");
            ctx.kube.create_service(&namespace, &desired).await?;
        }
        Some(existing) => {
            if endpoint::service_needs_update(&existing, &app) {
                let mut desired = endpoint::build_service(&app)?;
                desired.metadata.resource_version = existing.metadata.resource_version.clone();
                info!(service = %name, port = app.spec.port, "correcting Service port drift");
                ctx.kube.replace_service(&namespace, &desired).await?;
            }
        }
    }

    update_app_status(&app, &deployment, &ctx, &name, &namespace).await?;

    Ok(Action::await_change())
}

/// Error policy for the SkiffApp controller
///
/// Called when reconciliation fails. Retryable errors (transient I/O,
/// conflicts) are requeued with backoff; non-retryable errors (validation)
/// wait for a spec change.
pub fn error_policy(app: Arc<SkiffApp>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        app = %app.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRY_DELAY)
    } else {
        Action::await_change()
    }
}

// =============================================================================
// Status update helpers
// =============================================================================

/// Recompute and persist status from the freshest workload observation.
async fn update_app_status(
    app: &SkiffApp,
    deployment: &Deployment,
    ctx: &Context,
    name: &str,
    namespace: &str,
) -> Result<(), Error> {
    let available = deployment
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    let endpoint_address = endpoint::endpoint_address(name, app.spec.port);

    apply_status_update(ctx, name, namespace, |status| {
        status.available_replicas = available;
        status.service_endpoint = Some(endpoint_address);
        status.upsert_condition(Condition::new(
            "Available",
            ConditionStatus::True,
            "DeploymentReady",
            format!("Deployment has {available} available replicas"),
        ));
    })
    .await
}

/// Surface a spec validation failure on the record's status.
async fn report_invalid_spec(
    ctx: &Context,
    name: &str,
    namespace: &str,
    message: &str,
) -> Result<(), Error> {
    let message = message.to_string();
    apply_status_update(ctx, name, namespace, move |status| {
        status.upsert_condition(Condition::new(
            "Available",
            ConditionStatus::False,
            "InvalidSpec",
            message,
        ));
    })
    .await
}

/// Fetch-then-write status mutation.
///
/// Re-reads the record immediately before writing so the patch applies to the
/// freshest copy, skips the write entirely when the resulting status equals
/// the stored one (no self-triggering watch events, no resource-version
/// churn), and treats a record deleted mid-invocation as a successful no-op.
async fn apply_status_update(
    ctx: &Context,
    name: &str,
    namespace: &str,
    update: impl FnOnce(&mut SkiffAppStatus),
) -> Result<(), Error> {
    let Some(latest) = ctx.kube.get_app(name, namespace).await? else {
        debug!("record deleted while reconciling, skipping status update");
        return Ok(());
    };

    let mut status = latest.status.clone().unwrap_or_default();
    update(&mut status);

    if latest.status.as_ref() == Some(&status) {
        debug!("status unchanged, skipping update");
        return Ok(());
    }

    match ctx.kube.patch_app_status(name, namespace, &status).await {
        Err(e) if e.is_not_found() => {
            debug!("record deleted during status update");
            Ok(())
        }
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================
