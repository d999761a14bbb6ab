//! Controller runner - builds the controller future for the SkiffApp slice
//!
//! The subscription list is explicit here: the controller watches SkiffApp
//! records plus the two managed sub-resource kinds (Deployment, Service).
//! Sub-resource events map back to the owning record's key through the owner
//! reference stamped by [`crate::ownership`], so a change to either
//! sub-resource re-triggers reconciliation of its record.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use skiff_common::crd::SkiffApp;

use crate::controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the SkiffApp controller future
pub fn build_app_controller(client: Client) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(Context::from_client(client.clone()));

    let apps: Api<SkiffApp> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client);

    tracing::info!("- SkiffApp controller");

    Box::pin(
        Controller::new(apps, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .owns(
                deployments,
                WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
            )
            .owns(
                services,
                WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
            )
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("SkiffApp")),
    )
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
