//! Service builder — derives the stable network endpoint from a SkiffApp
//!
//! The Service selects the workload's pods by the shared app labels and
//! exposes the declared port cluster-internally (ClusterIP). The advertised
//! endpoint address is derived from the record, not read back from the
//! Service, so status reporting works even before the Service exists.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use skiff_common::crd::SkiffApp;
use skiff_common::Error;

use crate::ownership;
use crate::workload::app_labels;

/// The advertised endpoint address for an app: `name:port`.
pub fn endpoint_address(name: &str, port: u16) -> String {
    format!("{name}:{port}")
}

/// Build the desired Service for an app.
///
/// Selector equals the workload labels; a single TCP port with port and
/// targetPort both set to the declared port; cluster-internal only.
pub fn build_service(app: &SkiffApp) -> Result<Service, Error> {
    let name = ownership::subresource_name(app);
    let labels = app_labels(&name);
    let port = i32::from(app.spec.port);

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![ownership::controller_ref(app)?]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Check whether an existing Service still exposes the declared port.
///
/// Replica edits never touch the Service; only a port change does.
pub fn service_needs_update(existing: &Service, app: &SkiffApp) -> bool {
    let declared = i32::from(app.spec.port);
    let first_port = existing
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .and_then(|p| p.first());

    match first_port {
        Some(p) => {
            p.port != declared
                || p.target_port != Some(IntOrString::Int(declared))
        }
        None => true,
    }
}
