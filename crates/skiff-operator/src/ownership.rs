//! Ownership linking between a SkiffApp and its managed sub-resources
//!
//! Two policies live here so they stay explicit and swappable:
//!
//! - **Key derivation**: every sub-resource (Deployment, Service) reuses the
//!   record's own name in the record's namespace, a 1:1 convention. Nothing
//!   else in the codebase is allowed to assume this; it all goes through
//!   [`subresource_name`].
//! - **Back-references**: every created sub-resource carries an owner
//!   reference (kind + name + UID) to the record that produced it. The
//!   operator never deletes sub-resources itself; deleting the record
//!   cascade-deletes them through the cluster's garbage collector, and the
//!   controller runtime uses the same reference to map sub-resource events
//!   back to the owning record's key.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use skiff_common::crd::SkiffApp;
use skiff_common::Error;

/// Derive the name of both managed sub-resources for an app.
pub fn subresource_name(app: &SkiffApp) -> String {
    app.name_any()
}

/// Build the controller owner reference stamped onto every sub-resource.
///
/// Fails with an internal error when the record has no UID yet (it has not
/// been persisted by the API server), since an owner reference without a UID
/// would never match for garbage collection.
pub fn controller_ref(app: &SkiffApp) -> Result<OwnerReference, Error> {
    let uid = app
        .uid()
        .ok_or_else(|| Error::internal_with_context("ownership", "SkiffApp has no UID"))?;

    Ok(OwnerReference {
        api_version: SkiffApp::api_version(&()).into_owned(),
        kind: SkiffApp::kind(&()).into_owned(),
        name: app.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use skiff_common::crd::SkiffAppSpec;

    fn app_named(name: &str, uid: Option<&str>) -> SkiffApp {
        SkiffApp {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: uid.map(String::from),
                ..Default::default()
            },
            spec: SkiffAppSpec {
                replicas: 1,
                image: "nginx:1.25".to_string(),
                port: 8080,
                env: vec![],
                resources: Default::default(),
            },
            status: None,
        }
    }

    #[test]
    fn subresources_share_the_record_name() {
        let app = app_named("web", Some("abc-123"));
        assert_eq!(subresource_name(&app), "web");
    }

    #[test]
    fn controller_ref_points_back_at_the_record() {
        let app = app_named("web", Some("abc-123"));
        let owner = controller_ref(&app).unwrap();
        assert_eq!(owner.api_version, "skiff.dev/v1alpha1");
        assert_eq!(owner.kind, "SkiffApp");
        assert_eq!(owner.name, "web");
        assert_eq!(owner.uid, "abc-123");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
    }

    #[test]
    fn controller_ref_requires_a_uid() {
        let app = app_named("web", None);
        let err = controller_ref(&app).unwrap_err();
        assert_eq!(err.context(), Some("ownership"));
    }
}
