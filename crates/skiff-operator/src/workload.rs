//! Deployment builder — derives the managed workload from a SkiffApp record
//!
//! Pure construction: no cluster I/O happens here. The reconciler decides
//! when to create or correct the built object.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use skiff_common::crd::{ResourceList, SkiffApp};
use skiff_common::{Error, LABEL_APP, LABEL_MANAGED_BY, MANAGED_BY_SKIFF};

use crate::ownership;

/// Labels assigned to the Deployment, its pods, and the selector.
///
/// The Service selector reuses these, so the endpoint always addresses
/// exactly the pods this workload runs.
pub fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP.to_string(), name.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_SKIFF.to_string()),
    ])
}

/// The replica count as the API server's integer type.
pub fn desired_replicas(app: &SkiffApp) -> Result<i32, Error> {
    i32::try_from(app.spec.replicas).map_err(|_| {
        Error::validation_for(
            app.name_any(),
            format!("replicas {} exceeds the supported maximum", app.spec.replicas),
        )
    })
}

/// Build the desired Deployment for an app.
///
/// - replicas copied verbatim from the spec
/// - a single container, named after the record, running the declared image
/// - the declared port exposed as the container's only port
/// - env entries copied in order, duplicates preserved
/// - resource requests/limits only for quantities actually declared
pub fn build_deployment(app: &SkiffApp) -> Result<Deployment, Error> {
    let name = ownership::subresource_name(app);
    let labels = app_labels(&name);

    let env: Vec<EnvVar> = app
        .spec
        .env
        .iter()
        .map(|e| EnvVar {
            name: e.name.clone(),
            value: Some(e.value.clone()),
            value_from: None,
        })
        .collect();

    let container = Container {
        name: name.clone(),
        image: Some(app.spec.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: i32::from(app.spec.port),
            ..Default::default()
        }]),
        env: (!env.is_empty()).then_some(env),
        resources: resource_requirements(app),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![ownership::controller_ref(app)?]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(desired_replicas(app)?),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Build the container resource requirements, or nothing at all.
///
/// A quantity that is unset (or an empty string) is not declared — it must be
/// absent from the built workload, not rendered as a zero request.
fn resource_requirements(app: &SkiffApp) -> Option<ResourceRequirements> {
    let requests = quantity_map(app.spec.resources.requests.as_ref());
    let limits = quantity_map(app.spec.resources.limits.as_ref());

    if requests.is_none() && limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    })
}

fn quantity_map(list: Option<&ResourceList>) -> Option<BTreeMap<String, Quantity>> {
    let list = list?;
    let mut map = BTreeMap::new();
    if let Some(cpu) = list.cpu_quantity() {
        map.insert("cpu".to_string(), Quantity(cpu.to_string()));
    }
    if let Some(memory) = list.memory_quantity() {
        map.insert("memory".to_string(), Quantity(memory.to_string()));
    }
    (!map.is_empty()).then_some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_common::crd::{EnvVar as AppEnvVar, ResourceSpec, SkiffAppSpec};

    fn sample_app() -> SkiffApp {
        SkiffApp {
            metadata: ObjectMeta {
                name: Some("svc1".to_string()),
                namespace: Some("default".to_string()),
                uid: Some("uid-1".to_string()),
                ..Default::default()
            },
            spec: SkiffAppSpec {
                replicas: 2,
                image: "nginx:1.25".to_string(),
                port: 8080,
                env: vec![],
                resources: ResourceSpec::default(),
            },
            status: None,
        }
    }

    fn containers(deployment: &Deployment) -> &Vec<Container> {
        &deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers
    }

    #[test]
    fn deployment_mirrors_the_spec() {
        let deployment = build_deployment(&sample_app()).unwrap();

        assert_eq!(deployment.metadata.name.as_deref(), Some("svc1"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("default"));

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(2));

        let container = &containers(&deployment)[0];
        assert_eq!(container.name, "svc1");
        assert_eq!(container.image.as_deref(), Some("nginx:1.25"));
        assert_eq!(
            container.ports.as_ref().unwrap()[0].container_port,
            8080
        );
    }

    #[test]
    fn selector_matches_pod_labels() {
        let deployment = build_deployment(&sample_app()).unwrap();
        let spec = deployment.spec.as_ref().unwrap();
        let pod_labels = spec.template.metadata.as_ref().unwrap().labels.clone();
        assert_eq!(spec.selector.match_labels, pod_labels);
        assert_eq!(
            pod_labels.unwrap().get(LABEL_APP).map(String::as_str),
            Some("svc1")
        );
    }

    #[test]
    fn deployment_is_owned_by_the_record() {
        let deployment = build_deployment(&sample_app()).unwrap();
        let owners = deployment.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "SkiffApp");
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn env_preserves_order_and_duplicates() {
        let mut app = sample_app();
        app.spec.env = vec![
            AppEnvVar {
                name: "MODE".to_string(),
                value: "a".to_string(),
            },
            AppEnvVar {
                name: "LOG".to_string(),
                value: "debug".to_string(),
            },
            AppEnvVar {
                name: "MODE".to_string(),
                value: "b".to_string(),
            },
        ];

        let deployment = build_deployment(&app).unwrap();
        let env = containers(&deployment)[0].env.as_ref().unwrap();
        let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["MODE", "LOG", "MODE"]);
        assert_eq!(env[0].value.as_deref(), Some("a"));
        assert_eq!(env[2].value.as_deref(), Some("b"));
    }

    #[test]
    fn undeclared_resources_are_omitted_entirely() {
        let mut app = sample_app();
        app.spec.resources = ResourceSpec {
            requests: Some(ResourceList {
                cpu: Some(String::new()),
                memory: Some(String::new()),
            }),
            limits: None,
        };

        let deployment = build_deployment(&app).unwrap();
        assert!(containers(&deployment)[0].resources.is_none());
    }

    #[test]
    fn partial_requests_carry_only_declared_quantities() {
        let mut app = sample_app();
        app.spec.resources = ResourceSpec {
            requests: Some(ResourceList {
                cpu: Some("500m".to_string()),
                memory: None,
            }),
            limits: None,
        };

        let deployment = build_deployment(&app).unwrap();
        let resources = containers(&deployment)[0].resources.as_ref().unwrap();
        let requests = resources.requests.as_ref().unwrap();
        assert_eq!(requests.get("cpu"), Some(&Quantity("500m".to_string())));
        assert!(!requests.contains_key("memory"));
        assert!(resources.limits.is_none());
    }

    #[test]
    fn limits_propagate_alongside_requests() {
        let mut app = sample_app();
        app.spec.resources = ResourceSpec {
            requests: Some(ResourceList {
                cpu: Some("250m".to_string()),
                memory: Some("64Mi".to_string()),
            }),
            limits: Some(ResourceList {
                cpu: Some("1".to_string()),
                memory: Some("256Mi".to_string()),
            }),
        };

        let deployment = build_deployment(&app).unwrap();
        let resources = containers(&deployment)[0].resources.as_ref().unwrap();
        let limits = resources.limits.as_ref().unwrap();
        assert_eq!(limits.get("cpu"), Some(&Quantity("1".to_string())));
        assert_eq!(limits.get("memory"), Some(&Quantity("256Mi".to_string())));
    }

    #[test]
    fn no_env_list_is_emitted_for_an_empty_spec() {
        let deployment = build_deployment(&sample_app()).unwrap();
        assert!(containers(&deployment)[0].env.is_none());
    }
}
