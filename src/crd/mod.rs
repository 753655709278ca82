//! # Custom Resource Definitions
//!
//! CRD types for the MinIO Resource Controller.
//!
//! Every kind lives in the `minio.mxcd.dev/v1alpha1` API group, is namespaced and
//! carries a status subresource whose common part is [`ResourceStatus`]. All kinds
//! except Alias and Endpoint embed a [`ConnectionSpec`] naming the server they
//! target.

mod alias;
mod bucket;
mod connection;
mod endpoint;
mod lifecycle_policy;
mod policy;
mod policy_attachment;
mod status;
mod user;

pub use alias::*;
pub use bucket::*;
pub use connection::*;
pub use endpoint::*;
pub use lifecycle_policy::*;
pub use policy::*;
pub use policy_attachment::*;
pub use status::*;
pub use user::*;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// Every CRD the controller serves, in installation order
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        Alias::crd(),
        Endpoint::crd(),
        Bucket::crd(),
        User::crd(),
        Policy::crd(),
        PolicyAttachment::crd(),
        LifecyclePolicy::crd(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_crds_share_group_and_have_status_subresource() {
        for crd in all_crds() {
            assert_eq!(crd.spec.group, crate::constants::API_GROUP);
            assert_eq!(crd.spec.scope, "Namespaced");
            let version = &crd.spec.versions[0];
            assert_eq!(version.name, "v1alpha1");
            assert!(version
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some());
        }
    }

    #[test]
    fn test_bucket_status_flattens_common_fields() {
        let status = BucketStatus {
            common: ResourceStatus {
                ready: true,
                observed_generation: Some(3),
                ..ResourceStatus::default()
            },
            bucket_name: Some("invoices".to_string()),
            ..BucketStatus::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["ready"], true);
        assert_eq!(json["observedGeneration"], 3);
        assert_eq!(json["bucketName"], "invoices");
    }

    #[test]
    fn test_user_spec_defaults_to_enabled() {
        let spec: UserSpec = serde_json::from_value(serde_json::json!({
            "connection": {"aliasRef": {"name": "primary"}},
            "username": "alice",
            "password": "hunter22"
        }))
        .unwrap();
        assert_eq!(spec.status, UserAccountStatus::Enabled);
        assert!(spec.policies.is_empty());
    }
}
