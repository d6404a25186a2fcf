//! Canonical resource identifiers.
//!
//! An id mirrors the REST path of an object, so the same logical object gets
//! the same id whether it was read from a file or from the cluster:
//!
//! - namespaced: `group/version/namespaces/<namespace>/<plural>/<name>`
//! - cluster-scoped: `group/version/<plural>/<name>`
//!
//! The leading `group/` is omitted for the core API group.

use crate::catalog::TypeDescriptor;

/// Computes the canonical id of an instance of `descriptor`.
///
/// `namespace` is ignored for cluster-scoped types.
pub fn identity(descriptor: &TypeDescriptor, namespace: &str, name: &str) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(7);
    if !descriptor.group.is_empty() {
        segments.push(&descriptor.group);
    }
    segments.push(&descriptor.version);
    if descriptor.namespaced {
        segments.push("namespaces");
        segments.push(namespace);
    }
    segments.push(&descriptor.plural);
    segments.push(name);

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(group: &str, version: &str, plural: &str, namespaced: bool) -> TypeDescriptor {
        TypeDescriptor {
            group: group.to_string(),
            version: version.to_string(),
            kind: String::new(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    #[test]
    fn test_namespaced_id() {
        let deployments = descriptor("apps", "v1", "deployments", true);
        assert_eq!(
            identity(&deployments, "ns1", "web"),
            "apps/v1/namespaces/ns1/deployments/web"
        );
    }

    #[test]
    fn test_namespaced_core_group_id() {
        let deployments = descriptor("", "v1", "deployments", true);
        assert_eq!(
            identity(&deployments, "ns1", "web"),
            "v1/namespaces/ns1/deployments/web"
        );
    }

    #[test]
    fn test_cluster_scoped_id() {
        let namespaces = descriptor("", "v1", "namespaces", false);
        assert_eq!(identity(&namespaces, "", "default"), "v1/namespaces/default");
        assert_eq!(
            identity(&namespaces, "ignored", "default"),
            "v1/namespaces/default"
        );
    }

    #[test]
    fn test_identity_is_deterministic() {
        let roles = descriptor("rbac.authorization.k8s.io", "v1", "roles", true);
        let first = identity(&roles, "kube-system", "reader");
        let second = identity(&roles, "kube-system", "reader");
        assert_eq!(first, second);
        assert_ne!(first, identity(&roles, "default", "reader"));
    }
}
