//! Type catalog: resolves configured kind names into concrete type
//! descriptors against the API server's discovery information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::resource::{GroupVersion, GroupVersionKind};

/// A type served by the API server, as listed by discovery.
///
/// `group` and `version` are usually empty and inherited from the
/// enclosing [`ApiResourceList`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub kind: String,
    /// Plural resource name, e.g. `deployments`.
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub namespaced: bool,
}

/// All types served for one group/version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

/// Source of schema discovery information. Queried once per catalog.
#[async_trait]
pub trait SchemaDiscovery: Send + Sync {
    async fn served_types(&self) -> Result<Vec<ApiResourceList>, CatalogError>;
}

/// Static discovery, for offline use and tests.
#[async_trait]
impl SchemaDiscovery for Vec<ApiResourceList> {
    async fn served_types(&self) -> Result<Vec<ApiResourceList>, CatalogError> {
        Ok(self.clone())
    }
}

/// A resolved type: everything needed to address its instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl TypeDescriptor {
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }

    fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.group == gvk.group && self.version == gvk.version && self.kind == gvk.kind
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group_version(), self.plural)
    }
}

/// The set of resolved types, read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    descriptors: Vec<TypeDescriptor>,
}

impl TypeCatalog {
    /// Queries `discovery` and resolves every configured kind name.
    ///
    /// Fails with [`CatalogError::TypeNotAvailable`] on the first configured
    /// name that the server does not serve.
    pub async fn discover<S: AsRef<str>>(
        configured: &[S],
        discovery: &dyn SchemaDiscovery,
    ) -> Result<Self, CatalogError> {
        let lists = discovery.served_types().await?;
        Self::resolve(configured, &lists)
    }

    /// Resolves configured kind names against already discovered listings.
    pub fn resolve<S: AsRef<str>>(
        configured: &[S],
        lists: &[ApiResourceList],
    ) -> Result<Self, CatalogError> {
        let names: Vec<&str> = configured.iter().map(AsRef::as_ref).collect();
        log::info!("Configured types: {:?}", names);

        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            let descriptor = find_served(name, lists)?.ok_or_else(|| {
                CatalogError::TypeNotAvailable {
                    kind: name.to_string(),
                }
            })?;

            log::info!(
                "Will monitor type: group={:?} version={} kind={} plural={} namespaced={}",
                descriptor.group,
                descriptor.version,
                descriptor.kind,
                descriptor.plural,
                descriptor.namespaced
            );
            descriptors.push(descriptor);
        }

        Ok(Self { descriptors })
    }

    /// Builds a catalog from descriptors that are already resolved.
    pub fn from_descriptors(descriptors: Vec<TypeDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[TypeDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Looks up the descriptor for an exact group, version and kind.
    pub fn descriptor_for(&self, gvk: &GroupVersionKind) -> Result<&TypeDescriptor, CatalogError> {
        self.descriptors
            .iter()
            .find(|d| d.matches(gvk))
            .ok_or_else(|| CatalogError::TypeUnknown {
                group: gvk.group.clone(),
                version: gvk.version.clone(),
                kind: gvk.kind.clone(),
            })
    }

    pub fn is_namespaced(&self, gvk: &GroupVersionKind) -> Result<bool, CatalogError> {
        Ok(self.descriptor_for(gvk)?.namespaced)
    }
}

/// Finds the first served type whose kind matches `name` case-insensitively.
fn find_served(
    name: &str,
    lists: &[ApiResourceList],
) -> Result<Option<TypeDescriptor>, CatalogError> {
    for list in lists {
        for served in &list.resources {
            if !served.kind.eq_ignore_ascii_case(name) {
                continue;
            }

            let listed = GroupVersion::parse(&list.group_version)?;
            let group = if served.group.is_empty() {
                listed.group
            } else {
                served.group.clone()
            };
            let version = if served.version.is_empty() {
                listed.version
            } else {
                served.version.clone()
            };

            return Ok(Some(TypeDescriptor {
                group,
                version,
                kind: served.kind.clone(),
                plural: served.name.clone(),
                namespaced: served.namespaced,
            }));
        }
    }

    Ok(None)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn served(kind: &str, name: &str, namespaced: bool) -> ApiResource {
        ApiResource {
            kind: kind.to_string(),
            name: name.to_string(),
            namespaced,
            ..Default::default()
        }
    }

    fn discovered() -> Vec<ApiResourceList> {
        vec![
            ApiResourceList {
                group_version: "v1".to_string(),
                resources: vec![
                    served("Namespace", "namespaces", false),
                    served("ConfigMap", "configmaps", true),
                ],
            },
            ApiResourceList {
                group_version: "apps/v1".to_string(),
                resources: vec![served("Deployment", "deployments", true)],
            },
        ]
    }

    #[tokio::test]
    async fn test_discover_resolves_configured_kinds() {
        let catalog = TypeCatalog::discover(&["namespace", "Deployment"], &discovered())
            .await
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.descriptors()[0],
            TypeDescriptor {
                group: String::new(),
                version: "v1".to_string(),
                kind: "Namespace".to_string(),
                plural: "namespaces".to_string(),
                namespaced: false,
            }
        );
        assert_eq!(catalog.descriptors()[1].group, "apps");
        assert_eq!(catalog.descriptors()[1].plural, "deployments");
    }

    #[test]
    fn test_missing_kind_fails_whole_catalog() {
        let err = TypeCatalog::resolve(&["Deployment", "Widget"], &discovered()).unwrap_err();
        assert_eq!(
            err,
            CatalogError::TypeNotAvailable {
                kind: "Widget".to_string()
            }
        );
    }

    #[test]
    fn test_served_group_and_version_override_listing() {
        let lists = vec![ApiResourceList {
            group_version: "extensions/v1beta1".to_string(),
            resources: vec![ApiResource {
                kind: "Ingress".to_string(),
                name: "ingresses".to_string(),
                group: "networking.k8s.io".to_string(),
                version: "v1".to_string(),
                namespaced: true,
            }],
        }];

        let catalog = TypeCatalog::resolve(&["Ingress"], &lists).unwrap();
        let descriptor = &catalog.descriptors()[0];
        assert_eq!(descriptor.group, "networking.k8s.io");
        assert_eq!(descriptor.version, "v1");
    }

    #[test]
    fn test_first_match_wins() {
        let mut lists = discovered();
        lists.push(ApiResourceList {
            group_version: "apps/v1beta2".to_string(),
            resources: vec![served("Deployment", "deployments", true)],
        });

        let catalog = TypeCatalog::resolve(&["Deployment"], &lists).unwrap();
        assert_eq!(catalog.descriptors()[0].version, "v1");
    }

    #[test]
    fn test_descriptor_lookup() {
        let catalog = TypeCatalog::resolve(&["Deployment"], &discovered()).unwrap();

        let gvk = GroupVersionKind::new("apps", "v1", "Deployment");
        assert!(catalog.is_namespaced(&gvk).unwrap());

        let missing = GroupVersionKind::new("apps", "v1beta1", "Deployment");
        assert!(matches!(
            catalog.descriptor_for(&missing),
            Err(CatalogError::TypeUnknown { .. })
        ));
    }

    #[test]
    fn test_descriptor_display() {
        let catalog = TypeCatalog::resolve(&["Deployment", "Namespace"], &discovered()).unwrap();
        assert_eq!(catalog.descriptors()[0].to_string(), "apps/v1/deployments");
        assert_eq!(catalog.descriptors()[1].to_string(), "v1/namespaces");
    }
}
