//! Conversion of raw objects into repository resources.

use std::sync::Arc;

use crate::catalog::{TypeCatalog, TypeDescriptor};
use crate::error::ConversionError;
use crate::identity::identity;
use crate::resource::{RawObject, Resource};

/// Namespace assumed for namespaced objects that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Turns raw objects into [`Resource`]s.
pub trait ObjectConverter: Send + Sync {
    /// Converts an object, resolving its type from its own `apiVersion` and
    /// `kind`.
    fn convert(&self, object: &RawObject) -> Result<Resource, ConversionError>;

    /// Converts an object whose type is already known, e.g. because it came
    /// from a stream subscribed to `descriptor`.
    fn convert_as(
        &self,
        descriptor: &TypeDescriptor,
        object: &RawObject,
    ) -> Result<Resource, ConversionError>;
}

/// Converter backed by a [`TypeCatalog`].
#[derive(Debug, Clone)]
pub struct ResourceConverter {
    catalog: Arc<TypeCatalog>,
}

impl ResourceConverter {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Returns the id an object would be stored under.
    pub fn id_for(&self, object: &RawObject) -> Result<String, ConversionError> {
        let gvk = object.group_version_kind()?;
        let descriptor = self.catalog.descriptor_for(&gvk)?;
        Ok(id_as(descriptor, object))
    }
}

impl ObjectConverter for ResourceConverter {
    fn convert(&self, object: &RawObject) -> Result<Resource, ConversionError> {
        let gvk = object.group_version_kind()?;
        let descriptor = self.catalog.descriptor_for(&gvk)?;
        self.convert_as(descriptor, object)
    }

    fn convert_as(
        &self,
        descriptor: &TypeDescriptor,
        object: &RawObject,
    ) -> Result<Resource, ConversionError> {
        let content = serde_json::to_vec(object.value())?;
        Ok(Resource::new(id_as(descriptor, object), content))
    }
}

fn id_as(descriptor: &TypeDescriptor, object: &RawObject) -> String {
    let namespace = object.namespace().unwrap_or(DEFAULT_NAMESPACE);
    identity(descriptor, namespace, object.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use serde_json::json;

    fn converter() -> ResourceConverter {
        ResourceConverter::new(Arc::new(TypeCatalog::from_descriptors(vec![
            TypeDescriptor {
                group: "apps".to_string(),
                version: "v1".to_string(),
                kind: "Deployment".to_string(),
                plural: "deployments".to_string(),
                namespaced: true,
            },
            TypeDescriptor {
                group: String::new(),
                version: "v1".to_string(),
                kind: "Namespace".to_string(),
                plural: "namespaces".to_string(),
                namespaced: false,
            },
        ])))
    }

    fn object(value: serde_json::Value) -> RawObject {
        RawObject::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_namespaced_object() {
        let deployment = object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "ns1" },
            "spec": { "replicas": 2 },
        }));

        let resource = converter().convert(&deployment).unwrap();
        assert_eq!(resource.id, "apps/v1/namespaces/ns1/deployments/web");
        assert_eq!(resource.content_json().unwrap(), *deployment.value());
    }

    #[test]
    fn test_convert_cluster_scoped_object() {
        let namespace = object(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": "default" },
        }));

        let resource = converter().convert(&namespace).unwrap();
        assert_eq!(resource.id, "v1/namespaces/default");
    }

    #[test]
    fn test_missing_namespace_uses_default() {
        let deployment = object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web" },
        }));

        assert_eq!(
            converter().id_for(&deployment).unwrap(),
            "apps/v1/namespaces/default/deployments/web"
        );
    }

    #[test]
    fn test_uncataloged_kind_is_conversion_error() {
        let service = object(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": "api", "namespace": "ns1" },
        }));

        let err = converter().convert(&service).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::UnknownType(CatalogError::TypeUnknown { .. })
        ));
    }

    #[test]
    fn test_convert_as_ignores_self_reported_type() {
        let converter = converter();
        let descriptor = converter.catalog().descriptors()[0].clone();
        let stripped = object(json!({
            "metadata": { "name": "web", "namespace": "ns1" },
        }));

        let resource = converter.convert_as(&descriptor, &stripped).unwrap();
        assert_eq!(resource.id, "apps/v1/namespaces/ns1/deployments/web");
    }
}
