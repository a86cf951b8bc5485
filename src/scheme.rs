//! Resource type registry
//!
//! The scheme records which resource kinds the operator knows how to own. It is
//! built once at startup with [`init`] and never mutated afterwards; the
//! controller reads it to construct owner references for the resources it
//! creates.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::GroupVersionKind;
use kube::Resource;
use tracing::info;

use crate::crd::Tenant;
use crate::Error;

static GLOBAL_SCHEME: OnceLock<Arc<Scheme>> = OnceLock::new();

/// Metadata about a registered kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindInfo {
    /// Plural resource name used in API paths
    pub plural: String,
    /// Kind of the matching list type
    pub list_kind: String,
    /// Whether the kind exposes a status subresource
    pub status_subresource: bool,
}

/// Registry of known resource kinds
#[derive(Clone, Debug, Default)]
pub struct Scheme {
    kinds: HashMap<GroupVersionKind, KindInfo>,
}

impl Scheme {
    /// Create an empty scheme
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statically typed resource kind
    pub fn add_known_type<K>(&mut self, status_subresource: bool)
    where
        K: Resource<DynamicType = ()>,
    {
        let kind = K::kind(&()).to_string();
        let info = KindInfo {
            plural: K::plural(&()).to_string(),
            list_kind: format!("{}List", kind),
            status_subresource,
        };
        self.kinds.insert(gvk_of::<K>(), info);
    }

    /// Returns true if the kind is registered
    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains_key(gvk)
    }

    /// Registered kinds and what the scheme knows about them
    pub fn kinds(&self) -> impl Iterator<Item = (&GroupVersionKind, &KindInfo)> {
        self.kinds.iter()
    }

    /// Mark `owner` as the controlling owner of `child`
    ///
    /// Replaces any existing reference to the same owner. Fails if the owner's
    /// kind is not registered, the owner has no name or uid, the two objects
    /// live in different namespaces, or `child` is already controlled by a
    /// different object.
    pub fn set_controller_reference<O, C>(&self, owner: &O, child: &mut C) -> Result<(), Error>
    where
        O: Resource<DynamicType = ()>,
        C: Resource,
    {
        let gvk = gvk_of::<O>();
        if !self.recognizes(&gvk) {
            return Err(Error::owner_reference(format!(
                "kind {} ({}) is not registered in the scheme",
                gvk.kind,
                O::api_version(&())
            )));
        }

        let owner_meta = owner.meta();
        let name = owner_meta
            .name
            .clone()
            .ok_or_else(|| Error::owner_reference(format!("{} owner has no name", gvk.kind)))?;
        let uid = owner_meta.uid.clone().ok_or_else(|| {
            Error::owner_reference(format!("{} {} has no uid", gvk.kind, name))
        })?;

        if let Some(owner_ns) = owner_meta.namespace.as_deref() {
            let child_ns = child.meta().namespace.as_deref();
            if child_ns != Some(owner_ns) {
                return Err(Error::owner_reference(format!(
                    "cross-namespace owner references are disallowed: owner {}/{}, child namespace {:?}",
                    owner_ns, name, child_ns
                )));
            }
        }

        let refs = child.meta_mut().owner_references.get_or_insert_with(Vec::new);

        if let Some(existing) = refs
            .iter()
            .find(|r| r.controller == Some(true) && r.uid != uid)
        {
            return Err(Error::owner_reference(format!(
                "object is already controlled by {} {}",
                existing.kind, existing.name
            )));
        }

        refs.retain(|r| r.uid != uid);
        refs.push(OwnerReference {
            api_version: O::api_version(&()).to_string(),
            kind: gvk.kind.clone(),
            name,
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        });

        Ok(())
    }

    /// The process-wide scheme
    ///
    /// Fails if [`init`] has not run yet.
    pub fn global() -> Result<Arc<Scheme>, Error> {
        GLOBAL_SCHEME
            .get()
            .cloned()
            .ok_or_else(|| Error::config("type scheme used before initialization"))
    }
}

fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Register the Hoper types (Tenant, its list and status variants)
pub fn install(scheme: &mut Scheme) {
    scheme.add_known_type::<Tenant>(true);
}

/// Build and publish the process-wide scheme
///
/// Call once before any watch or reconcile activity. Later calls return the
/// scheme built by the first one.
pub fn init() -> Arc<Scheme> {
    GLOBAL_SCHEME
        .get_or_init(|| {
            let mut scheme = Scheme::new();
            install(&mut scheme);
            for (gvk, kind) in scheme.kinds() {
                info!(
                    group = %gvk.group,
                    version = %gvk.version,
                    kind = %gvk.kind,
                    list_kind = %kind.list_kind,
                    plural = %kind.plural,
                    status_subresource = kind.status_subresource,
                    "registered kind"
                );
            }
            Arc::new(scheme)
        })
        .clone()
}
