//! Route registration and the frozen lookup trees.
//!
//! Registration collects (method, path, version) triples and rejects
//! duplicates; [`RegistryBuilder::build`] then freezes everything into one
//! radix tree per method — O(path-length) lookup, no allocations on the
//! hot path beyond the matched params. Each tree leaf holds the pipelines
//! registered for that path, one per version.

use std::collections::{BTreeMap, HashMap, btree_map};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use thiserror::Error;

use crate::method::Method;
use crate::pipeline::RoutePipeline;

// ── Version ──────────────────────────────────────────────────────────────────

/// A dotted three-part route version, e.g. `1.0.0`.
///
/// Routes are selected by major version (the `v1` in the negotiated media
/// type); minor and patch only order releases within a major.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version {
    major: u16,
    minor: u16,
    patch: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }

    pub fn major(&self) -> u16 { self.major }
}

#[derive(Debug, Error)]
#[error("invalid version `{0}`, expected `major.minor.patch`")]
pub struct VersionError(String);

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| VersionError(s.to_owned()))
        };
        Ok(Self { major: next()?, minor: next()?, patch: next()? })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ── Route ────────────────────────────────────────────────────────────────────

/// A (method, path, version) registration key. The triple is unique within
/// a registry.
#[derive(Clone, Debug)]
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) version: Version,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, version: Version) -> Self {
        Self { method, path: path.into(), version }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The triple is already taken. Registration never silently overwrites.
    #[error("duplicate route {method} {path} v{version}")]
    DuplicateRoute {
        method: Method,
        path: String,
        version: Version,
    },

    #[error("invalid route pattern `{path}`: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

// ── RegistryBuilder ──────────────────────────────────────────────────────────

/// Collects registrations, then freezes into a [`RouteRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    routes: HashMap<Method, HashMap<String, BTreeMap<Version, Arc<RoutePipeline>>>>,
}

impl RegistryBuilder {
    /// Registers `pipeline` under `route`. A duplicate (method, path,
    /// version) triple is an error.
    pub fn register(&mut self, route: Route, pipeline: RoutePipeline) -> Result<(), RegistryError> {
        let versions = self
            .routes
            .entry(route.method)
            .or_default()
            .entry(route.path.clone())
            .or_default();

        match versions.entry(route.version) {
            btree_map::Entry::Occupied(_) => Err(RegistryError::DuplicateRoute {
                method: route.method,
                path: route.path,
                version: route.version,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(Arc::new(pipeline));
                Ok(())
            }
        }
    }

    /// Freezes the registrations into per-method radix trees. A malformed
    /// path pattern surfaces here, before anything listens.
    pub fn build(self) -> Result<RouteRegistry, RegistryError> {
        let mut trees = HashMap::new();
        for (method, paths) in self.routes {
            let tree: &mut MatchitRouter<_> = trees.entry(method).or_insert_with(MatchitRouter::new);
            for (path, versions) in paths {
                tree.insert(path.as_str(), versions)
                    .map_err(|source| RegistryError::InvalidPattern { path: path.clone(), source })?;
            }
        }
        Ok(RouteRegistry { trees })
    }
}

// ── RouteRegistry ────────────────────────────────────────────────────────────

/// The frozen route set. Built once at bootstrap, immutable and shared
/// read-only for the process lifetime.
pub struct RouteRegistry {
    trees: HashMap<Method, MatchitRouter<BTreeMap<Version, Arc<RoutePipeline>>>>,
}

/// What a lookup resolved to. The dispatcher needs to tell a missing
/// resource (404) apart from a version nobody serves (406).
pub(crate) enum Lookup {
    Matched(Arc<RoutePipeline>, HashMap<String, String>),
    /// Method and path matched, but no registered version has the
    /// requested major.
    VersionMismatch,
    NotFound,
}

impl RouteRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolves a request to the highest registered version with the
    /// requested major.
    pub(crate) fn lookup(&self, method: Method, path: &str, major: u16) -> Lookup {
        let Some(tree) = self.trees.get(&method) else { return Lookup::NotFound };
        let Ok(matched) = tree.at(path) else { return Lookup::NotFound };

        let Some(pipeline) = matched
            .value
            .iter()
            .rev()
            .find(|(version, _)| version.major() == major)
            .map(|(_, pipeline)| Arc::clone(pipeline))
        else {
            return Lookup::VersionMismatch;
        };

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Lookup::Matched(pipeline, params)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::request::Context;
    use crate::response::Response;

    fn pipeline() -> RoutePipeline {
        RoutePipeline::builder()
            .handler(|_ctx: Context| async { Ok::<_, Failure>(Response::text("ok")) })
    }

    fn route(version: &str) -> Route {
        Route::new(Method::Get, "/api/vehicle-history", version.parse().unwrap())
    }

    #[test]
    fn version_parses_and_displays_dotted() {
        let version: Version = "1.0.0".parse().unwrap();
        assert_eq!(version, Version::new(1, 0, 0));
        assert_eq!(version.to_string(), "1.0.0");
        assert!("1.0".parse::<Version>().is_err());
        assert!("one.two.three".parse::<Version>().is_err());
    }

    #[test]
    fn duplicate_triple_is_rejected_not_overwritten() {
        let mut builder = RouteRegistry::builder();
        builder.register(route("1.0.0"), pipeline()).unwrap();

        let err = builder.register(route("1.0.0"), pipeline()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute { .. }));
        assert_eq!(
            err.to_string(),
            "duplicate route GET /api/vehicle-history v1.0.0"
        );
    }

    #[test]
    fn same_path_different_version_coexist() {
        let mut builder = RouteRegistry::builder();
        builder.register(route("1.0.0"), pipeline()).unwrap();
        builder.register(route("2.0.0"), pipeline()).unwrap();
        let registry = builder.build().unwrap();

        assert!(matches!(
            registry.lookup(Method::Get, "/api/vehicle-history", 1),
            Lookup::Matched(..)
        ));
        assert!(matches!(
            registry.lookup(Method::Get, "/api/vehicle-history", 2),
            Lookup::Matched(..)
        ));
    }

    #[test]
    fn unknown_major_is_a_version_mismatch_not_a_miss() {
        let mut builder = RouteRegistry::builder();
        builder.register(route("1.0.0"), pipeline()).unwrap();
        let registry = builder.build().unwrap();

        assert!(matches!(
            registry.lookup(Method::Get, "/api/vehicle-history", 3),
            Lookup::VersionMismatch
        ));
        assert!(matches!(
            registry.lookup(Method::Get, "/api/nowhere", 1),
            Lookup::NotFound
        ));
        assert!(matches!(
            registry.lookup(Method::Post, "/api/vehicle-history", 1),
            Lookup::NotFound
        ));
    }

    #[test]
    fn path_params_come_back_from_lookup() {
        let mut builder = RouteRegistry::builder();
        builder
            .register(
                Route::new(Method::Get, "/vehicles/{plate}", Version::new(1, 0, 0)),
                pipeline(),
            )
            .unwrap();
        let registry = builder.build().unwrap();

        let Lookup::Matched(_, params) = registry.lookup(Method::Get, "/vehicles/DW12345", 1)
        else {
            panic!("expected a match");
        };
        assert_eq!(params.get("plate").map(String::as_str), Some("DW12345"));
    }
}
