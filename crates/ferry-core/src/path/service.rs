use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{PathError, PathResult, RemotePath, href_path, normalize_relative, strip_scope};

/// Prefix under which every multi-tenant service namespace is published.
pub const SERVICE_WEBDAV_PREFIX: &str = "/webdav";

/// Top-level namespaces exposed by the multi-tenant service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceNamespace {
    /// Per-user home folders.
    Users,
    /// Team and project shares.
    Shared,
    /// Cloud backup sets.
    Backups,
}

impl ServiceNamespace {
    /// Every namespace, in prefix-matching order.
    pub const ALL: [Self; 3] = [Self::Users, Self::Shared, Self::Backups];

    /// Segment naming the namespace below [`SERVICE_WEBDAV_PREFIX`].
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Shared => "Shared",
            Self::Backups => "Backups",
        }
    }

    /// Absolute scope of the namespace.
    #[must_use]
    pub fn scope(self) -> String {
        format!("{SERVICE_WEBDAV_PREFIX}/{}", self.segment())
    }

    fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|namespace| namespace.segment() == segment)
    }
}

/// Path inside one namespace of the multi-tenant service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServicePath {
    namespace: ServiceNamespace,
    relative: String,
}

impl ServicePath {
    /// Build a path from a namespace and a reference relative to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is absolute or escapes the namespace.
    pub fn new(namespace: ServiceNamespace, relative: &str) -> PathResult<Self> {
        Ok(Self {
            namespace,
            relative: normalize_relative(relative)?,
        })
    }

    /// The namespace root itself.
    #[must_use]
    pub const fn root(namespace: ServiceNamespace) -> Self {
        Self {
            namespace,
            relative: String::new(),
        }
    }

    /// Namespace the path lives in.
    #[must_use]
    pub const fn namespace(&self) -> ServiceNamespace {
        self.namespace
    }
}

impl RemotePath for ServicePath {
    fn scope(&self) -> Cow<'_, str> {
        Cow::Owned(self.namespace.scope())
    }

    fn relative(&self) -> &str {
        &self.relative
    }

    fn with_relative(&self, relative: String) -> Self {
        Self {
            namespace: self.namespace,
            relative,
        }
    }

    fn from_href(href: &str) -> PathResult<Self> {
        let path = href_path(href)?;
        let unknown = || PathError::UnknownNamespace {
            href: href.to_string(),
        };
        let below_prefix = strip_scope(&path, SERVICE_WEBDAV_PREFIX).ok_or_else(unknown)?;
        let (segment, rest) = below_prefix.split_once('/').unwrap_or((below_prefix, ""));
        let namespace = ServiceNamespace::from_segment(segment).ok_or_else(unknown)?;
        Self::new(namespace, rest)
    }
}

/// Raw string form: `<Namespace>/<relative>`, e.g. `Users/alice/report.pdf`.
impl FromStr for ServicePath {
    type Err = PathError;

    fn from_str(raw: &str) -> PathResult<Self> {
        if raw.starts_with('/') {
            return Err(PathError::NotRelative {
                path: raw.to_string(),
            });
        }
        let (segment, rest) = raw.split_once('/').unwrap_or((raw, ""));
        let namespace =
            ServiceNamespace::from_segment(segment).ok_or_else(|| PathError::UnknownNamespace {
                href: raw.to_string(),
            })?;
        Self::new(namespace, rest)
    }
}

impl Display for ServicePath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.relative.is_empty() {
            formatter.write_str(self.namespace.segment())
        } else {
            write!(formatter, "{}/{}", self.namespace.segment(), self.relative)
        }
    }
}
