//! Newtype domain identifiers.
//!
//! Every name or handle that crosses the remote API boundary is a distinct
//! newtype. A [`NodeId`] (the opaque handle a mutation needs) can therefore
//! never be confused with a [`RefName`] (the human-readable name shown to the
//! user) even though both are strings under the hood.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Integer-backed identifiers
// ---------------------------------------------------------------------------

u64_id! {
    /// The per-repository number of a pull request (`#42`).
    PullRequestNumber
}

// ---------------------------------------------------------------------------
// String-backed identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Opaque global node identifier assigned by the remote API.
    ///
    /// This is the only valid handle for a mutation; names are not accepted.
    NodeId
}

string_id! {
    /// Short name of a branch or tag (`"main"`, `"v1.2.0"`), without the
    /// `refs/heads/` or `refs/tags/` prefix.
    RefName
}

string_id! {
    /// A user or organisation that owns repositories.
    OwnerName
}

string_id! {
    /// A repository name, without its owner.
    RepositoryName
}

// ---------------------------------------------------------------------------
// Repository coordinates
// ---------------------------------------------------------------------------

/// A fully-qualified repository: owner plus name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepositorySlug {
    pub owner: OwnerName,
    pub name: RepositoryName,
}

impl RepositorySlug {
    pub fn new(owner: OwnerName, name: RepositoryName) -> Self {
        Self { owner, name }
    }

    /// Resolves a command-line repository argument.
    ///
    /// `owner/repo` is split on the first `/`. A bare `repo` takes its owner
    /// from `default_owner`; when that is absent as well the argument is
    /// rejected. An explicit default owner wins over an embedded one only for
    /// bare names.
    pub fn resolve(
        argument: &str,
        default_owner: Option<&OwnerName>,
    ) -> Result<Self, ValidationError> {
        match argument.split_once('/') {
            Some((owner, name)) => {
                let owner = OwnerName::new(owner).ok_or(ValidationError::MissingOwner)?;
                let name = RepositoryName::new(name)
                    .filter(|n| !n.as_str().contains('/'))
                    .ok_or_else(|| ValidationError::InvalidRepository(argument.to_string()))?;
                Ok(Self::new(owner, name))
            }
            None => {
                let name = RepositoryName::new(argument).ok_or(ValidationError::MissingRepository)?;
                let owner = default_owner.cloned().ok_or(ValidationError::MissingOwner)?;
                Ok(Self::new(owner, name))
            }
        }
    }
}

impl FromStr for RepositorySlug {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s, None)
    }
}

impl std::fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
