//! Newtype domain identifiers.
//!
//! A caller is either an authenticated user or an anonymous browser session.
//! Both are opaque strings issued by the authentication layer, wrapped in
//! distinct newtypes so that a [`UserId`] can never be stored where an
//! [`AnonId`] belongs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
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

string_id! {
    /// Identifies an authenticated user, as issued by the authentication layer.
    UserId
}

string_id! {
    /// Identifies an anonymous caller (a browser-scoped id with no account).
    AnonId
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The caller a run is attributed to.
///
/// A request carries at most one identity; the sum type makes "both set"
/// unrepresentable once a request has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// An authenticated user.
    User(UserId),
    /// An anonymous session.
    Anonymous(AnonId),
}

impl Identity {
    /// Storage column the identity keys on (`"user_id"` or `"anon_id"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Identity::User(_) => "user_id",
            Identity::Anonymous(_) => "anon_id",
        }
    }

    /// The raw identifier value.
    pub fn as_str(&self) -> &str {
        match self {
            Identity::User(id) => id.as_str(),
            Identity::Anonymous(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run identifier
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run.
///
/// Generated fresh for every invocation; recorded as a span field so all
/// activity of one run can be correlated, and stored with the persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RunId`] from an existing UUID (e.g. read back from storage).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}
