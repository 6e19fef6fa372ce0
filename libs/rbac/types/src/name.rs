use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_name {
    ($(#[doc = $doc:literal])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, fmt)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// The opaque identifier of a protected resource, e.g. a URI.
    ResourceName
);

define_name!(
    /// The name of an authorization scope owned by a resource.
    ScopeName
);

define_name!(
    /// The name of a role owned by a resource.
    RoleName
);

define_name!(
    /// An opaque external principal identifier, e.g. an ARN.
    PrincipalId
);
