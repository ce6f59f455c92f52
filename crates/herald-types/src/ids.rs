//! Type-safe identifier wrappers around host-supplied strings.
//!
//! Event, option, and source identifiers all arrive from the host as plain
//! strings. Wrapping each in its own newtype keeps them from being mixed up
//! at compile time while still serializing transparently as strings.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a transparent newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifier of a choice or notification event.
    EventId
}

define_id! {
    /// Identifier of one option inside a choice event.
    OptionId
}

define_id! {
    /// Identifier of a registered event source.
    SourceId
}

impl EventId {
    /// Create a fresh identifier for a synthesized notification summary.
    ///
    /// Uses UUID v7 so successive summaries sort by creation time.
    pub fn batch() -> Self {
        Self(format!("batch-{}", Uuid::now_v7()))
    }
}
