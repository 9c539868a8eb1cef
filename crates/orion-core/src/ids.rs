//! Branded ID newtypes.
//!
//! Message ids are assigned by the server (or are the `"internal"` sentinel
//! for locally synthesized entries), client ids identify roster members, and
//! attachment ids are minted on the client before an upload and replaced by
//! the server-issued id afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id!(
    /// Message identifier: server-assigned, or [`MessageId::INTERNAL`].
    MessageId
);
branded_id!(
    /// Roster member identifier.
    ClientId
);
branded_id!(
    /// Attachment identifier (client-generated before upload, server-issued after).
    AttachmentId
);

impl MessageId {
    /// Reserved id of locally synthesized entries.
    pub const INTERNAL: &'static str = "internal";

    /// The sentinel id.
    #[must_use]
    pub fn internal() -> Self {
        Self(Self::INTERNAL.to_owned())
    }

    /// Whether this is the sentinel rather than a server message id.
    pub fn is_internal(&self) -> bool {
        self.0 == Self::INTERNAL
    }
}

/// Source of fresh attachment ids.
pub trait IdFactory: Send + Sync {
    /// Mint a new, never-before-seen attachment id.
    fn new_attachment_id(&self) -> AttachmentId;
}

/// [`IdFactory`] backed by UUID v7 (time-ordered).
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidFactory;

impl IdFactory for UuidFactory {
    fn new_attachment_id(&self) -> AttachmentId {
        AttachmentId(Uuid::now_v7().to_string())
    }
}
