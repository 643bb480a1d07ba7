use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! newtype_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[cfg_attr(feature = "openapi", schema(value_type = String))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh, time-ordered identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
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

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_id!(UserId, "A registered user account identifier.");
newtype_id!(TenantId, "A tenant identifier for multi-tenant isolation.");
newtype_id!(MembershipId, "Identifies a user's membership in a tenant.");
newtype_id!(PlanId, "Identifies a billing plan row.");
newtype_id!(SubscriptionId, "Identifies a tenant subscription.");
newtype_id!(StoreId, "Identifies a storefront.");
newtype_id!(ProductId, "Identifies a product within a store.");
newtype_id!(PageId, "Identifies a content page within a store.");
newtype_id!(TagId, "Identifies a global tag.");
newtype_id!(EventId, "Identifies a recorded analytics event.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_transparently() {
        let id = StoreId::new("store-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"store-1\"");
        let back: StoreId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TenantId::generate();
        let b = TenantId::generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn deref_and_display() {
        let id = TagId::from("featured");
        assert_eq!(&*id, "featured");
        assert_eq!(id.to_string(), "featured");
        assert_eq!(id.as_ref(), "featured");
    }
}
