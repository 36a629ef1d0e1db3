//! Type-safe identifiers for cars and floor requests.
//!
//! Cars are addressed by their position in the bank (`0..N-1`), so
//! [`CarId`] wraps a small integer and doubles as the tie-break order for
//! dispatch. Floor requests are short-lived and created concurrently from
//! several inputs, so [`RequestId`] uses UUID v7 (time-ordered), which also
//! keeps requests sortable by creation time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a floor call in the active request set.
    RequestId
}

/// Index of a car within the bank.
///
/// Ordering follows the numeric index; the dispatcher relies on this to
/// break cost ties in favour of the lowest id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct CarId(pub u16);

impl CarId {
    /// Position of this car in the bank's car list.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl core::fmt::Display for CarId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "car-{}", self.0)
    }
}

impl From<u16> for CarId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_time_ordered() {
        let first = RequestId::new();
        let second = RequestId::new();
        assert_ne!(first.into_inner(), Uuid::nil());
        assert!(first <= second);
    }

    #[test]
    fn request_id_display_matches_uuid() {
        let id = RequestId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }

    #[test]
    fn car_id_orders_by_index() {
        assert!(CarId(0) < CarId(1));
        assert_eq!(CarId(3).index(), 3);
        assert_eq!(CarId(2).to_string(), "car-2");
    }

    #[test]
    fn car_id_serializes_as_number() {
        let json = serde_json::to_string(&CarId(4)).ok();
        assert_eq!(json.as_deref(), Some("4"));
    }
}
