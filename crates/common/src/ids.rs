use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier from its hyphenated string form.
            pub fn parse_str(input: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(input).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_str(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an event stream in the event store.
    AggregateId
}

uuid_id! {
    /// Identifier of an order. Also correlates the order's process state.
    OrderId
}

uuid_id! {
    /// Identifier of a conference and of its seats availability pool.
    ConferenceId
}

uuid_id! {
    /// Identifier of a seat reservation within a conference.
    ReservationId
}

// Each domain id owns exactly one event stream.
impl From<OrderId> for AggregateId {
    fn from(id: OrderId) -> Self {
        Self(id.0)
    }
}

impl From<ConferenceId> for AggregateId {
    fn from(id: ConferenceId) -> Self {
        Self(id.0)
    }
}

/// A reservation is always made under the id of the order it serves.
impl From<OrderId> for ReservationId {
    fn from(id: OrderId) -> Self {
        Self(id.0)
    }
}

impl From<ReservationId> for OrderId {
    fn from(id: ReservationId) -> Self {
        Self(id.0)
    }
}
