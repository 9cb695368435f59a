//! Small integer identities shared across subsystem boundaries.
//!
//! Ids are never pointers. `0` is reserved as the invalid value for every id type,
//! and the scene graph uses it for its implicit root ([`VIRTUAL_ROOT_ID`]).

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The reserved invalid id.
            pub const INVALID: Self = Self(0);

            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[inline]
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identity of a game object, shared with its scene-graph node.
    GameObjectId
);
define_id!(
    /// Identity of a scene inside a world.
    SceneId
);
define_id!(
    /// Identity of a world.
    WorldId
);

/// Synthetic parent of every top-level scene-graph node.
pub const VIRTUAL_ROOT_ID: GameObjectId = GameObjectId::INVALID;

/// Monotonic, non-reusing id source. Starts at 1.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next raw id value.
    pub fn allocate(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// Makes sure ids handed out later are strictly greater than `value`.
    pub fn reserve_through(&mut self, value: u64) {
        self.next = self.next.max(value.saturating_add(1));
    }

    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next
    }
}
