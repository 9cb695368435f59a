use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque 64-bit handle to a resource of kind `K`.
///
/// `value == 0` is invalid. Equality is value equality, so handles work as map
/// keys. The owning manager hands out values from a counter starting at 1 and
/// never reuses them.
pub struct Handle<K> {
    value: u64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub const INVALID: Self = Self::from_raw(0);

    #[inline]
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.value != 0
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K> Eq for Handle<K> {}

impl<K> PartialOrd for Handle<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Handle<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<K>();
        let short = kind.rsplit("::").next().unwrap_or(kind);
        write!(f, "Handle<{short}>({})", self.value)
    }
}

impl<K> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
