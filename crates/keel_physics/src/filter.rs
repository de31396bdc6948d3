//! Collision filtering via membership/filter bitmask pairs.

use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Which groups a shape belongs to and which it may collide with.
///
/// Two shapes interact when each one's membership intersects the other's
/// filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Groups this shape belongs to.
    pub memberships: u32,
    /// Groups this shape collides with.
    pub filter: u32,
}

impl CollisionFilter {
    /// Collides with everything.
    pub const ALL: Self = Self {
        memberships: u32::MAX,
        filter: u32::MAX,
    };

    /// Collides with nothing.
    pub const NONE: Self = Self {
        memberships: 0,
        filter: 0,
    };

    /// Create a filter from raw masks.
    pub fn new(memberships: u32, filter: u32) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// Whether two filters allow a collision between their shapes.
    pub fn can_collide(&self, other: &CollisionFilter) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }

    pub(crate) fn to_native(self) -> rapier::InteractionGroups {
        rapier::InteractionGroups::new(
            rapier::Group::from_bits_truncate(self.memberships),
            rapier::Group::from_bits_truncate(self.filter),
        )
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtering_is_symmetric_and_requires_both_sides() {
        let a = CollisionFilter::new(0b01, 0b10);
        let b = CollisionFilter::new(0b10, 0b01);
        let c = CollisionFilter::new(0b10, 0b10);

        assert!(a.can_collide(&b));
        assert!(b.can_collide(&a));
        assert!(!a.can_collide(&c));
        assert!(!CollisionFilter::NONE.can_collide(&CollisionFilter::ALL));
    }
}
