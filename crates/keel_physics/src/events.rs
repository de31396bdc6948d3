//! Collision and trigger events in component terms.

use crate::collider::ColliderKey;
use crate::context::PhysicsContext;
use crate::world::RawCollisionEvent;

/// What happened between two colliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsEventKind {
    /// Two solid shapes came into contact.
    CollisionStarted,
    /// Two solid shapes separated.
    CollisionStopped,
    /// A shape entered a trigger volume.
    TriggerEntered,
    /// A shape left a trigger volume.
    TriggerExited,
}

/// One event, resolved to the involved collider components.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsEvent {
    /// What happened.
    pub kind: PhysicsEventKind,
    /// First involved collider.
    pub collider_a: ColliderKey,
    /// Second involved collider.
    pub collider_b: ColliderKey,
}

/// Resolve raw native events to component events.
///
/// Events whose attachment identity no longer resolves (gone longer than
/// the one-pass grace window) are dropped.
pub(crate) fn translate(ctx: &PhysicsContext, raw: &[RawCollisionEvent]) -> Vec<PhysicsEvent> {
    let mut events = Vec::with_capacity(raw.len());
    for event in raw {
        let (Some(a), Some(b)) = (
            ctx.resolve_collider(event.a),
            ctx.resolve_collider(event.b),
        ) else {
            continue;
        };
        let kind = match (event.is_trigger, event.started) {
            (true, true) => PhysicsEventKind::TriggerEntered,
            (true, false) => PhysicsEventKind::TriggerExited,
            (false, true) => PhysicsEventKind::CollisionStarted,
            (false, false) => PhysicsEventKind::CollisionStopped,
        };
        events.push(PhysicsEvent {
            kind,
            collider_a: a,
            collider_b: b,
        });
    }
    events
}
