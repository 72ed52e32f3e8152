#![forbid(unsafe_code)]

//! Field animations.
//!
//! An [`AnimationDriver`] interpolates field values over time and writes each
//! frame through [`Animatable::write_animated`], so mappings propagate but
//! change handlers are not queued for intermediate frames.
//!
//! Lifecycle events ([`AnimationEvent`]) go through an explicit
//! [`ObserverList`]: observers run in registration order and stop receiving
//! events when their [`Subscription`] is dropped.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Target view destroyed | view removed mid-animation | animation stopped, `Stopped` event |
//! | Write rejected | unknown field or kind mismatch | warning logged, animation stopped |

use core::fmt;
use std::rc::Rc;
use std::time::Duration;

use mbind_core::{Length, Value};
use slotmap::SlotMap;

use crate::capability::Animatable;
use crate::id::ViewId;
use crate::reactive::{ObserverList, Subscription};

slotmap::new_key_type! {
    /// Handle to a running animation.
    pub struct AnimationId;
}

/// Maps linear progress in `0..=1` to eased progress.
pub type Easing = fn(f32) -> f32;

#[must_use]
pub fn linear(t: f32) -> f32 {
    t
}

#[must_use]
pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

/// Lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEvent {
    Started {
        id: AnimationId,
        view: ViewId,
        field: Rc<str>,
    },
    Completed {
        id: AnimationId,
        view: ViewId,
        field: Rc<str>,
    },
    Stopped {
        id: AnimationId,
        view: ViewId,
        field: Rc<str>,
    },
}

/// One running field animation.
#[derive(Debug, Clone)]
pub struct FieldAnimation {
    pub view: ViewId,
    pub field: Rc<str>,
    pub from: Value,
    pub to: Value,
    pub duration: Duration,
    pub easing: Easing,
    elapsed: Duration,
}

impl FieldAnimation {
    /// Linear progress in `0..=1`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

/// Interpolate between two values of the same shape.
///
/// Numbers, same-unit lengths and colors blend; anything else holds `from`
/// until the end and then jumps to `to`.
#[must_use]
pub fn interpolate(from: &Value, to: &Value, t: f32) -> Value {
    let mix = |a: f32, b: f32| a + (b - a) * t;
    match (from, to) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * f64::from(t)),
        (Value::Int(a), Value::Int(b)) => {
            Value::Int((*a as f64 + (*b - *a) as f64 * f64::from(t)).round() as i64)
        }
        (Value::Length(Length::Pixels(a)), Value::Length(Length::Pixels(b))) => {
            Value::Length(Length::Pixels(mix(*a, *b)))
        }
        (Value::Length(Length::Percent(a)), Value::Length(Length::Percent(b))) => {
            Value::Length(Length::Percent(mix(*a, *b)))
        }
        (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(*b, t)),
        _ if t >= 1.0 => to.clone(),
        _ => from.clone(),
    }
}

/// Runs field animations against an [`Animatable`] target.
#[derive(Default)]
pub struct AnimationDriver {
    running: SlotMap<AnimationId, FieldAnimation>,
    order: Vec<AnimationId>,
    events: ObserverList<AnimationEvent>,
}

impl AnimationDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate a field from its current value to `to`.
    ///
    /// Returns `None` when the view or field does not exist. A running
    /// animation of the same field is stopped first.
    pub fn animate(
        &mut self,
        target: &dyn Animatable,
        view: ViewId,
        field: &str,
        to: impl Into<Value>,
        duration: Duration,
        easing: Easing,
    ) -> Option<AnimationId> {
        let Some(from) = target.current_value(view, field) else {
            tracing::debug!(view = ?view, field, "cannot animate a missing field");
            return None;
        };
        Some(self.animate_from(view, field, from, to, duration, easing))
    }

    /// Animate a field between explicit endpoints.
    pub fn animate_from(
        &mut self,
        view: ViewId,
        field: &str,
        from: impl Into<Value>,
        to: impl Into<Value>,
        duration: Duration,
        easing: Easing,
    ) -> AnimationId {
        let existing = self
            .order
            .iter()
            .copied()
            .find(|id| self.running.get(*id).is_some_and(|a| a.view == view && &*a.field == field));
        if let Some(id) = existing {
            self.stop(id);
        }

        let field: Rc<str> = Rc::from(field);
        let id = self.running.insert(FieldAnimation {
            view,
            field: Rc::clone(&field),
            from: from.into(),
            to: to.into(),
            duration,
            easing,
            elapsed: Duration::ZERO,
        });
        self.order.push(id);
        self.events.notify(&AnimationEvent::Started { id, view, field });
        id
    }

    /// Stop an animation where it is. Returns `false` if it already ended.
    pub fn stop(&mut self, id: AnimationId) -> bool {
        match self.finish(id) {
            Some(anim) => {
                self.events.notify(&AnimationEvent::Stopped {
                    id,
                    view: anim.view,
                    field: anim.field,
                });
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, id: AnimationId) -> Option<&FieldAnimation> {
        self.running.get(id)
    }

    #[must_use]
    pub fn is_running(&self, id: AnimationId) -> bool {
        self.running.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn subscribe(&self, observer: impl Fn(&AnimationEvent) + 'static) -> Subscription {
        self.events.subscribe(observer)
    }

    /// Advance every animation by `dt`, in start order. Returns the number of
    /// frames written.
    pub fn advance(&mut self, target: &mut dyn Animatable, dt: Duration) -> usize {
        let mut frames = 0;
        for id in self.order.clone() {
            let Some(anim) = self.running.get_mut(id) else {
                continue;
            };
            if !target.is_alive(anim.view) {
                self.stop(id);
                continue;
            }
            anim.elapsed = anim.elapsed.saturating_add(dt);
            let t = anim.progress();
            let value = if t >= 1.0 {
                anim.to.clone()
            } else {
                interpolate(&anim.from, &anim.to, (anim.easing)(t))
            };
            let (view, field) = (anim.view, Rc::clone(&anim.field));

            if let Err(err) = target.write_animated(view, &field, value) {
                tracing::warn!(view = ?view, field = %field, error = %err, "animation frame rejected");
                self.stop(id);
                continue;
            }
            frames += 1;
            if t >= 1.0
                && let Some(anim) = self.finish(id)
            {
                self.events.notify(&AnimationEvent::Completed {
                    id,
                    view: anim.view,
                    field: anim.field,
                });
            }
        }
        frames
    }

    fn finish(&mut self, id: AnimationId) -> Option<FieldAnimation> {
        let anim = self.running.remove(id)?;
        self.order.retain(|&o| o != id);
        Some(anim)
    }
}

impl fmt::Debug for AnimationDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationDriver")
            .field("running", &self.running.len())
            .field("observers", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UiContext;
    use crate::registry::{FieldSpec, RegistryBuilder, ViewTypeBuilder};
    use crate::tree::ViewTree;
    use crate::error::HandlerError;
    use mbind_core::{Rgba, ValueKind};
    use std::cell::{Cell, RefCell};
    use tracing_test::traced_test;

    const NO_ATTRS: [(&str, &str); 0] = [];

    fn fading_tree(handler_hits: Rc<Cell<u32>>) -> (ViewTree, ViewId, ViewId) {
        let mut b = RegistryBuilder::new();
        b.register(
            ViewTypeBuilder::new("Fade")
                .handler("AlphaChanged", move |_: &mut ViewTree, _| -> Result<(), HandlerError> {
                    handler_hits.set(handler_hits.get() + 1);
                    Ok(())
                })
                .component("Shadow", "Shadow")
                .field(
                    FieldSpec::new("Alpha", ValueKind::Float)
                        .map_to("Shadow.Alpha")
                        .on_change("AlphaChanged"),
                ),
        )
        .register(ViewTypeBuilder::new("Shadow").field(FieldSpec::new("Alpha", ValueKind::Float)));
        let mut tree = ViewTree::new(UiContext::new(b.try_build().unwrap()));
        let v = tree.create_view("Fade", None, None, NO_ATTRS).unwrap().view;
        let shadow = tree.children(v, crate::tree::TraversalMode::SkipTemplates)[0];
        (tree, v, shadow)
    }

    #[test]
    fn interpolation() {
        assert_eq!(interpolate(&Value::Float(0.0), &Value::Float(2.0), 0.5), Value::Float(1.0));
        assert_eq!(interpolate(&Value::Int(0), &Value::Int(10), 0.25), Value::Int(3));
        assert_eq!(
            interpolate(
                &Value::Length(Length::Pixels(0.0)),
                &Value::Length(Length::Pixels(8.0)),
                0.5
            ),
            Value::Length(Length::Pixels(4.0))
        );
        assert_eq!(
            interpolate(&Value::Color(Rgba::BLACK), &Value::Color(Rgba::WHITE), 1.0),
            Value::Color(Rgba::WHITE)
        );
        let (a, b) = (Value::from("a"), Value::from("b"));
        assert_eq!(interpolate(&a, &b, 0.9), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);
        assert_eq!(ease_out_cubic(1.0), 1.0);
    }

    #[test]
    fn frames_propagate_without_handlers() {
        let hits = Rc::new(Cell::new(0));
        let (mut tree, v, shadow) = fading_tree(Rc::clone(&hits));
        let mut driver = AnimationDriver::new();
        let id = driver
            .animate(&tree, v, "Alpha", 1.0, Duration::from_millis(100), linear)
            .unwrap();

        assert_eq!(driver.advance(&mut tree, Duration::from_millis(50)), 1);
        assert_eq!(tree.get_field(shadow, "Alpha"), Some(Value::Float(0.5)));
        assert!(driver.is_running(id));

        assert_eq!(driver.advance(&mut tree, Duration::from_millis(80)), 1);
        assert_eq!(tree.get_field(v, "Alpha"), Some(Value::Float(1.0)));
        assert!(!driver.is_running(id));
        assert!(driver.is_empty());

        tree.tick();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn events_in_order_and_destroyed_targets_stop() {
        let (mut tree, v, _) = fading_tree(Rc::new(Cell::new(0)));
        let mut driver = AnimationDriver::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = driver.subscribe(move |e| {
            let tag = match e {
                AnimationEvent::Started { .. } => "started",
                AnimationEvent::Completed { .. } => "completed",
                AnimationEvent::Stopped { .. } => "stopped",
            };
            l.borrow_mut().push(tag);
        });

        driver.animate_from(v, "Alpha", 0.0, 1.0, Duration::from_millis(10), linear);
        driver.animate_from(v, "Alpha", 1.0, 0.0, Duration::from_millis(10), linear);
        assert_eq!(driver.len(), 1);

        tree.destroy(v);
        assert_eq!(driver.advance(&mut tree, Duration::from_millis(5)), 0);
        assert_eq!(*log.borrow(), vec!["started", "stopped", "started", "stopped"]);

        drop(sub);
        driver.animate_from(v, "Alpha", 0.0, 1.0, Duration::ZERO, linear);
        assert_eq!(log.borrow().len(), 4);
    }

    #[traced_test]
    #[test]
    fn rejected_frames_stop_the_animation() {
        let (mut tree, v, _) = fading_tree(Rc::new(Cell::new(0)));
        let mut driver = AnimationDriver::new();
        assert!(driver
            .animate(&tree, v, "Missing", 1.0, Duration::from_millis(10), linear)
            .is_none());
        let id = driver.animate_from(v, "Alpha", "x", "y", Duration::from_millis(10), linear);
        driver.advance(&mut tree, Duration::from_millis(1));
        assert!(!driver.is_running(id));
        assert!(logs_contain("animation frame rejected"));
    }
}
