//! Shared output state read by the UI layer
//!
//! Navigation signals sit in a take-and-clear mailbox: the poll cycle only ever
//! sets bits, and the consumer clears them by taking. A KeyStroke is cleared by
//! the poll cycle itself when the hardware reports a release.

use tracing::debug;

use crate::input::event::{KeyStroke, NavSet, TouchPoint};

/// One-way notification target for published touch points (heatmap, telemetry)
pub trait TouchSink {
    fn record(&mut self, point: TouchPoint);
}

impl<F: FnMut(TouchPoint)> TouchSink for F {
    fn record(&mut self, point: TouchPoint) {
        self(point)
    }
}

#[derive(Default)]
pub struct EventPublisher {
    nav: NavSet,
    stroke: KeyStroke,
    touch: Option<TouchPoint>,
    sink: Option<Box<dyn TouchSink>>,
}

impl EventPublisher {
    pub fn new(sink: Option<Box<dyn TouchSink>>) -> Self {
        Self {
            sink,
            ..Default::default()
        }
    }

    /// Sets navigation bits; bits the consumer has not taken yet stay set
    pub fn publish_nav(&mut self, nav: NavSet) {
        let unconsumed = self.nav & nav;
        if !unconsumed.is_empty() {
            debug!("Navigation {:?} re-asserted before the consumer took it", unconsumed);
        }
        self.nav |= nav;
    }

    /// Reads and clears the navigation mailbox in one step
    pub fn take_nav(&mut self) -> NavSet {
        std::mem::take(&mut self.nav)
    }

    pub fn peek_nav(&self) -> NavSet {
        self.nav
    }

    pub fn key_stroke(&self) -> &KeyStroke {
        &self.stroke
    }

    pub fn publish_stroke(&mut self, stroke: KeyStroke) {
        self.stroke = stroke;
    }

    pub fn clear_stroke(&mut self) {
        if !self.stroke.is_empty() {
            debug!("Key released, clearing keystroke");
        }
        self.stroke.clear();
    }

    pub fn publish_touch(&mut self, point: TouchPoint) {
        self.touch = Some(point);
        if let Some(sink) = self.sink.as_mut() {
            sink.record(point);
        }
    }

    pub fn touch_point(&self) -> Option<TouchPoint> {
        self.touch
    }

    pub fn take_touch(&mut self) -> Option<TouchPoint> {
        self.touch.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn take_nav_clears_the_mailbox() {
        let mut publisher = EventPublisher::default();
        publisher.publish_nav(NavSet::SELECT | NavSet::ANY_ACTIVITY);
        publisher.publish_nav(NavSet::NEXT);
        assert_eq!(
            publisher.take_nav(),
            NavSet::SELECT | NavSet::NEXT | NavSet::ANY_ACTIVITY
        );
        assert!(publisher.take_nav().is_empty());
    }

    #[test]
    fn touch_points_reach_the_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = seen.clone();
        let mut publisher =
            EventPublisher::new(Some(Box::new(move |p: TouchPoint| sink_seen.borrow_mut().push(p))));
        let point = TouchPoint { x: 10, y: 20, pressed: true };
        publisher.publish_touch(point);
        assert_eq!(seen.borrow().as_slice(), &[point]);
        assert_eq!(publisher.take_touch(), Some(point));
        assert_eq!(publisher.touch_point(), None);
    }
}
