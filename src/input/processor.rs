//! The poll cycle: drain sources, gate, wake, decode, publish

use tracing::{debug, trace};

use crate::input::debounce::DebounceGate;
use crate::input::event::{
    KeyStroke, LogicalKeyEvent, NavSet, RawEvent, RawInput, SourceKind, TouchPoint,
};
use crate::input::publisher::EventPublisher;
use crate::keymap::decoder::{Decoded, KeyMatrixDecoder, Released};
use crate::power::PowerSave;
use crate::sources::{PollContext, RawInputSource};

/// Result of one poll cycle, also written to the [`EventPublisher`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFrame {
    /// The debounce gate let this cycle's presses through
    pub processed: bool,
    /// The presses of this cycle were consumed to wake the device
    pub woke: bool,
    pub nav: NavSet,
    pub keys: Vec<LogicalKeyEvent>,
    pub touch: Option<TouchPoint>,
    causes: Vec<(NavSet, SourceKind)>,
}

impl InputFrame {
    /// Which source asserted `flag` this cycle
    pub fn cause_of(&self, flag: NavSet) -> Option<SourceKind> {
        self.causes
            .iter()
            .find(|(asserted, _)| *asserted == flag)
            .map(|(_, cause)| *cause)
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }

    /// Asserts each flag once; the first cause in priority order wins
    fn assert_nav(&mut self, nav: NavSet, cause: SourceKind) {
        for flag in nav.iter() {
            if self.nav.contains(flag) {
                debug!(
                    "{:?} from {:?} ignored, already asserted by {:?}",
                    flag,
                    cause,
                    self.cause_of(flag)
                );
                continue;
            }
            self.nav |= flag;
            self.causes.push((flag, cause));
        }
    }
}

/// How a press takes part in the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressRole {
    /// Printable key, click or touch; arms the debounce gate
    Action,
    /// Modifier key going down; counts as activity but never arms the gate
    ModifierEdge,
    /// Modifier reported again while held
    ModifierHeld,
}

/// What the cycle does to the published keystroke
#[derive(Default)]
struct StrokeUpdate {
    built: Option<KeyStroke>,
    released: bool,
}

impl StrokeUpdate {
    fn building(&mut self) -> &mut KeyStroke {
        self.built.get_or_insert_with(KeyStroke::default)
    }
}

pub struct InputCore<P> {
    source: Box<dyn RawInputSource>,
    /// Dedicated wake/select button, polled before `source`
    dedicated: Option<Box<dyn RawInputSource>>,
    decoder: KeyMatrixDecoder,
    gate: DebounceGate,
    power: P,
    publisher: EventPublisher,
    raw: Vec<RawEvent>,
    /// Key positions physically down, Fn/Shift/Opt excluded
    held: Vec<(u8, u8)>,
}

impl<P: PowerSave> InputCore<P> {
    pub fn new(
        source: Box<dyn RawInputSource>,
        dedicated: Option<Box<dyn RawInputSource>>,
        debounce_ms: u32,
        power: P,
        publisher: EventPublisher,
    ) -> Self {
        let decoder = KeyMatrixDecoder::new(source.layout());
        Self {
            source,
            dedicated,
            decoder,
            gate: DebounceGate::new(debounce_ms),
            power,
            publisher,
            raw: Vec::new(),
            held: Vec::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn decoder(&self) -> &KeyMatrixDecoder {
        &self.decoder
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut EventPublisher {
        &mut self.publisher
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    /// Runs one poll cycle
    pub fn poll_input(&mut self, ctx: &PollContext) -> InputFrame {
        let mut frame = InputFrame::default();
        let gate_open = self.gate.is_open(ctx.now_ms, ctx.long_press);
        let ctx = PollContext { gate_open, ..*ctx };

        let mut raw = std::mem::take(&mut self.raw);
        raw.clear();
        if let Some(dedicated) = self.dedicated.as_mut() {
            dedicated.poll(&ctx, &mut raw);
        }
        self.source.poll(&ctx, &mut raw);

        if raw.is_empty() {
            self.raw = raw;
            return frame;
        }

        let first_press = raw
            .iter()
            .find(|event| event.pressed && self.press_role(event) != PressRole::ModifierHeld)
            .map(|event| event.source);
        let arms_gate = raw
            .iter()
            .any(|event| event.pressed && self.press_role(event) == PressRole::Action);
        if !gate_open && arms_gate {
            trace!("Debounce gate closed, discarding presses");
        }

        if let Some(cause) = first_press.filter(|_| gate_open) {
            frame.processed = true;
            frame.woke = !self.power.request_wake();
            if frame.woke {
                debug!("Press consumed as wake signal");
            }
            frame.assert_nav(NavSet::ANY_ACTIVITY, cause);
        }

        let mut stroke = StrokeUpdate::default();
        for event in &raw {
            self.track_held(event);
            if !event.pressed {
                self.handle_release(event, &mut frame, &mut stroke);
            } else if frame.woke {
                continue;
            } else if frame.processed {
                self.handle_press(event, &mut frame, &mut stroke);
            } else if let RawInput::Key { row, col, repeat } = event.input {
                // modifiers follow the hardware even while the gate is closed
                if self.decoder.is_modifier(row, col) {
                    self.decoder.press(row, col, repeat);
                }
            }
        }

        if frame.processed && arms_gate {
            self.gate.accept(ctx.now_ms);
        }

        // a stroke built this cycle is published even if its key already went up
        match stroke.built {
            Some(keys) => {
                debug!("Keystroke: {}", keys);
                self.publisher.publish_stroke(keys);
            }
            None if stroke.released => self.publisher.clear_stroke(),
            None => {}
        }
        if let Some(point) = frame.touch {
            self.publisher.publish_touch(point);
        }
        if !frame.nav.is_empty() {
            self.publisher.publish_nav(frame.nav);
        }

        self.raw = raw;
        frame
    }

    fn press_role(&self, event: &RawEvent) -> PressRole {
        match event.input {
            RawInput::Key { row, col, repeat } if self.decoder.is_modifier(row, col) => {
                if repeat {
                    PressRole::ModifierHeld
                } else {
                    PressRole::ModifierEdge
                }
            }
            _ => PressRole::Action,
        }
    }

    fn track_held(&mut self, event: &RawEvent) {
        let RawInput::Key { row, col, .. } = event.input else {
            return;
        };
        if self.decoder.is_state_modifier(row, col) {
            return;
        }
        if !event.pressed {
            self.held.retain(|&position| position != (row, col));
        } else if !self.held.contains(&(row, col)) {
            self.held.push((row, col));
        }
    }

    fn handle_press(&mut self, event: &RawEvent, frame: &mut InputFrame, stroke: &mut StrokeUpdate) {
        match event.input {
            RawInput::Click(nav) => frame.assert_nav(nav, event.source),
            RawInput::Touch { x, y } => {
                frame.touch = Some(TouchPoint {
                    x,
                    y,
                    pressed: true,
                });
            }
            RawInput::Home => frame.assert_nav(NavSet::ESCAPE, event.source),
            RawInput::Key { row, col, repeat } => match self.decoder.press(row, col, repeat) {
                Decoded::Modifier => {}
                Decoded::ModifierKey(modifiers) => {
                    let keys = stroke.building();
                    keys.raw_codes.push(event.code);
                    keys.modifiers |= modifiers;
                    keys.pressed = true;
                }
                Decoded::Key(resolved) => {
                    let keys = stroke.building();
                    keys.raw_codes.push(event.code);
                    keys.characters.push(resolved.event.character);
                    keys.modifiers |= resolved.event.modifiers;
                    keys.flags.merge(resolved.flags);
                    keys.pressed = true;
                    frame.keys.push(resolved.event);
                    frame.assert_nav(resolved.nav, event.source);
                }
                Decoded::Unbound => trace!("Unbound key at row={}, col={}", row, col),
            },
        }
    }

    fn handle_release(
        &mut self,
        event: &RawEvent,
        frame: &mut InputFrame,
        stroke: &mut StrokeUpdate,
    ) {
        let RawInput::Key { row, col, .. } = event.input else {
            return;
        };
        // modifier state follows the hardware even while waking
        let released = self.decoder.release(row, col);
        if frame.woke {
            return;
        }
        match released {
            Some(Released::Modifier) => return,
            Some(Released::Key(key)) => frame.keys.push(key),
            Some(Released::ModifierKey(_)) | None => {}
        }
        // the stroke stays up while another key is still down
        if self.held.is_empty() {
            stroke.released = true;
        }
    }
}
