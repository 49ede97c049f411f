//! Board bring-up as a typestate: probe candidate sources, then build the core

use statum::{machine, state};
use tracing::{debug, info, warn};

use crate::config::InputSettings;
use crate::error::InputError;
use crate::input::processor::InputCore;
use crate::input::publisher::{EventPublisher, TouchSink};
use crate::power::PowerSave;
use crate::sources::RawInputSource;

#[state]
#[derive(Debug, Clone)]
pub enum BoardState {
    Probing,
    Ready,
}

#[machine]
pub struct Board<S: BoardState> {
    settings: InputSettings,

    /// First source whose probe succeeded
    source: Option<Box<dyn RawInputSource>>,

    /// Dedicated wake/select button, polled ahead of `source`
    dedicated: Option<Box<dyn RawInputSource>>,

    touch_sink: Option<Box<dyn TouchSink>>,

    /// Names of the probes tried, in order, with their outcome
    attempts: Vec<(String, bool)>,
}

impl<S: BoardState> Board<S> {
    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }

    pub fn attempts(&self) -> &[(String, bool)] {
        &self.attempts
    }
}

impl Board<Probing> {
    pub fn create(settings: InputSettings) -> Self {
        debug!("Starting board discovery for {:?}", settings.board);
        Self::new(settings, None, None, None, Vec::new())
    }

    /// Tries `probe` unless an earlier candidate already answered.
    ///
    /// A failing probe is the expected outcome on boards without that chip,
    /// so it is logged and discovery moves on to the next candidate.
    pub fn offer<F>(mut self, name: &str, probe: F) -> Self
    where
        F: FnOnce(&InputSettings) -> Result<Box<dyn RawInputSource>, InputError>,
    {
        if self.source.is_some() {
            debug!("Skipping {} probe, input source already chosen", name);
            return self;
        }

        match probe(&self.settings) {
            Ok(source) => {
                info!("Input source {} ({:?}) detected", name, source.kind());
                self.source = Some(source);
                self.attempts.push((name.to_string(), true));
            }
            Err(e) => {
                warn!("Input source {} unavailable: {}", name, e);
                self.attempts.push((name.to_string(), false));
            }
        }
        self
    }

    pub fn with_dedicated(mut self, source: Box<dyn RawInputSource>) -> Self {
        info!("Dedicated input {} registered", source.name());
        self.dedicated = Some(source);
        self
    }

    pub fn with_touch_sink(mut self, sink: Box<dyn TouchSink>) -> Self {
        self.touch_sink = Some(sink);
        self
    }

    /// Ends discovery. Without a probed source the dedicated input becomes
    /// the primary one.
    pub fn finish(mut self) -> Result<Board<Ready>, InputError> {
        if self.source.is_none() {
            match self.dedicated.take() {
                Some(dedicated) => {
                    info!("No matrix or touch source, using {} alone", dedicated.name());
                    self.source = Some(dedicated);
                }
                None => {
                    warn!("Board discovery tried {:?} without success", self.attempts);
                    return Err(InputError::NoInputSource);
                }
            }
        }
        Ok(self.transition())
    }
}

impl Board<Ready> {
    pub fn source_name(&self) -> &str {
        self.source.as_ref().map_or("none", |source| source.name())
    }

    pub fn into_core<P: PowerSave>(self, power: P) -> Result<InputCore<P>, InputError> {
        let source = self.source.ok_or(InputError::NoInputSource)?;
        info!(
            "Input core ready: source={}, dedicated={}",
            source.name(),
            self.dedicated.as_ref().map_or("none", |d| d.name())
        );
        Ok(InputCore::new(
            source,
            self.dedicated,
            self.settings.debounce_ms,
            power,
            EventPublisher::new(self.touch_sink),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{NavSet, RawEvent, SourceKind};
    use crate::sources::{ButtonSource, NavLatch, PollContext};

    struct Named(&'static str);

    impl RawInputSource for Named {
        fn kind(&self) -> SourceKind {
            SourceKind::Matrix
        }

        fn name(&self) -> &str {
            self.0
        }

        fn poll(&mut self, _ctx: &PollContext, _events: &mut Vec<RawEvent>) {}
    }

    struct Awake;

    impl PowerSave for Awake {
        fn request_wake(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn absent_controller_falls_back() {
        let board = Board::create(InputSettings::default())
            .offer("tca8418", |_| {
                Err(InputError::ControllerAbsent("no ack".into()))
            })
            .offer("gpio-scan", |_| Ok(Box::new(Named("gpio-scan"))))
            .offer("never", |_| Ok(Box::new(Named("never"))))
            .finish()
            .unwrap();
        assert_eq!(board.source_name(), "gpio-scan");
        assert_eq!(
            board.attempts(),
            &[("tca8418".to_string(), false), ("gpio-scan".to_string(), true)]
        );
    }

    #[test]
    fn nothing_probed_is_an_error() {
        let result = Board::create(InputSettings::default())
            .offer("cst816", |_| Err(InputError::ControllerAbsent("no ack".into())))
            .finish();
        assert!(matches!(result, Err(InputError::NoInputSource)));
    }

    #[test]
    fn buttons_alone_become_the_primary_source() {
        let latch = NavLatch::new();
        let mut core = Board::create(InputSettings::default())
            .with_dedicated(Box::new(ButtonSource::new(latch.clone())))
            .finish()
            .unwrap()
            .into_core(Awake)
            .unwrap();
        assert_eq!(core.source_name(), "buttons");

        latch.set(NavSet::NEXT);
        let frame = core.poll_input(&PollContext::at(0));
        assert_eq!(frame.nav, NavSet::NEXT | NavSet::ANY_ACTIVITY);
    }
}
