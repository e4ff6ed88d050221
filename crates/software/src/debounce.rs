//! Provides [`Debouncer`], which turns noisy samples of a mechanical switch into clean, edge-triggered press and
//! release events.
//!
//! Each sample is shifted into the low bit of a 16-bit register, so the register works like a FIFO of the most
//! recent switch states:
//!
//! ```text
//!          _      ____
//! MSB < __| |____|    |_______ < LSB
//!                  ^      ^
//!                  |      |
//!        pressed --+      +-- released
//! ```
//!
//! Bits above the window of interest are forced to one by the pattern's `ignore_mask`, and an edge is recognized
//! only when the register equals the press or release pattern exactly. A bouncing contact never forms one of those
//! patterns, so no spurious edge is produced, and the debounce interval is a fixed number of samples.

/// Bit patterns which define what a clean transition looks like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebouncePattern {
    /// High bits forced to one after every shift; only the remaining low bits hold history.
    pub ignore_mask: u16,
    /// Register value signalling a press.
    pub press: u16,
    /// Register value signalling a release.
    pub release: u16,
}

impl DebouncePattern {
    /// Nine samples of history. A press is recognized after seven released samples followed by two pressed ones;
    /// a release after two pressed samples followed by seven released ones.
    pub const DEFAULT: Self = Self {
        ignore_mask: 0xFE00,
        release: 0xFF80,
        press: 0xFE03,
    };
}

impl Default for DebouncePattern {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-tick switch sampler producing one-shot press and release events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Debouncer {
    pattern: DebouncePattern,
    /// Shift register of recent samples, most recent in the low bit.
    state: u16,
    pressed: bool,
    released: bool,
}

impl Debouncer {
    /// Constructs a [`Debouncer`] matching against the given pattern.
    pub const fn new(pattern: DebouncePattern) -> Self {
        Self {
            pattern,
            state: 0,
            pressed: false,
            released: false,
        }
    }

    /// Records one sample, where `true` means the switch is physically pressed. Call once per tick.
    pub fn sample(&mut self, raw_active: bool) {
        self.state = (self.state << 1) | u16::from(raw_active) | self.pattern.ignore_mask;

        if self.state == self.pattern.release {
            self.released = true;
        } else if self.state == self.pattern.press {
            self.pressed = true;
        }
    }

    /// Returns `true` once for each recognized press, clearing the event.
    pub fn take_pressed(&mut self) -> bool {
        core::mem::take(&mut self.pressed)
    }

    /// Returns `true` once for each recognized release, clearing the event.
    pub fn take_released(&mut self) -> bool {
        core::mem::take(&mut self.released)
    }

    /// The raw shift register.
    pub fn state(&self) -> u16 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    /// Feeds each sample and records, per tick, whether a press and a release were taken.
    fn run(debouncer: &mut Debouncer, samples: &[bool]) -> Vec<(bool, bool)> {
        samples
            .iter()
            .map(|&sample| {
                debouncer.sample(sample);
                (debouncer.take_pressed(), debouncer.take_released())
            })
            .collect()
    }

    fn ticks(value: bool, count: usize) -> impl Iterator<Item = bool> {
        core::iter::repeat_n(value, count)
    }

    #[test]
    fn clean_press_fires_once() {
        let samples: Vec<bool> = ticks(false, 10).chain(ticks(true, 20)).collect();
        let events = run(&mut Debouncer::default(), &samples);

        let presses: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(tick, &(pressed, _))| pressed.then_some(tick))
            .collect();
        // second consecutive pressed sample
        assert_eq!(std::vec![11], presses, "Expected left but got right");
        assert!(events.iter().all(|&(_, released)| !released));
    }

    #[test]
    fn clean_release_fires_once() {
        let samples: Vec<bool> = ticks(false, 10)
            .chain(ticks(true, 20))
            .chain(ticks(false, 20))
            .collect();
        let events = run(&mut Debouncer::default(), &samples);

        let releases: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(tick, &(_, released))| released.then_some(tick))
            .collect();
        // seventh consecutive released sample
        assert_eq!(std::vec![36], releases, "Expected left but got right");
        assert_eq!(1, events.iter().filter(|&&(pressed, _)| pressed).count());
    }

    #[test]
    fn bouncing_never_fires() {
        let bounce = [true, false, true, false, false, true, false, true, true, false, true, false];
        let samples: Vec<bool> = ticks(false, 10).chain(bounce.iter().copied().cycle().take(100)).collect();
        let events = run(&mut Debouncer::default(), &samples);
        assert!(
            events.iter().all(|&event| event == (false, false)),
            "Bouncing faster than the settling window should never produce an edge"
        );
    }

    #[test]
    fn press_then_bounce_on_release() {
        let samples: Vec<bool> = ticks(false, 10)
            .chain(ticks(true, 5))
            .chain([false, true, false, true, true])
            .chain(ticks(false, 10))
            .collect();
        let events = run(&mut Debouncer::default(), &samples);
        assert_eq!(1, events.iter().filter(|&&(pressed, _)| pressed).count(), "One press");
        assert_eq!(1, events.iter().filter(|&&(_, released)| released).count(), "One release");
    }

    #[test]
    fn event_survives_until_taken() {
        let mut debouncer = Debouncer::default();
        for sample in ticks(false, 10).chain(ticks(true, 10)) {
            debouncer.sample(sample);
        }
        assert!(debouncer.take_pressed(), "Press should be held until consumed");
        assert!(!debouncer.take_pressed(), "Press should only be consumed once");
        assert!(!debouncer.take_released());
    }

    #[test]
    fn ignore_mask_is_always_set() {
        let mut debouncer = Debouncer::default();
        debouncer.sample(false);
        assert_eq!(0xFE00, debouncer.state(), "Expected left but got right");
        debouncer.sample(true);
        assert_eq!(0xFE01, debouncer.state(), "Expected left but got right");
    }

    #[test]
    fn custom_pattern() {
        // four samples of history: a single pressed sample after released ones is a press, a single released
        // sample after it is a release
        let mut debouncer = Debouncer::new(DebouncePattern {
            ignore_mask: 0xFFF0,
            press: 0xFFF1,
            release: 0xFFF2,
        });
        let events = run(&mut debouncer, &[false, false, false, false, true, false]);
        assert_eq!(
            std::vec![
                (false, false),
                (false, false),
                (false, false),
                (false, false),
                (true, false),
                (false, true)
            ],
            events,
            "Expected left but got right"
        );
    }
}
