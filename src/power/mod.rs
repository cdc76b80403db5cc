//! # Power State Module
//!
//! Mains presence tracking.
//!
//! The UPS HAT drives a GPIO input high while external 5V is present. The
//! tracker compares each sampled level against the last accepted state and
//! reports transitions. A transition is accepted once `debounce_reads`
//! consecutive reads disagree with the current state; with the default of
//! one read every flicker counts.

pub mod pin;

use std::fmt;

/// Mains power presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainsPower {
    /// External supply present
    Present,
    /// Running on battery
    Absent,
}

impl MainsPower {
    pub fn is_present(self) -> bool {
        self == MainsPower::Present
    }
}

impl From<bool> for MainsPower {
    fn from(pin_high: bool) -> Self {
        if pin_high {
            MainsPower::Present
        } else {
            MainsPower::Absent
        }
    }
}

impl fmt::Display for MainsPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainsPower::Present => write!(f, "mains"),
            MainsPower::Absent => write!(f, "battery"),
        }
    }
}

/// Result of feeding one pin read to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTransition {
    /// State after this read
    pub state: MainsPower,
    /// Whether this read flipped the state
    pub changed: bool,
}

/// Detects mains loss and restoration
#[derive(Debug, Clone)]
pub struct PowerStateTracker {
    state: MainsPower,
    debounce_reads: u32,
    disagreeing: u32,
}

impl PowerStateTracker {
    /// Create a tracker seeded with `initial` state
    ///
    /// `debounce_reads` below 1 is treated as 1.
    #[must_use]
    pub fn new(initial: MainsPower, debounce_reads: u32) -> Self {
        Self {
            state: initial,
            debounce_reads: debounce_reads.max(1),
            disagreeing: 0,
        }
    }

    /// Last accepted state
    pub fn state(&self) -> MainsPower {
        self.state
    }

    /// Feed one pin sample
    ///
    /// # Examples
    ///
    /// ```
    /// use ups_monitor::power::{MainsPower, PowerStateTracker};
    ///
    /// let mut tracker = PowerStateTracker::new(MainsPower::Present, 1);
    /// assert!(tracker.update(false).changed);
    /// assert!(!tracker.update(false).changed);
    /// assert_eq!(tracker.state(), MainsPower::Absent);
    /// ```
    pub fn update(&mut self, pin_high: bool) -> PowerTransition {
        let sampled = MainsPower::from(pin_high);

        if sampled == self.state {
            self.disagreeing = 0;
            return PowerTransition {
                state: self.state,
                changed: false,
            };
        }

        self.disagreeing += 1;
        if self.disagreeing < self.debounce_reads {
            return PowerTransition {
                state: self.state,
                changed: false,
            };
        }

        self.disagreeing = 0;
        self.state = sampled;
        PowerTransition {
            state: sampled,
            changed: true,
        }
    }
}
