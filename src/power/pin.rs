//! Trait abstraction for the mains-detect input pin

use std::io;

use rppal::gpio::{Gpio, InputPin};
use tracing::{debug, info};

use crate::error::{Result, UpsError};

/// Digital input reflecting mains presence (high = mains present)
#[cfg_attr(test, mockall::automock)]
pub trait PowerPin: Send {
    /// Sample the pin level
    fn is_high(&mut self) -> io::Result<bool>;

    /// Return the pin to its original configuration
    ///
    /// Further reads fail after release.
    fn release(&mut self);
}

/// Mains-detect pin on the Raspberry Pi GPIO header
pub struct RppalPin {
    pin: Option<InputPin>,
    number: u8,
}

impl std::fmt::Debug for RppalPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RppalPin")
            .field("number", &self.number)
            .field("released", &self.pin.is_none())
            .finish()
    }
}

impl RppalPin {
    /// Configure BCM pin `number` as an input with pull-down
    ///
    /// # Errors
    ///
    /// Returns [`UpsError::Gpio`] if the GPIO peripheral is unavailable or the
    /// pin is already in use.
    pub fn open(number: u8) -> Result<Self> {
        let gpio = Gpio::new()
            .map_err(|e| UpsError::Gpio(format!("Failed to access GPIO: {}", e)))?;

        let mut pin = gpio
            .get(number)
            .map_err(|e| UpsError::Gpio(format!("Failed to claim pin {}: {}", number, e)))?
            .into_input_pulldown();
        pin.set_reset_on_drop(true);

        info!("Mains-detect input on BCM pin {} (pull-down)", number);
        Ok(Self {
            pin: Some(pin),
            number,
        })
    }

    /// BCM pin number
    pub fn number(&self) -> u8 {
        self.number
    }
}

impl PowerPin for RppalPin {
    fn is_high(&mut self) -> io::Result<bool> {
        self.pin
            .as_ref()
            .map(|pin| pin.is_high())
            .ok_or_else(|| io::Error::other(format!("pin {} already released", self.number)))
    }

    fn release(&mut self) {
        // Dropping the InputPin restores its previous mode and pull state
        if self.pin.take().is_some() {
            debug!("Released BCM pin {}", self.number);
        }
    }
}
