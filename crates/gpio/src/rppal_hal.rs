#[cfg(feature = "pi-hardware")]
pub mod rppal_impl {
    use super::super::hal::{GpioBackend, InputLine, OutputLine, Pull, PwmLine};
    use domotica_types::Level;
    use log::{debug, info};
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use std::io;

    fn to_io(e: rppal::gpio::Error) -> io::Error {
        match e {
            rppal::gpio::Error::PinUsed(pin) | rppal::gpio::Error::PinNotAvailable(pin) => {
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("GPIO{} is not available", pin),
                )
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }

    fn to_rppal(level: Level) -> rppal::gpio::Level {
        match level {
            Level::Low => rppal::gpio::Level::Low,
            Level::High => rppal::gpio::Level::High,
        }
    }

    /// Output line backed by an rppal `OutputPin`
    pub struct RppalOutput(OutputPin);

    impl OutputLine for RppalOutput {
        fn write(&mut self, level: Level) -> Result<(), io::Error> {
            self.0.write(to_rppal(level));
            Ok(())
        }

        fn level(&self) -> Level {
            Level::from(self.0.is_set_high())
        }
    }

    /// Input line backed by an rppal `InputPin`
    pub struct RppalInput(InputPin);

    impl InputLine for RppalInput {
        fn level(&self) -> Level {
            Level::from(self.0.is_high())
        }
    }

    /// Software PWM on an rppal `OutputPin`
    pub struct RppalPwm {
        pin: OutputPin,
        frequency_hz: f64,
        duty_cycle: f64,
    }

    impl PwmLine for RppalPwm {
        fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), io::Error> {
            let duty_cycle = duty_cycle.clamp(0.0, 1.0);
            self.pin
                .set_pwm_frequency(self.frequency_hz, duty_cycle)
                .map_err(to_io)?;
            self.duty_cycle = duty_cycle;
            Ok(())
        }

        fn duty_cycle(&self) -> f64 {
            self.duty_cycle
        }
    }

    impl Drop for RppalPwm {
        fn drop(&mut self) {
            // Stop the PWM thread before rppal resets the pin
            let _ = self.pin.clear_pwm();
        }
    }

    /// GPIO backend for the Raspberry Pi BCM controller
    #[derive(Clone)]
    pub struct RppalGpio {
        gpio: Gpio,
    }

    impl RppalGpio {
        /// Open the GPIO peripheral
        pub fn new() -> Result<Self, io::Error> {
            let gpio = Gpio::new().map_err(to_io)?;
            info!("Opened GPIO peripheral");
            Ok(RppalGpio { gpio })
        }
    }

    impl GpioBackend for RppalGpio {
        fn output(&self, pin: u8, initial: Level) -> Result<Box<dyn OutputLine>, io::Error> {
            debug!("Configuring GPIO{} as output ({:?})", pin, initial);
            let line = self.gpio.get(pin).map_err(to_io)?;
            let output = match initial {
                Level::Low => line.into_output_low(),
                Level::High => line.into_output_high(),
            };
            Ok(Box::new(RppalOutput(output)))
        }

        fn input(&self, pin: u8, pull: Pull) -> Result<Box<dyn InputLine>, io::Error> {
            debug!("Configuring GPIO{} as input ({:?})", pin, pull);
            let line = self.gpio.get(pin).map_err(to_io)?;
            let input = match pull {
                Pull::Down => line.into_input_pulldown(),
                Pull::Up => line.into_input_pullup(),
                Pull::Off => line.into_input(),
            };
            Ok(Box::new(RppalInput(input)))
        }

        fn pwm(
            &self,
            pin: u8,
            frequency_hz: f64,
            duty_cycle: f64,
        ) -> Result<Box<dyn PwmLine>, io::Error> {
            debug!(
                "Configuring GPIO{} as PWM at {} Hz (duty {})",
                pin, frequency_hz, duty_cycle
            );
            let output = self.gpio.get(pin).map_err(to_io)?.into_output_low();
            let mut pwm = RppalPwm {
                pin: output,
                frequency_hz,
                duty_cycle: 0.0,
            };
            pwm.set_duty_cycle(duty_cycle)?;
            Ok(Box::new(pwm))
        }
    }

    /// Helper function to create the hardware backend
    pub fn create_backend() -> Result<RppalGpio, io::Error> {
        debug!("Creating hardware GPIO backend");
        RppalGpio::new()
    }
}
