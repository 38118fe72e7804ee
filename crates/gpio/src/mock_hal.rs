pub mod mock_impl {
    use super::super::hal::{GpioBackend, InputLine, OutputLine, Pull, PwmLine};
    use domotica_types::Level;
    use log::debug;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex, MutexGuard};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Output,
        Input(Pull),
        Pwm,
    }

    #[derive(Debug, Clone)]
    struct LineState {
        mode: Option<Mode>,
        level: Level,
        duty_cycle: f64,
        writes: usize,
    }

    impl Default for LineState {
        fn default() -> Self {
            LineState {
                mode: None,
                level: Level::Low,
                duty_cycle: 0.0,
                writes: 0,
            }
        }
    }

    type Lines = Arc<Mutex<HashMap<u8, LineState>>>;

    fn lock(lines: &Lines) -> MutexGuard<'_, HashMap<u8, LineState>> {
        // A panicking test thread must not wedge every other handle
        lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// In-memory GPIO bank
    ///
    /// Clones share the same lines, so a test can keep one handle to drive
    /// inputs and inspect outputs while the daemon owns the claimed lines.
    #[derive(Clone, Default)]
    pub struct MockGpio {
        lines: Lines,
    }

    impl MockGpio {
        /// Create a new MockGpio instance
        pub fn new() -> Self {
            MockGpio::default()
        }

        /// Simulate an external level on an input line
        pub fn set_input(&self, pin: u8, level: Level) {
            lock(&self.lines).entry(pin).or_default().level = level;
        }

        /// Current electrical level of a line (PWM lines read high when duty > 0)
        pub fn level(&self, pin: u8) -> Level {
            match lock(&self.lines).get(&pin) {
                Some(state) if state.mode == Some(Mode::Pwm) => Level::from(state.duty_cycle > 0.0),
                Some(state) => state.level,
                None => Level::Low,
            }
        }

        pub fn duty_cycle(&self, pin: u8) -> f64 {
            lock(&self.lines).get(&pin).map_or(0.0, |s| s.duty_cycle)
        }

        /// Number of writes performed on a line since it was claimed
        pub fn writes(&self, pin: u8) -> usize {
            lock(&self.lines).get(&pin).map_or(0, |s| s.writes)
        }

        /// Whether a line is currently claimed by a handle
        pub fn is_claimed(&self, pin: u8) -> bool {
            lock(&self.lines)
                .get(&pin)
                .map_or(false, |s| s.mode.is_some())
        }

        fn claim(&self, pin: u8, mode: Mode) -> Result<(), io::Error> {
            let mut lines = lock(&self.lines);
            let state = lines.entry(pin).or_default();
            if state.mode.is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("GPIO{} is not available", pin),
                ));
            }
            state.mode = Some(mode);
            state.writes = 0;
            Ok(())
        }
    }

    /// Mock implementation of a claimed line
    pub struct MockLine {
        pin: u8,
        lines: Lines,
    }

    impl MockLine {
        fn with<R>(&self, f: impl FnOnce(&mut LineState) -> R) -> R {
            f(lock(&self.lines).entry(self.pin).or_default())
        }
    }

    impl Drop for MockLine {
        fn drop(&mut self) {
            self.with(|s| s.mode = None);
        }
    }

    impl OutputLine for MockLine {
        fn write(&mut self, level: Level) -> Result<(), io::Error> {
            self.with(|s| {
                s.level = level;
                s.writes += 1;
            });
            Ok(())
        }

        fn level(&self) -> Level {
            self.with(|s| s.level)
        }
    }

    impl InputLine for MockLine {
        fn level(&self) -> Level {
            self.with(|s| s.level)
        }
    }

    impl PwmLine for MockLine {
        fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), io::Error> {
            self.with(|s| {
                s.duty_cycle = duty_cycle.clamp(0.0, 1.0);
                s.writes += 1;
            });
            Ok(())
        }

        fn duty_cycle(&self) -> f64 {
            self.with(|s| s.duty_cycle)
        }
    }

    impl GpioBackend for MockGpio {
        fn output(&self, pin: u8, initial: Level) -> Result<Box<dyn OutputLine>, io::Error> {
            debug!("Mock GPIO{} configured as output ({:?})", pin, initial);
            self.claim(pin, Mode::Output)?;
            let line = MockLine {
                pin,
                lines: self.lines.clone(),
            };
            line.with(|s| s.level = initial);
            Ok(Box::new(line))
        }

        fn input(&self, pin: u8, pull: Pull) -> Result<Box<dyn InputLine>, io::Error> {
            debug!("Mock GPIO{} configured as input ({:?})", pin, pull);
            self.claim(pin, Mode::Input(pull))?;
            let line = MockLine {
                pin,
                lines: self.lines.clone(),
            };
            // The bias decides the idle level until a test drives the line
            match pull {
                Pull::Down => line.with(|s| s.level = Level::Low),
                Pull::Up => line.with(|s| s.level = Level::High),
                Pull::Off => {}
            }
            Ok(Box::new(line))
        }

        fn pwm(
            &self,
            pin: u8,
            frequency_hz: f64,
            duty_cycle: f64,
        ) -> Result<Box<dyn PwmLine>, io::Error> {
            debug!("Mock GPIO{} configured as PWM at {} Hz", pin, frequency_hz);
            self.claim(pin, Mode::Pwm)?;
            let line = MockLine {
                pin,
                lines: self.lines.clone(),
            };
            line.with(|s| s.duty_cycle = duty_cycle.clamp(0.0, 1.0));
            Ok(Box::new(line))
        }
    }

    /// Helper function to create the mock backend
    pub fn create_backend() -> MockGpio {
        debug!("Creating mock GPIO backend");
        MockGpio::new()
    }

}
