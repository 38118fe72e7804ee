pub mod hal;
pub mod mock_hal;
pub mod rppal_hal;

// Re-export the main types that users need
pub use hal::{GpioBackend, InputLine, OutputLine, Pull, PwmLine};
pub use mock_hal::mock_impl::{create_backend as create_mock_backend, MockGpio};
#[cfg(feature = "pi-hardware")]
pub use rppal_hal::rppal_impl::{create_backend as create_hardware_backend, RppalGpio};
