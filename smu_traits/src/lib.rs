pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// A borrowed connection to a SCPI-speaking source instrument.
///
/// The controller never opens or closes the underlying resource; it only
/// issues commands over a link somebody else owns. `connected()` reports
/// whether a live device sits behind the link; when false, runs take the
/// simulated path and issue no commands at all.
pub trait InstrumentLink {
    fn connected(&self) -> bool;

    /// Fire-and-forget command.
    fn write(&mut self, command: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Blocking request/response.
    fn query(&mut self, command: &str)
    -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: InstrumentLink + ?Sized> InstrumentLink for Box<T> {
    fn connected(&self) -> bool {
        (**self).connected()
    }

    fn write(&mut self, command: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(command)
    }

    fn query(
        &mut self,
        command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        (**self).query(command)
    }
}
