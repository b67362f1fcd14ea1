//! Capture collaborator abstraction.
//!
//! A capture device owns the microphone (or a stand-in) plus a frequency
//! analysis tap. Sessions acquire it once, pull one magnitude snapshot per
//! tick and release it on every exit path.

use crate::error::AudioError;

/// Trait implemented by live and synthetic capture backends.
///
/// Implementations are not required to be `Send`: a live device stream is
/// tied to the thread that opened it, and sessions run on a single thread.
pub trait CaptureDevice {
    /// Open the device and start the analysis tap.
    ///
    /// Fails with [`AudioError::PermissionDenied`] when access is refused.
    /// Calling it while already acquired is a no-op.
    fn acquire(&mut self) -> Result<(), AudioError>;

    /// Write the latest magnitude snapshot (one byte per bin) into `out`.
    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError>;

    /// Release the device. Idempotent and safe from any state.
    fn release(&mut self);

    /// Number of bins in each snapshot.
    fn bin_count(&self) -> usize;

    fn is_acquired(&self) -> bool;
}

impl<C: CaptureDevice + ?Sized> CaptureDevice for Box<C> {
    fn acquire(&mut self) -> Result<(), AudioError> {
        (**self).acquire()
    }

    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        (**self).read_frequency_data(out)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn bin_count(&self) -> usize {
        (**self).bin_count()
    }

    fn is_acquired(&self) -> bool {
        (**self).is_acquired()
    }
}
