//! Asynchronous delay used by the [`StackRunner`](crate::protocol::stack::runner::StackRunner)
//! to pace its ticks.

/// Source of tick delays.
pub trait KorriTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`KorriTimer`] on the embassy time driver of the firmware.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTimer;

impl KorriTimer for EmbassyTimer {
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a {
        embassy_time::Timer::after_millis(millis as u64)
    }
}
