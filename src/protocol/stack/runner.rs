//! Async driver of a [`Stack`] over a [`CanBus`] and a [`KorriTimer`].
//!
//! Between two ticks the runner receives frames from the bus into an rx channel;
//! each tick drains that channel through a [`ChannelDriver`] and every frame the
//! stack wrote lands in a tx channel, flushed to the bus right after the tick.
//! Both channels are plain [`embassy_sync::channel::Channel`]s owned by the firmware,
//! so another task (or an interrupt) may feed the rx side too.
use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use futures_util::{future::select, future::Either, pin_mut};

use super::{Stack, StackHooks, WakeFlag};
use crate::error::RunnerError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::can_driver::{CanDriver, SendStatus, TxHandle};
use crate::protocol::transport::traits::korri_timer::KorriTimer;

/// [`CanDriver`] over a pair of channels. Serves port 0 only.
pub struct ChannelDriver<'a, M: RawMutex, const RX: usize, const TX: usize> {
    rx: &'a Channel<M, CanFrame, RX>,
    tx: &'a Channel<M, CanFrame, TX>,
}

impl<'a, M: RawMutex, const RX: usize, const TX: usize> ChannelDriver<'a, M, RX, TX> {
    pub fn new(rx: &'a Channel<M, CanFrame, RX>, tx: &'a Channel<M, CanFrame, TX>) -> Self {
        Self { rx, tx }
    }
}

impl<M: RawMutex, const RX: usize, const TX: usize> CanDriver for ChannelDriver<'_, M, RX, TX> {
    fn send_frame(&mut self, port: u8, frame: &CanFrame) -> Result<TxHandle, SendStatus> {
        if port != 0 {
            return Err(SendStatus::Error);
        }
        self.tx
            .try_send(*frame)
            .map(|()| TxHandle(0))
            .map_err(|_| SendStatus::Busy)
    }

    fn receive_frame(&mut self, port: u8) -> Option<CanFrame> {
        if port != 0 {
            return None;
        }
        self.rx.try_receive().ok()
    }
}

/// Runs a [`Stack`] forever on an async bus.
pub struct StackRunner<'a, C, T, M, const RX: usize, const TX: usize>
where
    C: CanBus,
    T: KorriTimer,
    M: RawMutex,
{
    bus: C,
    timer: T,
    rx: &'a Channel<M, CanFrame, RX>,
    tx: &'a Channel<M, CanFrame, TX>,
    wake: Option<&'a WakeFlag<M>>,
    /// Frames dropped on a full rx channel since the last tick.
    overruns: u16,
}

impl<'a, C, T, M, const RX: usize, const TX: usize> StackRunner<'a, C, T, M, RX, TX>
where
    C: CanBus,
    T: KorriTimer,
    M: RawMutex,
{
    pub fn new(
        bus: C,
        timer: T,
        rx: &'a Channel<M, CanFrame, RX>,
        tx: &'a Channel<M, CanFrame, TX>,
    ) -> Self {
        Self {
            bus,
            timer,
            rx,
            tx,
            wake: None,
            overruns: 0,
        }
    }

    /// Tick early whenever `wake` is raised.
    pub fn with_wake(mut self, wake: &'a WakeFlag<M>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Driver view of the channels, for a manual [`Stack::tick`].
    pub fn driver(&self) -> ChannelDriver<'a, M, RX, TX> {
        ChannelDriver::new(self.rx, self.tx)
    }

    pub fn bus(&self) -> &C {
        &self.bus
    }

    /// Wait one tick period (or less when woken), tick, then flush the tx channel.
    ///
    /// Frames the rx channel had no room for are added to
    /// [`CommStats::rx_overrun`](super::stats::CommStats::rx_overrun).
    pub async fn step<const HEAP: usize, const NODES: usize, H: StackHooks>(
        &mut self,
        stack: &mut Stack<HEAP, NODES>,
        hooks: &mut H,
    ) -> Result<(), RunnerError<C::Error>> {
        if !self.wake.is_some_and(WakeFlag::take) {
            self.receive_until_tick(stack.config().ms_per_tick).await?;
        }

        stack.record_rx_overrun(core::mem::take(&mut self.overruns));
        stack.tick(&mut self.driver(), hooks);

        while let Ok(frame) = self.tx.try_receive() {
            self.bus.send(&frame).await.map_err(RunnerError::Send)?;
        }
        Ok(())
    }

    /// Loop on [`step`](Self::step) until the bus fails.
    pub async fn run<const HEAP: usize, const NODES: usize, H: StackHooks>(
        &mut self,
        stack: &mut Stack<HEAP, NODES>,
        hooks: &mut H,
    ) -> Result<Infallible, RunnerError<C::Error>> {
        loop {
            self.step(stack, hooks).await?;
        }
    }

    /// Move bus frames into the rx channel until the delay fires. The wake flag is
    /// checked between frames.
    async fn receive_until_tick(&mut self, ms: u32) -> Result<(), RunnerError<C::Error>> {
        let delay = self.timer.delay_ms(ms);
        pin_mut!(delay);
        loop {
            let frame = {
                let recv = self.bus.recv();
                pin_mut!(recv);
                match select(delay.as_mut(), recv).await {
                    Either::Left(((), _)) => return Ok(()),
                    Either::Right((result, _)) => result.map_err(RunnerError::Receive)?,
                }
            };
            if self.rx.try_send(frame).is_err() {
                self.overruns = self.overruns.saturating_add(1);
                #[cfg(feature = "defmt")]
                defmt::warn!("rx channel full, frame {} dropped", frame.id.0);
            }
            if self.wake.is_some_and(WakeFlag::take) {
                return Ok(());
            }
        }
    }
}
