use core::{
    future::poll_fn,
    task::Poll,
    sync::atomic::{AtomicBool, Ordering::*},
    };
use embedded_hal_async::spi::{SpiDevice, Error as _};
use futures_concurrency::future::Race;
use tokio::sync::{broadcast, Notify};
use log::*;

use crate::{
    mutex::*,
    queue::Queue,
    frame::{self, Service, FRAME},
    registers::Table,
    state::{Outputs, Inputs, Settings, ANALOG_OUTPUTS},
    };
use super::{Config, Event};


/**
    Monarco HAT driver

    it owns the SPI device connected to the board and exchanges a frame with it every period, see [Self::run]. All methods take `&self` so the driver can be shared by the application tasks polled alongside the cyclic task.
*/
pub struct Hat<S> {
    /// SPI device, only used by the cyclic task, and released when closing
    bus: BusyMutex<Option<S>>,
    /// state shared between the cyclic task and the application
    pub(super) shared: BusyMutex<Shared>,
    pub(super) events: broadcast::Sender<Event>,
    /// wakes up the cyclic task waiting for its next cycle
    closing: Notify,
    pub(super) closed: AtomicBool,
    config: Config,
}

/// everything the application can read or change between cycles
pub(super) struct Shared {
    pub outputs: Outputs,
    pub settings: Settings,
    pub registers: Table,
    pub queue: Queue,
    /// last valid input state
    pub inputs: Option<Inputs>,
    /// consecutive cycles done without delay
    pub burst: usize,
    /// analog outputs clamped in the last frame
    pub clamped: [bool; ANALOG_OUTPUTS],
}

impl<S: SpiDevice> Hat<S> {
    /// initialize a driver on an already configured SPI device, the board is not accessed before [Self::run] is polled
    pub fn new(spi: S, config: Config) -> Self {
        let (events, _) = broadcast::channel(config.events.max(1));
        Self {
            bus: BusyMutex::from(Some(spi)),
            shared: BusyMutex::from(Shared {
                outputs: Outputs::default(),
                settings: Settings::default(),
                registers: Table::new(),
                queue: Queue::new(),
                inputs: None,
                burst: 0,
                clamped: [false; ANALOG_OUTPUTS],
            }),
            events,
            closing: Notify::new(),
            closed: AtomicBool::new(false),
            config,
        }
    }
    pub fn config(&self) -> &Config {&self.config}

    /**
        coroutine responsible of the cyclic exchanges with the board

        it **must** be running for the board to receive outputs, for inputs to be published and for service accesses to complete. It only returns once [Self::close] is called, or immediately if it is already running. Failed exchanges and corrupted frames are reported as [Event]s and retried next cycle.
    */
    pub async fn run(&self) -> Result<(), super::Error> {
        let Some(mut bus) = self.bus.try_lock()
            else {return Err(super::Error::Running)};
        debug!("start cycling every {:?}", self.config.period);
        let mut receive = [0u8; FRAME];
        while !self.closed.load(Acquire) {
            let Some(spi) = bus.as_mut()
                else {break};
            let send = self.prepare();
            receive.fill(0);
            match spi.transfer(&mut receive, &send).await {
                Ok(()) => self.dispatch(&receive),
                Err(err) => {
                    let kind = err.kind();
                    warn!("SPI exchange failed: {:?}", kind);
                    self.emit(Event::TransportError(kind));
                },
            }
            let delay = self.next_delay();
            if delay.is_zero() {
                yield_now().await;
                continue;
            }
            let closing = (
                async {tokio::time::sleep(delay).await; false},
                async {self.closing.notified().await; true},
                ).race().await;
            if closing
                {break}
        }
        // release the device and whoever is still waiting for it
        bus.take();
        let cancelled = self.shared.blocking_lock().queue.cancel_all();
        debug!("closed, {} service accesses cancelled", cancelled);
        Ok(())
    }

    /// stop the cyclic task, release the SPI device and reject pending service accesses
    pub fn close(&self) {
        if !self.closed.swap(true, AcqRel) {
            debug!("closing");
        }
        self.closing.notify_one();
        // if the cyclic task never started, it will not do it
        if let Some(mut bus) = self.bus.try_lock() {
            bus.take();
            self.shared.blocking_lock().queue.cancel_all();
        }
    }
    pub fn is_closed(&self) -> bool {
        self.closed.load(Acquire)
    }

    /**
        build the next frame to send

        the access in flight is embedded in every frame until the board echoed it, so a lost exchange or a corrupted reply only delays it
    */
    fn prepare(&self) -> [u8; FRAME] {
        let (encoded, newly) = {
            let mut shared = self.shared.blocking_lock();
            let Shared {queue, registers, settings, outputs, clamped, ..} = &mut *shared;
            if let Some(slot) = queue.admit() {
                let changed = registers.derive(settings);
                if changed != 0 {
                    debug!("{} configuration registers changed", changed);
                }
                trace!("admit service slot {}", slot);
            }
            let service = queue.in_flight()
                .and_then(|slot| registers.get(slot))
                .map(|register| Service {
                    register: register.address,
                    value: register.wire_value(),
                });
            let encoded = frame::encode(outputs, service);
            // only report channels entering their out of range state
            let mut newly = [None; ANALOG_OUTPUTS];
            for (channel, range) in encoded.clamped.iter().enumerate() {
                if range.is_some() && !clamped[channel] {
                    newly[channel] = *range;
                }
                clamped[channel] = range.is_some();
            }
            (encoded, newly)
        };
        for (channel, range) in newly.into_iter().enumerate() {
            if let Some(range) = range {
                warn!("analog output {} set to {}V, clamped to code {}", channel+1, range.requested, range.clamped);
                self.emit(Event::Clamped {channel, range});
            }
        }
        encoded.bytes
    }

    /// process a received frame, nothing is changed if it is corrupted
    fn dispatch(&self, receive: &[u8; FRAME]) {
        let mut shared = self.shared.blocking_lock();
        match frame::decode(receive, shared.settings.analog_inputs) {
            Err(reason) => {
                drop(shared);
                warn!("{}", reason);
                self.emit(Event::FrameError {reason, frame: *receive});
            },
            Ok(decoded) => {
                shared.inputs = Some(decoded.inputs);
                let Shared {queue, registers, ..} = &mut *shared;
                let completion = queue.complete(registers, decoded.echo);
                drop(shared);
                match completion {
                    Some(Ok(value)) => debug!("service register {:#06x} = {}", decoded.echo.register, value),
                    Some(Err(_)) => {
                        warn!("board refused access to register {:#06x}, value {}", decoded.echo.register, decoded.echo.value);
                        self.emit(Event::ServiceError {register: decoded.echo.register, value: decoded.echo.value});
                    },
                    None => {},
                }
                // service accesses are resolved before publishing the inputs of the same cycle
                self.emit(Event::Data(decoded.inputs));
            },
        }
    }

    /// delay before next cycle, depending on pending service accesses
    fn next_delay(&self) -> core::time::Duration {
        let mut shared = self.shared.blocking_lock();
        let delay = self.config.delay(shared.queue.len(), shared.burst);
        if delay.is_zero()
            {shared.burst += 1}
        else
            {shared.burst = 0}
        delay
    }

    pub(super) fn emit(&self, event: Event) {
        // no subscriber is not an error
        self.events.send(event).ok();
    }
}

/// let the other futures polled alongside progress
async fn yield_now() {
    let mut yielded = false;
    poll_fn(|context| {
        if yielded
            {return Poll::Ready(())}
        yielded = true;
        context.waker().wake_by_ref();
        Poll::Pending
    }).await
}
