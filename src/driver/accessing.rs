use core::sync::atomic::Ordering::*;
use embedded_hal_async::spi::SpiDevice;
use tokio::sync::{broadcast, oneshot};
use log::*;

use crate::{
    queue::Completion,
    registers::{Register, DeviceInfo, SLOTS},
    state::{Outputs, Inputs, Settings},
    };
use super::{Hat, Error, Event};


impl<S: SpiDevice> Hat<S> {
    /**
        read every known service register once

        resolves when the board echoed all of them, or with the first error encountered. The cyclic task must be running.
    */
    pub async fn open(&self) -> Result<(), Error> {
        debug!("read all service registers");
        let mut pending = heapless::Vec::<_, SLOTS>::new();
        for slot in 0 .. SLOTS {
            pending.push(self.enqueue(slot)?)
                .map_err(|_| Error::QueueFull)?;
        }
        let mut result = Ok(());
        for receive in pending {
            if let Err(err) = wait(receive).await {
                result = result.and(Err(err));
            }
        }
        if result.is_ok() {
            debug!("all service registers read");
        }
        result
    }

    /**
        access the service register in the given slot, sending its current local value

        resolves with the value echoed by the board once it has been embedded in the cyclic frames
    */
    pub async fn request(&self, slot: usize) -> Result<u16, Error> {
        wait(self.enqueue(slot)?).await
    }
    /// read a known register from the board
    pub async fn read(&self, register: Register) -> Result<u16, Error> {
        self.request(register.slot()).await
    }
    /// write a known register to the board, resolves with the value the board echoed
    pub async fn write(&self, register: Register, value: u16) -> Result<u16, Error> {
        self.shared.lock().await.registers.stage(register.slot(), value);
        self.request(register.slot()).await
    }
    /// write a register by address
    pub async fn write_register(&self, address: u16, value: u16) -> Result<u16, Error> {
        let slot = self.set_register(address, value)?;
        self.request(slot).await
    }

    /// last known value of a register by address, `None` if unknown or never read
    pub fn register(&self, address: u16) -> Option<u16> {
        let shared = self.shared.blocking_lock();
        let slot = shared.registers.find(address)?;
        shared.registers.get(slot)?.value
    }
    /// stage a value for a register by address, it is sent at the next access to that register. Return its slot
    pub fn set_register(&self, address: u16, value: u16) -> Result<usize, Error> {
        let mut shared = self.shared.blocking_lock();
        let slot = shared.registers.find(address)
            .ok_or(Error::UnknownRegister(address))?;
        shared.registers.stage(slot, value);
        Ok(slot)
    }
    /// board identification, once all its registers have been read, see [Self::open]
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.shared.blocking_lock().registers.device_info()
    }

    /// copy of the outputs that will be sent next cycle
    pub fn outputs(&self) -> Outputs {
        self.shared.blocking_lock().outputs
    }
    pub fn set_outputs(&self, outputs: Outputs) {
        self.shared.blocking_lock().outputs = outputs;
    }
    /// modify outputs in place, the closure must not block
    pub fn update_outputs<R>(&self, change: impl FnOnce(&mut Outputs) -> R) -> R {
        change(&mut self.shared.blocking_lock().outputs)
    }

    pub fn settings(&self) -> Settings {
        self.shared.blocking_lock().settings
    }
    /// change the settings, the derived configuration registers are sent along the next service accesses
    pub fn set_settings(&self, settings: Settings) {
        self.shared.blocking_lock().settings = settings;
    }
    pub fn update_settings<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> R {
        change(&mut self.shared.blocking_lock().settings)
    }

    /// last valid input state received, `None` before the first valid cycle
    pub fn inputs(&self) -> Option<Inputs> {
        self.shared.blocking_lock().inputs
    }
    /// receive the events published by the cyclic task from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn enqueue(&self, slot: usize) -> Result<oneshot::Receiver<Completion>, Error> {
        if slot >= SLOTS
            {return Err(Error::UnknownSlot(slot))}
        let mut shared = self.shared.blocking_lock();
        // checked under lock, so that closing cannot miss this task
        if self.closed.load(Acquire)
            {return Err(Error::Closed)}
        shared.queue.request(slot)
    }
}

/// completion of a task, a dropped task means the driver closed
async fn wait(receive: oneshot::Receiver<Completion>) -> Completion {
    receive.await.unwrap_or(Err(Error::Closed))
}
