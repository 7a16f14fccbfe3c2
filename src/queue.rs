/*!
    pending service register accesses

    accesses are embedded in the cyclic frame one at a time: the access in flight is the one sent in the last frames, and is waiting for the board to echo its register.
*/

use tokio::sync::oneshot;
use log::*;

use crate::{
    frame::Echo,
    registers::Table,
    driver::Error,
    };


/// maximum number of accesses waiting for admission
pub const CAPACITY: usize = 64;

/// result of a service register access: the register value after the access
pub type Completion = Result<u16, Error>;

/// a requested access, waiting for admission or in flight
struct Task {
    slot: usize,
    done: oneshot::Sender<Completion>,
}

/// service accesses queue, admitting one access at a time in request order
pub struct Queue {
    pending: heapless::Deque<Task, CAPACITY>,
    flight: Option<Task>,
}
impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
impl Queue {
    pub fn new() -> Self {
        Self {
            pending: heapless::Deque::new(),
            flight: None,
        }
    }
    /// number of accesses waiting for admission, the one in flight excluded
    pub fn len(&self) -> usize {self.pending.len()}
    /// slot of the access in flight
    pub fn in_flight(&self) -> Option<usize> {
        self.flight.as_ref().map(|task| task.slot)
    }

    /// enqueue an access to the given slot, the returned receiver resolves when the board answered it
    pub fn request(&mut self, slot: usize) -> Result<oneshot::Receiver<Completion>, Error> {
        let (done, receive) = oneshot::channel();
        self.pending.push_back(Task {slot, done})
            .map_err(|_| Error::QueueFull)?;
        Ok(receive)
    }
    /// when no access is in flight, put the oldest pending one in flight and return its slot
    pub fn admit(&mut self) -> Option<usize> {
        if self.flight.is_some()
            {return None}
        self.flight = self.pending.pop_front();
        self.in_flight()
    }
    /**
        resolve the access in flight if the echo is about its register

        the register value is updated in the table and the access is resolved, or rejected if the board flagged an error. Echoes about any other register leave everything unchanged. Return the completion delivered, if any.
    */
    pub fn complete(&mut self, table: &mut Table, echo: Echo) -> Option<Completion> {
        let slot = self.in_flight()?;
        let register = table.get_mut(slot)?;
        if register.address != echo.register {
            trace!("ignore echo of register {:#06x} while waiting {:#06x}", echo.register, register.address);
            return None;
        }
        register.value = Some(echo.value);
        let completion =
            if echo.error  {Err(Error::Device {register: echo.register, value: echo.value})}
            else  {Ok(echo.value)};
        if let Some(task) = self.flight.take() {
            // the requester may have given up waiting, the table is updated anyway
            task.done.send(completion.clone()).ok();
        }
        Some(completion)
    }
    /// drop all accesses, pending or in flight. Their receivers resolve to an error
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len() + usize::from(self.flight.is_some());
        self.pending.clear();
        self.flight = None;
        count
    }
}
