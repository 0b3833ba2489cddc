//! Bounded FIFO of admission tickets.
//!
//! A [`Ticket`] is the sending half of a one-shot handoff. The caller that
//! created it keeps the receiving half and is parked on it (or on the pool's
//! shutdown signal) for as long as the ticket sits in the queue. Sending never
//! blocks, so the dispatcher may deliver while holding the pool mutex.

use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Single-use handoff slot for one admitted caller.
#[derive(Debug)]
pub struct Ticket<T> {
    deliver: oneshot::Sender<T>,
}

impl<T> Ticket<T> {
    /// Create a ticket and the receiver its caller waits on.
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (deliver, receiver) = oneshot::channel();
        (Self { deliver }, receiver)
    }

    /// True once the caller has stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.deliver.is_closed()
    }

    /// Hand the value to the waiting caller.
    ///
    /// Gives the value back if the caller has gone away.
    pub fn deliver(self, value: T) -> Result<(), T> {
        self.deliver.send(value)
    }
}

/// FIFO of tickets with a hard capacity.
#[derive(Debug)]
pub struct WaitQueue<T> {
    tickets: VecDeque<Ticket<T>>,
    capacity: usize,
}

impl<T> WaitQueue<T> {
    /// Create a queue holding at most `capacity` tickets.
    pub fn new(capacity: usize) -> Self {
        Self {
            tickets: VecDeque::new(),
            capacity,
        }
    }

    /// Enqueue without blocking. Returns the ticket back when full.
    pub fn try_enqueue(&mut self, ticket: Ticket<T>) -> Result<(), Ticket<T>> {
        if self.tickets.len() >= self.capacity {
            self.tickets.retain(|t| !t.is_abandoned());
        }
        if self.tickets.len() >= self.capacity {
            return Err(ticket);
        }
        self.tickets.push_back(ticket);
        Ok(())
    }

    /// Oldest ticket whose caller is still waiting, if any.
    pub fn dequeue(&mut self) -> Option<Ticket<T>> {
        while let Some(ticket) = self.tickets.pop_front() {
            if !ticket.is_abandoned() {
                return Some(ticket);
            }
        }
        None
    }

    /// Remove every ticket. Dropping them wakes their callers.
    pub fn drain(&mut self) -> Vec<Ticket<T>> {
        self.tickets.drain(..).collect()
    }

    /// Number of callers still waiting. Abandoned tickets are not counted.
    pub fn len(&self) -> usize {
        self.tickets.iter().filter(|t| !t.is_abandoned()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.iter().all(Ticket::is_abandoned)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
