//! In-memory codec simulating a PLC (for demos and tests without hardware)
//!
//! Behaviour:
//! - device memory is a map `address -> value`; unknown addresses fail the
//!   whole batch with `Invalid address <addr>`
//! - `fail_next_opens(n)` makes the next `n` link-opens fail
//! - `drop_link(reason)` simulates a transport fault on the live link
//! - `set_read_latency` delays every `read_all`

use crate::codec::Codec;
use crate::link::LinkEvents;
use async_trait::async_trait;
use mc_core::{ConnectionParams, LinkIndicator, McError, McResult, PlcValue, ReadValues};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SimState {
    memory: HashMap<String, PlcValue>,
    registered: Vec<String>,
    indicator: u8,
    pending_open_failures: u32,
    read_latency: Duration,
    events: Option<LinkEvents>,
    opens: usize,
    reads: usize,
}

/// Simulated MC device
#[derive(Debug, Default)]
pub struct SimulatedCodec {
    state: Mutex<SimState>,
}

impl SimulatedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`set_value`](Self::set_value)
    pub fn with_value(self, address: &str, value: impl Into<PlcValue>) -> Self {
        self.set_value(address, value);
        self
    }

    pub fn set_value(&self, address: &str, value: impl Into<PlcValue>) {
        self.lock().memory.insert(address.to_string(), value.into());
    }

    pub fn fail_next_opens(&self, count: u32) {
        self.lock().pending_open_failures = count;
    }

    pub fn set_read_latency(&self, latency: Duration) {
        self.lock().read_latency = latency;
    }

    /// Drop the live link and report it as a transport fault
    pub fn drop_link(&self, reason: &str) {
        let events = {
            let mut state = self.lock();
            state.indicator = LinkIndicator::DISCONNECTED.0;
            state.registered.clear();
            state.events.clone()
        };
        if let Some(events) = events {
            events.fault(reason);
        }
    }

    /// Number of link-open attempts so far
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Number of `read_all` calls so far
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Addresses currently registered
    pub fn registered(&self) -> Vec<String> {
        self.lock().registered.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Codec for SimulatedCodec {
    async fn open(&self, params: &ConnectionParams, events: LinkEvents) -> McResult<()> {
        let mut state = self.lock();
        state.opens += 1;
        if state.pending_open_failures > 0 {
            state.pending_open_failures -= 1;
            state.indicator = LinkIndicator::DISCONNECTED.0;
            return Err(McError::LinkOpenFailure(format!(
                "connect ECONNREFUSED {}",
                params.endpoint()
            )));
        }
        log::debug!("simulated link to {} open", params.endpoint());
        state.indicator = LinkIndicator::CONNECTED.0;
        state.events = Some(events);
        Ok(())
    }

    fn close(&self) {
        let mut state = self.lock();
        state.indicator = LinkIndicator::DISCONNECTED.0;
        state.registered.clear();
        state.events = None;
    }

    fn add_items(&self, addresses: &[String]) -> McResult<()> {
        self.lock().registered.extend(addresses.iter().cloned());
        Ok(())
    }

    fn remove_items(&self, addresses: &[String]) -> McResult<()> {
        self.lock()
            .registered
            .retain(|registered| !addresses.contains(registered));
        Ok(())
    }

    async fn read_all(&self) -> McResult<ReadValues> {
        let latency = {
            let mut state = self.lock();
            state.reads += 1;
            state.read_latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock();
        if state.indicator != LinkIndicator::CONNECTED.0 {
            return Err(McError::codec("Not connected"));
        }
        state
            .registered
            .iter()
            .map(|address| {
                state
                    .memory
                    .get(address)
                    .cloned()
                    .ok_or_else(|| McError::codec(format!("Invalid address {}", address)))
            })
            .collect::<McResult<Vec<_>>>()
            .map(ReadValues::Positional)
    }

    fn link_indicator(&self) -> LinkIndicator {
        LinkIndicator(self.lock().indicator)
    }
}
