//! Instrumented codec stub shared by the session tests

#![allow(dead_code)]

use async_trait::async_trait;
use mc_codec::{Codec, LinkEvents};
use mc_core::{
    ConnectionParams, ConnectionState, LinkIndicator, McError, McResult, PlcValue, ReadValues,
};
use mc_client::Session;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

pub enum OpenBehavior {
    Succeed,
    Fail(&'static str),
    Hang,
}

pub enum ReadBehavior {
    /// Answer with `result` after `delay`
    Respond {
        delay: Duration,
        result: McResult<ReadValues>,
    },
    /// Answer with the registered addresses as text after `delay`
    Echo(Duration),
    /// Answer whenever the test sends on the gate
    Gate(oneshot::Receiver<McResult<ReadValues>>),
    Hang,
}

#[derive(Default)]
pub struct StubCodec {
    indicator: AtomicU8,
    opens: AtomicUsize,
    closes: AtomicUsize,
    active_reads: AtomicUsize,
    max_active_reads: AtomicUsize,
    fail_remove: AtomicBool,
    open_script: Mutex<VecDeque<OpenBehavior>>,
    read_script: Mutex<VecDeque<ReadBehavior>>,
    registered: Mutex<Vec<String>>,
    added: Mutex<Vec<Vec<String>>>,
    removed: Mutex<Vec<Vec<String>>>,
    trace: Mutex<Vec<String>>,
    events: Mutex<Option<LinkEvents>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl StubCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_open(&self, behavior: OpenBehavior) {
        lock(&self.open_script).push_back(behavior);
    }

    pub fn script_read(&self, behavior: ReadBehavior) {
        lock(&self.read_script).push_back(behavior);
    }

    pub fn set_indicator(&self, indicator: LinkIndicator) {
        self.indicator.store(indicator.0, Ordering::SeqCst);
    }

    pub fn fail_remove(&self) {
        self.fail_remove.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn max_active_reads(&self) -> usize {
        self.max_active_reads.load(Ordering::SeqCst)
    }

    pub fn added(&self) -> Vec<Vec<String>> {
        lock(&self.added).clone()
    }

    pub fn removed(&self) -> Vec<Vec<String>> {
        lock(&self.removed).clone()
    }

    /// `start:<first address>` / `end:<first address>` per read
    pub fn trace(&self) -> Vec<String> {
        lock(&self.trace).clone()
    }

    /// Link events handle of the latest open
    pub fn link_events(&self) -> LinkEvents {
        lock(&self.events).clone().expect("codec was never opened")
    }
}

#[async_trait]
impl Codec for StubCodec {
    async fn open(&self, _params: &ConnectionParams, events: LinkEvents) -> McResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *lock(&self.events) = Some(events);
        self.set_indicator(LinkIndicator::CONNECTING);
        let behavior = lock(&self.open_script)
            .pop_front()
            .unwrap_or(OpenBehavior::Succeed);
        match behavior {
            OpenBehavior::Succeed => {
                self.set_indicator(LinkIndicator::CONNECTED);
                Ok(())
            }
            OpenBehavior::Fail(message) => {
                self.set_indicator(LinkIndicator::DISCONNECTED);
                Err(McError::LinkOpenFailure(message.to_string()))
            }
            OpenBehavior::Hang => std::future::pending::<McResult<()>>().await,
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.set_indicator(LinkIndicator::DISCONNECTED);
    }

    fn add_items(&self, addresses: &[String]) -> McResult<()> {
        lock(&self.added).push(addresses.to_vec());
        lock(&self.registered).extend(addresses.iter().cloned());
        Ok(())
    }

    fn remove_items(&self, addresses: &[String]) -> McResult<()> {
        lock(&self.removed).push(addresses.to_vec());
        lock(&self.registered).retain(|a| !addresses.contains(a));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(McError::codec("remove failed"));
        }
        Ok(())
    }

    async fn read_all(&self) -> McResult<ReadValues> {
        let active = self.active_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_reads.fetch_max(active, Ordering::SeqCst);

        let batch = lock(&self.registered).clone();
        let tag = batch.first().cloned().unwrap_or_default();
        lock(&self.trace).push(format!("start:{}", tag));

        let behavior = lock(&self.read_script)
            .pop_front()
            .unwrap_or(ReadBehavior::Echo(Duration::ZERO));
        let result = match behavior {
            ReadBehavior::Respond { delay, result } => {
                tokio::time::sleep(delay).await;
                result
            }
            ReadBehavior::Echo(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ReadValues::Positional(
                    batch.iter().map(|a| PlcValue::Text(a.clone())).collect(),
                ))
            }
            ReadBehavior::Gate(rx) => rx.await.unwrap_or(Err(McError::codec("gate dropped"))),
            ReadBehavior::Hang => std::future::pending::<McResult<ReadValues>>().await,
        };

        lock(&self.trace).push(format!("end:{}", tag));
        self.active_reads.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn link_indicator(&self) -> LinkIndicator {
        LinkIndicator(self.indicator.load(Ordering::SeqCst))
    }
}

pub fn params() -> ConnectionParams {
    ConnectionParams::new("192.168.3.39", 5007)
        .with_global_timeout(Duration::from_millis(500))
        .with_reconnect_delay(Duration::from_millis(1000))
}

/// Wait (bounded) until the session reports `state`
pub async fn wait_for_state(session: &Session, state: ConnectionState) {
    let mut rx = session.watch_state();
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("session gone");
}

pub fn text(values: &[&str]) -> ReadValues {
    ReadValues::Positional(values.iter().map(|v| PlcValue::Text(v.to_string())).collect())
}
