use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scheduler_domain::ports::DeviceTransport;
use scheduler_errors::{SchedulerError, SchedulerResult};
use tracing::debug;

/// 内存寄存器模拟设备
///
/// Stands in for the serial client when no hardware is attached. Unset
/// registers read as zero. Failures can be injected per address, and every
/// operation is recorded so callers can check ordering.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    registers: Mutex<HashMap<u16, u16>>,
    failing: Mutex<HashMap<u16, String>>,
    operations: Mutex<Vec<DeviceCall>>,
    latency: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Read { address: u16, count: u16 },
    Write { address: u16, value: u16 },
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Preload consecutive registers starting at `address`.
    pub fn set_registers(&self, address: u16, words: &[u16]) {
        let mut registers = self.registers.lock().unwrap_or_else(|e| e.into_inner());
        for (offset, word) in words.iter().enumerate() {
            registers.insert(address.wrapping_add(offset as u16), *word);
        }
    }

    pub fn register(&self, address: u16) -> u16 {
        let registers = self.registers.lock().unwrap_or_else(|e| e.into_inner());
        registers.get(&address).copied().unwrap_or(0)
    }

    /// Any operation touching `address` fails with a transport error until
    /// [`clear_failure`](Self::clear_failure) is called.
    pub fn fail_at<S: Into<String>>(&self, address: u16, reason: S) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert(address, reason.into());
    }

    pub fn clear_failure(&self, address: u16) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.remove(&address);
    }

    pub fn operations(&self) -> Vec<DeviceCall> {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, call: DeviceCall) {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn check_failure(&self, first: u16, count: u16) -> SchedulerResult<()> {
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        for address in (0..count).map(|i| first.wrapping_add(i)) {
            if let Some(reason) = failing.get(&address) {
                return Err(SchedulerError::transport(format!(
                    "address {address}: {reason}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceTransport for SimulatedDevice {
    async fn read_registers(&self, address: u16, count: u16) -> SchedulerResult<Vec<u16>> {
        self.record(DeviceCall::Read { address, count });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.check_failure(address, count)?;

        let registers = self.registers.lock().unwrap_or_else(|e| e.into_inner());
        let words: Vec<u16> = (0..count)
            .map(|i| {
                registers
                    .get(&address.wrapping_add(i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        debug!(address, count, ?words, "Simulated read");
        Ok(words)
    }

    async fn write_register(&self, address: u16, value: u16) -> SchedulerResult<()> {
        self.record(DeviceCall::Write { address, value });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.check_failure(address, 1)?;

        self.registers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address, value);
        debug!(address, value, "Simulated write");
        Ok(())
    }
}
