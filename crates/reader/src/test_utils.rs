//! Test utilities for the reader
//!
//! [`MockTransport`] implements the transport traits without touching real
//! hardware. It records every resource acquisition and release as a
//! [`MockEvent`] and can be told to fail any step with a chosen `rusb::Error`.
//!
//! # Example
//!
//! ```
//! use protocol::TEMPER2;
//! use reader::test_utils::{MockEvent, MockTransport};
//! use reader::usb::{DeviceSession, SessionOptions};
//!
//! let transport = MockTransport::new().with_device(TEMPER2);
//! let session = DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default()).unwrap();
//! session.disconnect().unwrap();
//!
//! assert_eq!(transport.events().first(), Some(&MockEvent::Init));
//! assert_eq!(transport.events().last(), Some(&MockEvent::Exit));
//! ```

use crate::usb::transport::{Transport, TransportContext, TransportHandle};
use protocol::DeviceIdentity;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A step that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    Init,
    ListDevices,
    Descriptor,
    Open,
    KernelDriverActive,
    Detach(u8),
    Claim(u8),
    ControlTransfer,
    InterruptTransfer,
    Release(u8),
    Attach(u8),
}

/// A successful USB operation, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Library context initialised
    Init,
    /// Device at this enumeration index opened
    Open(usize),
    Detach(u8),
    Claim(u8),
    ControlOut {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
        timeout: Duration,
    },
    InterruptIn {
        endpoint: u8,
        len: usize,
        timeout: Duration,
    },
    Release(u8),
    Attach(u8),
    /// Device handle closed
    Close,
    /// Library context torn down
    Exit,
}

#[derive(Debug)]
struct MockState {
    devices: Vec<DeviceIdentity>,
    failures: Vec<(MockStep, rusb::Error)>,
    detach_capability: bool,
    kernel_driver_active: bool,
    response: Vec<u8>,
    events: Vec<MockEvent>,
}

impl MockState {
    fn check(&self, step: MockStep) -> rusb::Result<()> {
        match self.failures.iter().find(|(s, _)| *s == step) {
            Some((_, error)) => Err(*error),
            None => Ok(()),
        }
    }

    /// Record `event` unless `step` is scripted to fail
    fn perform(&mut self, step: MockStep, event: MockEvent) -> rusb::Result<()> {
        self.check(step)?;
        self.events.push(event);
        Ok(())
    }
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted in-memory USB stack
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Shared,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// No devices attached, detach supported, kernel driver bound,
    /// zeroed 8-byte response
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices: Vec::new(),
                failures: Vec::new(),
                detach_capability: true,
                kernel_driver_active: true,
                response: vec![0; protocol::REPORT_LEN],
                events: Vec::new(),
            })),
        }
    }

    /// Attach a device; devices are enumerated in insertion order
    pub fn with_device(self, identity: DeviceIdentity) -> Self {
        lock(&self.state).devices.push(identity);
        self
    }

    /// Make `step` fail with `error`
    pub fn fail_at(self, step: MockStep, error: rusb::Error) -> Self {
        lock(&self.state).failures.push((step, error));
        self
    }

    pub fn detach_capability(self, supported: bool) -> Self {
        lock(&self.state).detach_capability = supported;
        self
    }

    pub fn kernel_driver_active(self, active: bool) -> Self {
        lock(&self.state).kernel_driver_active = active;
        self
    }

    /// Bytes returned by the next interrupt reads
    pub fn respond_with(self, response: Vec<u8>) -> Self {
        lock(&self.state).response = response;
        self
    }

    /// Everything that happened so far
    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.state).events.clone()
    }
}

impl Transport for MockTransport {
    type Context = MockContext;

    fn init(&self) -> rusb::Result<MockContext> {
        lock(&self.state).perform(MockStep::Init, MockEvent::Init)?;
        Ok(MockContext {
            state: Arc::clone(&self.state),
        })
    }
}

/// Context handed out by [`MockTransport`]; records [`MockEvent::Exit`] on drop
#[derive(Debug)]
pub struct MockContext {
    state: Shared,
}

/// Enumerated mock device
#[derive(Debug, Clone, Copy)]
pub struct MockDevice {
    index: usize,
    identity: DeviceIdentity,
}

impl TransportContext for MockContext {
    type Device = MockDevice;
    type Handle = MockHandle;

    fn supports_detach_kernel_driver(&self) -> bool {
        lock(&self.state).detach_capability
    }

    fn list_devices(&self) -> rusb::Result<Vec<MockDevice>> {
        let state = lock(&self.state);
        state.check(MockStep::ListDevices)?;
        Ok(state
            .devices
            .iter()
            .enumerate()
            .map(|(index, identity)| MockDevice {
                index,
                identity: *identity,
            })
            .collect())
    }

    fn device_identity(&self, device: &MockDevice) -> rusb::Result<DeviceIdentity> {
        lock(&self.state).check(MockStep::Descriptor)?;
        Ok(device.identity)
    }

    fn open_device(&self, device: &MockDevice) -> rusb::Result<MockHandle> {
        lock(&self.state).perform(MockStep::Open, MockEvent::Open(device.index))?;
        Ok(MockHandle {
            state: Arc::clone(&self.state),
        })
    }
}

impl Drop for MockContext {
    fn drop(&mut self) {
        lock(&self.state).events.push(MockEvent::Exit);
    }
}

/// Handle handed out by [`MockContext`]; records [`MockEvent::Close`] on drop
#[derive(Debug)]
pub struct MockHandle {
    state: Shared,
}

impl TransportHandle for MockHandle {
    fn kernel_driver_active(&self, _interface: u8) -> rusb::Result<bool> {
        let state = lock(&self.state);
        state.check(MockStep::KernelDriverActive)?;
        Ok(state.kernel_driver_active)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        lock(&self.state).perform(MockStep::Detach(interface), MockEvent::Detach(interface))
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        lock(&self.state).perform(MockStep::Attach(interface), MockEvent::Attach(interface))
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        lock(&self.state).perform(MockStep::Claim(interface), MockEvent::Claim(interface))
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        lock(&self.state).perform(MockStep::Release(interface), MockEvent::Release(interface))
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        lock(&self.state).perform(
            MockStep::ControlTransfer,
            MockEvent::ControlOut {
                request_type,
                request,
                value,
                index,
                data: data.to_vec(),
                timeout,
            },
        )?;
        Ok(data.len())
    }

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = lock(&self.state);
        state.perform(
            MockStep::InterruptTransfer,
            MockEvent::InterruptIn {
                endpoint,
                len: buf.len(),
                timeout,
            },
        )?;
        let len = state.response.len().min(buf.len());
        buf[..len].copy_from_slice(&state.response[..len]);
        Ok(len)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        lock(&self.state).events.push(MockEvent::Close);
    }
}
