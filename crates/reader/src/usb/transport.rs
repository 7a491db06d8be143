//! USB transport capability traits
//!
//! The session only needs a handful of libusb operations. They are expressed
//! as traits so the same session code runs against `rusb` on real hardware
//! and against [`crate::test_utils::MockTransport`] in tests.
//!
//! Teardown is tied to ownership: dropping a handle closes it, dropping a
//! context exits the library context.

use protocol::DeviceIdentity;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;

/// Entry point of a USB stack
pub trait Transport {
    type Context: TransportContext;

    /// Initialise a fresh library context
    fn init(&self) -> rusb::Result<Self::Context>;
}

/// An initialised library context
pub trait TransportContext {
    type Device;
    type Handle: TransportHandle;

    /// Whether the platform can detach kernel drivers
    fn supports_detach_kernel_driver(&self) -> bool;

    /// All currently attached devices
    fn list_devices(&self) -> rusb::Result<Vec<Self::Device>>;

    /// Vendor/product ids from the device descriptor
    fn device_identity(&self, device: &Self::Device) -> rusb::Result<DeviceIdentity>;

    fn open_device(&self, device: &Self::Device) -> rusb::Result<Self::Handle>;
}

/// An open device handle
pub trait TransportHandle {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// Host-to-device control transfer, returns the number of bytes written
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Interrupt IN transfer, returns the number of bytes read into `buf`
    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

/// libusb via `rusb`
#[derive(Debug, Clone, Copy, Default)]
pub struct RusbTransport;

impl Transport for RusbTransport {
    type Context = Context;

    fn init(&self) -> rusb::Result<Context> {
        Context::new()
    }
}

impl TransportContext for Context {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn supports_detach_kernel_driver(&self) -> bool {
        rusb::supports_detach_kernel_driver()
    }

    fn list_devices(&self) -> rusb::Result<Vec<Device<Context>>> {
        let devices = UsbContext::devices(self)?;
        Ok(devices.iter().collect())
    }

    fn device_identity(&self, device: &Device<Context>) -> rusb::Result<DeviceIdentity> {
        let descriptor = device.device_descriptor()?;
        Ok(DeviceIdentity::new(
            descriptor.vendor_id(),
            descriptor.product_id(),
        ))
    }

    fn open_device(&self, device: &Device<Context>) -> rusb::Result<DeviceHandle<Context>> {
        device.open()
    }
}

// Inherent methods are called by path so they never resolve back to the
// trait methods of the same name.
impl TransportHandle for DeviceHandle<Context> {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::<Context>::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::<Context>::detach_kernel_driver(self, interface)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::<Context>::attach_kernel_driver(self, interface)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::<Context>::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::<Context>::release_interface(self, interface)
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
        DeviceHandle::<Context>::write_control(
            self,
            request_type,
            request,
            value,
            index,
            data,
            timeout,
        )
    }

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::<Context>::read_interrupt(self, endpoint, buf, timeout)
    }
}
