//! USB side of the keyboard: one HID interface carrying every report
//! kind plus a CDC ACM port for the command channel.
//!
//! The OTG_FS core of the STM32F411 only has 4 endpoints, including
//! the control one, and the CDC ACM class takes two IN endpoints by
//! itself. All the HID reports therefore share a single interrupt
//! endpoint and are told apart by their report id, which this module
//! prepends to the reports that do not carry one already.

use gojira_common::{dev_debug, dev_info, dev_trace, dev_warn};
use gojira_core::{
    command::USB_STRINGS,
    hid::{Endpoint, Link, REPORT_ID_CONSUMER, REPORT_ID_SYSTEM, TransportError},
};
use usb_device::{
    LangID, UsbError,
    bus::{UsbBus, UsbBusAllocator},
    class::UsbClass,
    device::{BuilderError, StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid},
    endpoint::EndpointAddress,
};
use usbd_hid::hid_class::{HIDClass, HidClassSettings, HidProtocol, HidSubClass};
use usbd_serial::SerialPort;

const REPORT_ID_MOUSE: u8 = 3;
const REPORT_ID_NKRO: u8 = 4;
const REPORT_ID_KEYBOARD: u8 = 5;

// Endpoints are handed out in allocation order, so the HID class,
// allocated first, owns IN endpoint 1.
const HID_IN_EP_INDEX: usize = 1;

const HID_POLL_MS: u8 = 1;

// Largest HID report, the NKRO one, plus its report id.
const HID_PACKET_LEN: usize = 32;

// usbd-serial never hands out more than a full speed packet per read.
const SERIAL_READ_LEN: usize = 64;

#[rustfmt::skip]
const REPORT_DESCRIPTOR: &[u8] = &[
    // 6KRO keyboard
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x06,         // Usage (Keyboard)
    0xa1, 0x01,         // Collection (Application)
    0x85, REPORT_ID_KEYBOARD, //  Report ID
    0x05, 0x07,         //  Usage Page (Keyboard)
    0x19, 0xe0,         //  Usage Minimum (Left Control)
    0x29, 0xe7,         //  Usage Maximum (Right GUI)
    0x15, 0x00,         //  Logical Minimum (0)
    0x25, 0x01,         //  Logical Maximum (1)
    0x75, 0x01,         //  Report Size (1)
    0x95, 0x08,         //  Report Count (8)
    0x81, 0x02,         //  Input (Data,Var,Abs)
    0x95, 0x01,         //  Report Count (1)
    0x75, 0x08,         //  Report Size (8)
    0x81, 0x01,         //  Input (Const)
    0x95, 0x06,         //  Report Count (6)
    0x75, 0x08,         //  Report Size (8)
    0x15, 0x00,         //  Logical Minimum (0)
    0x25, 0x65,         //  Logical Maximum (101)
    0x19, 0x00,         //  Usage Minimum (0)
    0x29, 0x65,         //  Usage Maximum (101)
    0x81, 0x00,         //  Input (Data,Arr,Abs)
    0xc0,               // End Collection

    // Mouse
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x02,         // Usage (Mouse)
    0xa1, 0x01,         // Collection (Application)
    0x85, REPORT_ID_MOUSE, //  Report ID
    0x09, 0x01,         //  Usage (Pointer)
    0xa1, 0x00,         //  Collection (Physical)
    0x05, 0x09,         //   Usage Page (Button)
    0x19, 0x01,         //   Usage Minimum (1)
    0x29, 0x05,         //   Usage Maximum (5)
    0x15, 0x00,         //   Logical Minimum (0)
    0x25, 0x01,         //   Logical Maximum (1)
    0x95, 0x05,         //   Report Count (5)
    0x75, 0x01,         //   Report Size (1)
    0x81, 0x02,         //   Input (Data,Var,Abs)
    0x95, 0x01,         //   Report Count (1)
    0x75, 0x03,         //   Report Size (3)
    0x81, 0x01,         //   Input (Const)
    0x05, 0x01,         //   Usage Page (Generic Desktop)
    0x09, 0x30,         //   Usage (X)
    0x09, 0x31,         //   Usage (Y)
    0x09, 0x38,         //   Usage (Wheel)
    0x15, 0x81,         //   Logical Minimum (-127)
    0x25, 0x7f,         //   Logical Maximum (127)
    0x75, 0x08,         //   Report Size (8)
    0x95, 0x03,         //   Report Count (3)
    0x81, 0x06,         //   Input (Data,Var,Rel)
    0x05, 0x0c,         //   Usage Page (Consumer)
    0x0a, 0x38, 0x02,   //   Usage (AC Pan)
    0x95, 0x01,         //   Report Count (1)
    0x81, 0x06,         //   Input (Data,Var,Rel)
    0xc0,               //  End Collection
    0xc0,               // End Collection

    // System control
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x80,         // Usage (System Control)
    0xa1, 0x01,         // Collection (Application)
    0x85, REPORT_ID_SYSTEM, //  Report ID
    0x19, 0x01,         //  Usage Minimum (1)
    0x2a, 0xb7, 0x00,   //  Usage Maximum (0xb7)
    0x15, 0x01,         //  Logical Minimum (1)
    0x26, 0xb7, 0x00,   //  Logical Maximum (0xb7)
    0x95, 0x01,         //  Report Count (1)
    0x75, 0x10,         //  Report Size (16)
    0x81, 0x00,         //  Input (Data,Arr,Abs)
    0xc0,               // End Collection

    // Consumer control
    0x05, 0x0c,         // Usage Page (Consumer)
    0x09, 0x01,         // Usage (Consumer Control)
    0xa1, 0x01,         // Collection (Application)
    0x85, REPORT_ID_CONSUMER, //  Report ID
    0x19, 0x01,         //  Usage Minimum (1)
    0x2a, 0xa0, 0x02,   //  Usage Maximum (0x2a0)
    0x15, 0x01,         //  Logical Minimum (1)
    0x26, 0xa0, 0x02,   //  Logical Maximum (0x2a0)
    0x95, 0x01,         //  Report Count (1)
    0x75, 0x10,         //  Report Size (16)
    0x81, 0x00,         //  Input (Data,Arr,Abs)
    0xc0,               // End Collection

    // NKRO keyboard
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x06,         // Usage (Keyboard)
    0xa1, 0x01,         // Collection (Application)
    0x85, REPORT_ID_NKRO, //  Report ID
    0x05, 0x07,         //  Usage Page (Keyboard)
    0x19, 0xe0,         //  Usage Minimum (Left Control)
    0x29, 0xe7,         //  Usage Maximum (Right GUI)
    0x15, 0x00,         //  Logical Minimum (0)
    0x25, 0x01,         //  Logical Maximum (1)
    0x75, 0x01,         //  Report Size (1)
    0x95, 0x08,         //  Report Count (8)
    0x81, 0x02,         //  Input (Data,Var,Abs)
    0x19, 0x04,         //  Usage Minimum (A)
    0x29, 0xe3,         //  Usage Maximum (0xe3)
    0x95, 0xe0,         //  Report Count (224)
    0x81, 0x02,         //  Input (Data,Var,Abs)
    0xc0,               // End Collection
];

/// Keeps track of the IN endpoints that still have a transfer in
/// flight. It owns no endpoint; usb-device hands every completion to
/// all the classes.
#[derive(Default)]
struct InFlight {
    busy: u8,
}

impl InFlight {
    fn start(&mut self, index: usize) {
        self.busy |= 1 << index;
    }

    fn is_busy(&self, index: usize) -> bool {
        self.busy & (1 << index) != 0
    }
}

impl<B: UsbBus> UsbClass<B> for InFlight {
    fn reset(&mut self) {
        self.busy = 0;
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        self.busy &= !(1 << addr.index());
    }
}

pub struct UsbLink<'a, B: UsbBus> {
    device: UsbDevice<'a, B>,
    hid: HIDClass<'a, B>,
    serial: SerialPort<'a, B>,
    in_flight: InFlight,
}

impl<'a, B: UsbBus> UsbLink<'a, B> {
    pub fn alloc(allocator: &'a UsbBusAllocator<B>, vid_pid: (u16, u16)) -> Result<Self, BuilderError> {
        let mut hid_settings = HidClassSettings::default();
        hid_settings.protocol = HidProtocol::Generic;
        hid_settings.subclass = HidSubClass::NoSubClass;

        // Allocation order matters, see `HID_IN_EP_INDEX`.
        let hid = HIDClass::new_ep_in_with_settings(allocator, REPORT_DESCRIPTOR, HID_POLL_MS, hid_settings);
        let serial = SerialPort::new(allocator);

        let device = UsbDeviceBuilder::new(allocator, UsbVidPid(vid_pid.0, vid_pid.1))
            .strings(&[StringDescriptors::new(LangID::EN_US)
                .manufacturer(USB_STRINGS[0])
                .product(USB_STRINGS[1])
                .serial_number(USB_STRINGS[2])])?
            .composite_with_iads()
            .build();

        Ok(Self { device, hid, serial, in_flight: InFlight::default() })
    }

    fn configured(&self) -> bool {
        self.device.state() == UsbDeviceState::Configured
    }

    fn write_hid(&mut self, report_id: Option<u8>, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut packet = [0u8; HID_PACKET_LEN];
        let offset = report_id.is_some() as usize;
        let len = offset + bytes.len();
        let dst = packet.get_mut(offset..len).ok_or(TransportError::Other)?;
        dst.copy_from_slice(bytes);
        if let Some(id) = report_id {
            packet[0] = id;
        }

        match self.hid.push_raw_input(&packet[..len]) {
            Ok(_) => {
                self.in_flight.start(HID_IN_EP_INDEX);
                Ok(bytes.len())
            }
            Err(UsbError::WouldBlock) => Err(TransportError::WouldBlock),
            Err(e) => {
                dev_warn!("HID write failed: {:?}", e);
                Err(TransportError::Other)
            }
        }
    }
}

impl<B: UsbBus> Link for UsbLink<'_, B> {
    fn poll(&mut self, on_serial_rx: &mut dyn FnMut(&[u8])) {
        let was_configured = self.configured();
        if !self.device.poll(&mut [&mut self.hid, &mut self.serial, &mut self.in_flight]) {
            return;
        }
        if !was_configured && self.configured() {
            dev_info!("USB configured");
        }

        // LED state set by the host. Nothing uses it.
        let mut out = [0u8; HID_PACKET_LEN];
        if let Ok(n) = self.hid.pull_raw_output(&mut out) {
            dev_debug!("HID output report: {:?}", &out[..n]);
        }

        let mut buf = [0u8; SERIAL_READ_LEN];
        loop {
            match self.serial.read(&mut buf) {
                Ok(0) | Err(UsbError::WouldBlock) => break,
                Ok(n) => {
                    dev_trace!("Serial rx {} bytes", n);
                    on_serial_rx(&buf[..n]);
                }
                Err(e) => {
                    dev_warn!("Serial read failed: {:?}", e);
                    break;
                }
            }
        }
    }

    fn is_active(&self, _endpoint: Endpoint) -> bool {
        self.configured()
    }

    fn is_idle(&self, endpoint: Endpoint) -> bool {
        if !self.configured() {
            return false;
        }
        match endpoint {
            // usbd-serial queues writes itself and only takes what fits.
            Endpoint::Serial => true,
            Endpoint::Keyboard | Endpoint::Mouse | Endpoint::ExtraKey | Endpoint::Nkro => {
                !self.in_flight.is_busy(HID_IN_EP_INDEX)
            }
        }
    }

    fn write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.configured() {
            return Err(TransportError::NotConfigured);
        }

        match endpoint {
            Endpoint::Keyboard => self.write_hid(Some(REPORT_ID_KEYBOARD), bytes),
            Endpoint::Mouse => self.write_hid(Some(REPORT_ID_MOUSE), bytes),
            Endpoint::Nkro => self.write_hid(Some(REPORT_ID_NKRO), bytes),
            // Already starts with its report id.
            Endpoint::ExtraKey => self.write_hid(None, bytes),
            Endpoint::Serial => match self.serial.write(bytes) {
                Ok(n) => Ok(n),
                Err(UsbError::WouldBlock) => Err(TransportError::WouldBlock),
                Err(_) => Err(TransportError::Other),
            },
        }
    }
}
