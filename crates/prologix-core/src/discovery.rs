//! Finding Prologix adapters among the attached serial ports.

use crate::error::{Error, Result};
use serialport::{SerialPortInfo, SerialPortType};

/// The parts of a serial port listing used to recognise an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: &'static str,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let mut port = Self {
            port_name: info.port_name,
            port_type: "Unknown",
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.port_type = "USB";
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
            }
            SerialPortType::PciPort => port.port_type = "PCI",
            SerialPortType::BluetoothPort => port.port_type = "Bluetooth",
            SerialPortType::Unknown => {}
        }
        port
    }
}

impl PortInfo {
    /// Human readable description: the USB product string, then the
    /// manufacturer, then the port type.
    pub fn description(&self) -> &str {
        self.product
            .as_deref()
            .or(self.manufacturer.as_deref())
            .unwrap_or(self.port_type)
    }

    pub fn is_prologix(&self) -> bool {
        self.description().to_lowercase().contains("prologix")
    }
}

pub fn list_ports() -> Result<Vec<PortInfo>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect())
}

/// Keeps only the ports that describe themselves as Prologix adapters.
pub fn filter_prologix<I>(ports: I) -> Result<Vec<PortInfo>>
where
    I: IntoIterator<Item = PortInfo>,
{
    let found: Vec<PortInfo> = ports.into_iter().filter(PortInfo::is_prologix).collect();
    if found.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(found)
}

pub fn find_prologix() -> Result<Vec<PortInfo>> {
    let found = filter_prologix(list_ports()?)?;
    for port in &found {
        log::debug!("found {} ({})", port.port_name, port.description());
    }
    Ok(found)
}
