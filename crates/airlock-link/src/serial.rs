//! 串口后端
//!
//! 基于 `serialport`，8N1、缺省 115200 波特。读取采用短超时（10ms 级），
//! 超时映射为 `Ok(0)`：空闲对端不是错误。

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::{
    ByteChannel, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DeviceError, DeviceErrorKind, LinkError,
    RxChannel, SplittableChannel, TxChannel,
};

/// 串口字节通道
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialChannel {
    /// 以缺省参数打开串口（115200-8N1，10ms 读超时）
    pub fn open(path: &str) -> Result<Self, LinkError> {
        Self::open_with(path, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }

    /// 以显式波特率与读超时打开串口
    pub fn open_with(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| LinkError::Device(map_serial_error(path, e)))?;
        info!(port = path, baud_rate, "serial channel opened");
        Ok(Self {
            port,
            name: path.to_string(),
        })
    }

    /// 串口名（如 "/dev/ttyUSB0"）
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteChannel for SerialChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        read_bounded(self.port.as_mut(), buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.port.flush()?;
        Ok(())
    }
}

impl SplittableChannel for SerialChannel {
    type Rx = SerialRx;
    type Tx = SerialTx;

    /// 克隆底层句柄，读写两半各持一个
    fn split(self) -> Result<(Self::Rx, Self::Tx), LinkError> {
        let rx_port = self
            .port
            .try_clone()
            .map_err(|e| LinkError::Device(map_serial_error(&self.name, e)))?;
        debug!(port = %self.name, "serial channel split into rx/tx halves");
        Ok((SerialRx { port: rx_port }, SerialTx { port: self.port }))
    }
}

/// 串口只读半通道
pub struct SerialRx {
    port: Box<dyn SerialPort>,
}

impl RxChannel for SerialRx {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        read_bounded(self.port.as_mut(), buf)
    }
}

/// 串口只写半通道
pub struct SerialTx {
    port: Box<dyn SerialPort>,
}

impl TxChannel for SerialTx {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.port.flush()?;
        Ok(())
    }
}

/// 列出系统可见的串口名
pub fn list_ports() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports()
        .map_err(|e| LinkError::Device(map_serial_error("<enumerate>", e)))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn read_bounded(port: &mut dyn SerialPort, buf: &mut [u8]) -> Result<usize, LinkError> {
    match port.read(buf) {
        Ok(n) => Ok(n),
        // 短超时到期 = 当前无数据，正常
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
        Err(e) => Err(LinkError::Io(e)),
    }
}

fn map_serial_error(port: &str, e: serialport::Error) -> DeviceError {
    let kind = match e.kind {
        serialport::ErrorKind::NoDevice => DeviceErrorKind::NoDevice,
        serialport::ErrorKind::InvalidInput => DeviceErrorKind::UnsupportedConfig,
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => DeviceErrorKind::NotFound,
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            DeviceErrorKind::AccessDenied
        },
        _ => DeviceErrorKind::Unknown,
    };
    DeviceError::new(kind, format!("{port}: {}", e.description))
}
