use crate::decode::PhysDecodeLevel;
#[cfg(feature = "serial")]
use crate::error::RequestError;
use std::fmt::Write;
#[cfg(feature = "serial")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[cfg(feature = "serial")]
pub(crate) struct PhysLayer {
    layer: PhysLayerImpl,
}

// encapsulates all possible physical layers as an enum
#[cfg(feature = "serial")]
pub(crate) enum PhysLayerImpl {
    Serial(tokio_serial::SerialStream),
    #[cfg(test)]
    Mock(sfio_tokio_mock_io::Mock),
    #[cfg(test)]
    Duplex(tokio::io::DuplexStream),
}

#[cfg(feature = "serial")]
impl std::fmt::Debug for PhysLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.layer {
            PhysLayerImpl::Serial(_) => f.write_str("Serial"),
            #[cfg(test)]
            PhysLayerImpl::Mock(_) => f.write_str("Mock"),
            #[cfg(test)]
            PhysLayerImpl::Duplex(_) => f.write_str("Duplex"),
        }
    }
}

#[cfg(feature = "serial")]
impl PhysLayer {
    pub(crate) fn new_serial(stream: tokio_serial::SerialStream) -> Self {
        Self {
            layer: PhysLayerImpl::Serial(stream),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_mock(mock: sfio_tokio_mock_io::Mock) -> Self {
        Self {
            layer: PhysLayerImpl::Mock(mock),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_duplex(stream: tokio::io::DuplexStream) -> Self {
        Self {
            layer: PhysLayerImpl::Duplex(stream),
        }
    }

    pub(crate) async fn read(
        &mut self,
        buffer: &mut [u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<usize, std::io::Error> {
        let length = match &mut self.layer {
            PhysLayerImpl::Serial(x) => x.read(buffer).await?,
            #[cfg(test)]
            PhysLayerImpl::Mock(x) => x.read(buffer).await?,
            #[cfg(test)]
            PhysLayerImpl::Duplex(x) => x.read(buffer).await?,
        };

        if decode_level.enabled() {
            if let Some(x) = buffer.get(0..length) {
                tracing::info!("PHYS RX - {}", PhysDisplay::new(decode_level, x))
            }
        }

        Ok(length)
    }

    /// Write as much of `data` as the port accepts in one operation
    ///
    /// Returns the number of bytes written. The port is flushed once the last byte is taken.
    pub(crate) async fn write(
        &mut self,
        data: &[u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<usize, std::io::Error> {
        let count = match &mut self.layer {
            PhysLayerImpl::Serial(x) => {
                let count = x.write(data).await?;
                if count == data.len() {
                    x.flush().await?;
                }
                count
            }
            #[cfg(test)]
            PhysLayerImpl::Mock(x) => x.write(data).await?,
            #[cfg(test)]
            PhysLayerImpl::Duplex(x) => x.write(data).await?,
        };

        if decode_level.enabled() {
            if let Some(x) = data.get(0..count) {
                tracing::info!("PHYS TX - {}", PhysDisplay::new(decode_level, x));
            }
        }

        Ok(count)
    }

    /// Discard anything pending in the driver's input and output buffers
    pub(crate) fn clear(&mut self) -> Result<(), RequestError> {
        match &mut self.layer {
            PhysLayerImpl::Serial(x) => {
                use tokio_serial::SerialPort;
                x.clear(tokio_serial::ClearBuffer::All)?;
                Ok(())
            }
            #[cfg(test)]
            PhysLayerImpl::Mock(_) | PhysLayerImpl::Duplex(_) => Ok(()),
        }
    }
}

pub(crate) struct PhysDisplay<'a> {
    level: PhysDecodeLevel,
    data: &'a [u8],
}

impl<'a> PhysDisplay<'a> {
    pub(crate) fn new(level: PhysDecodeLevel, data: &'a [u8]) -> Self {
        PhysDisplay { level, data }
    }
}

impl std::fmt::Display for PhysDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} bytes", self.data.len())?;
        if self.level.data_enabled() {
            format_bytes(f, self.data)?;
        }
        Ok(())
    }
}

const BYTES_PER_DECODE_LINE: usize = 18;

pub(crate) fn format_bytes(f: &mut std::fmt::Formatter, bytes: &[u8]) -> std::fmt::Result {
    for chunk in bytes.chunks(BYTES_PER_DECODE_LINE) {
        writeln!(f)?;
        let mut first = true;
        for byte in chunk {
            if !first {
                f.write_char(' ')?;
            }
            first = false;
            write!(f, "{byte:02X?}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bytes<'a>(&'a [u8]);

    impl std::fmt::Display for Bytes<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            format_bytes(f, self.0)
        }
    }

    #[test]
    fn formats_bytes_as_hex_lines() {
        assert_eq!(Bytes(&[0x01, 0x0A, 0xFF]).to_string(), "\n01 0A FF");
        let long = [0u8; 20];
        assert_eq!(Bytes(&long).to_string().lines().count(), 3);
    }

    #[test]
    fn length_only_display() {
        let display = PhysDisplay::new(PhysDecodeLevel::Length, &[0x01, 0x02]);
        assert_eq!(display.to_string(), "2 bytes");
    }
}
