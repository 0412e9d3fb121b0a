//! GPIO edge-detection interrupt line

use super::Interrupt;
use crate::error::{Error, Result};
use gpiocdev::line::EdgeDetection;
use gpiocdev::request::{Config, Request};
use std::time::Duration;

/// Rising-edge interrupt line requested through the GPIO character device.
pub struct GpioInterrupt {
    request: Request,
}

impl GpioInterrupt {
    /// Request a line as an input with rising-edge detection
    ///
    /// # Arguments
    /// * `chip` - GPIO chip path (e.g., "/dev/gpiochip4")
    /// * `line` - Line offset on the chip (e.g., 17)
    pub fn open(chip: &str, line: u32) -> Result<Self> {
        let mut config = Config::default();
        config
            .with_line(line)
            .as_input()
            .with_edge_detection(EdgeDetection::RisingEdge);

        let request = Request::from_config(config)
            .on_chip(chip)
            .with_consumer("cxd5610-io")
            .request()
            .map_err(|e| Error::Gpio(format!("failed to request {chip} line {line}: {e}")))?;

        log::info!("GPIO: watching {} line {} for rising edges", chip, line);

        Ok(GpioInterrupt { request })
    }

    fn drain_pending(&self) -> Result<()> {
        // A glitching line can queue several edges per transfer window; a
        // stale queued edge must not satisfy a later wait.
        while self
            .request
            .has_edge_event()
            .map_err(|e| Error::Gpio(format!("edge event query failed: {e}")))?
        {
            self.request
                .read_edge_event()
                .map_err(|e| Error::Gpio(format!("edge event read failed: {e}")))?;
        }
        Ok(())
    }
}

impl Interrupt for GpioInterrupt {
    fn wait_edge(&mut self, timeout_ms: u32) -> Result<()> {
        let available = if timeout_ms == 0 {
            self.request
                .has_edge_event()
                .map_err(|e| Error::Gpio(format!("edge event query failed: {e}")))?
        } else {
            self.request
                .wait_edge_event(Duration::from_millis(timeout_ms as u64))
                .map_err(|e| Error::Gpio(format!("edge event wait failed: {e}")))?
        };

        if !available {
            return Err(Error::Timeout);
        }

        self.drain_pending()?;
        Ok(())
    }
}
