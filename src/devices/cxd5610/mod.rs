//! Sony CXD5610 GNSS receiver driver
//!
//! Talks to the receiver over an I2C character device with a data-ready
//! GPIO line. A background worker brings the receiver up, then folds the
//! notification stream into a latest-fix snapshot that [`GnssDriver::read`]
//! hands out. A polling variant drives the bus directly from `read` for
//! receivers that are already configured.

mod notify;
mod protocol;
mod reader;
mod session;

use self::protocol::OPC_GNSS_STOP;
use self::session::{Session, SessionStats, SharedState, CLOSE_STOP_TIMEOUT_MS};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::interrupt::{GpioInterrupt, Interrupt};
use crate::transport::{I2cTransport, Transport};
use crate::types::{DriverStats, GnssFix};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Runtime {
    /// Worker thread owns the session; joined at close
    Running(JoinHandle<Session>),
    /// Polling mode: the session is driven by the caller
    Direct(Box<Session>),
    Closed,
}

/// Handle to one receiver session.
///
/// Cloneable state sits behind `Arc`s so the worker thread and this handle
/// observe the same fix, flags and counters. Dropping the handle closes
/// the session.
pub struct GnssDriver {
    state: Arc<SharedState>,
    stats: Arc<SessionStats>,
    shutdown: Arc<AtomicBool>,
    runtime: Mutex<Runtime>,
}

impl GnssDriver {
    /// Open the I2C bus and interrupt line named by the configuration and
    /// start the background acquisition thread.
    pub fn create(config: &DeviceConfig) -> Result<GnssDriver> {
        let transport = I2cTransport::open(&config.i2c_bus, config.i2c_address)?;
        let interrupt = GpioInterrupt::open(&config.gpio_chip, config.irq_line)?;
        GnssDriver::from_parts(Box::new(transport), Box::new(interrupt), true)
    }

    /// Like [`GnssDriver::create`] but without the worker thread: every
    /// [`GnssDriver::read`] performs one bus exchange. No bring-up sequence
    /// is issued; this expects an already-configured receiver.
    pub fn create_polling(config: &DeviceConfig) -> Result<GnssDriver> {
        let transport = I2cTransport::open(&config.i2c_bus, config.i2c_address)?;
        let interrupt = GpioInterrupt::open(&config.gpio_chip, config.irq_line)?;
        GnssDriver::from_parts(Box::new(transport), Box::new(interrupt), false)
    }

    pub(crate) fn from_parts(
        transport: Box<dyn Transport>,
        interrupt: Box<dyn Interrupt>,
        threaded: bool,
    ) -> Result<GnssDriver> {
        let state = Arc::new(SharedState::new());
        let stats = Arc::new(SessionStats::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let session = Session::new(
            transport,
            interrupt,
            state.clone(),
            stats.clone(),
            shutdown.clone(),
        );

        let runtime = if threaded {
            state.running.store(true, Ordering::SeqCst);
            let handle = thread::Builder::new()
                .name("cxd5610-worker".to_string())
                .spawn(move || session.run())
                .map_err(|e| {
                    state.running.store(false, Ordering::SeqCst);
                    Error::Other(format!("failed to spawn worker thread: {e}"))
                })?;
            Runtime::Running(handle)
        } else {
            Runtime::Direct(Box::new(session))
        };

        Ok(GnssDriver {
            state,
            stats,
            shutdown,
            runtime: Mutex::new(runtime),
        })
    }

    /// Wait for a fresh fix.
    ///
    /// A negative timeout blocks until a sample arrives, zero returns
    /// immediately and a positive value bounds the wait in milliseconds.
    /// Returns the fix together with the opcode of the packet that
    /// produced it.
    pub fn read(&self, timeout_ms: i32) -> Result<(GnssFix, i32)> {
        {
            let mut runtime = self.lock_runtime();
            match &mut *runtime {
                // Worker mode: consume from the published snapshot below,
                // without holding the runtime lock across the wait
                Runtime::Running(_) => {}
                Runtime::Direct(session) => return session.read_direct(timeout_ms),
                Runtime::Closed => {
                    return Err(Error::InvalidArgument("driver already closed".to_string()))
                }
            }
        }
        self.read_published(timeout_ms)
    }

    fn read_published(&self, timeout_ms: i32) -> Result<(GnssFix, i32)> {
        let mut st = self.state.lock();
        let start_seq = st.sample_seq;
        let deadline = if timeout_ms > 0 {
            Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
        } else {
            None
        };

        while self.state.running.load(Ordering::SeqCst)
            && (!st.data_valid || st.sample_seq == start_seq)
        {
            if timeout_ms == 0 {
                return Err(Error::WouldBlock);
            }

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout);
                }
                let (guard, wait) = self
                    .state
                    .cond
                    .wait_timeout(st, deadline - now)
                    .unwrap_or_else(|e| e.into_inner());
                st = guard;
                if wait.timed_out() {
                    return Err(Error::Timeout);
                }
            } else {
                st = self.state.cond.wait(st).unwrap_or_else(|e| e.into_inner());
            }
        }

        if !self.state.running.load(Ordering::SeqCst) || !st.data_valid {
            return Err(Error::Transport("session stopped".to_string()));
        }

        Ok((st.fix, st.last_opc))
    }

    /// Stop the worker, issue a best-effort receiver stop and release the
    /// session. Further calls on this handle fail.
    pub fn close(&self) -> Result<()> {
        let runtime = {
            let mut guard = self.lock_runtime();
            mem::replace(&mut *guard, Runtime::Closed)
        };

        let mut session = match runtime {
            Runtime::Running(handle) => {
                self.shutdown.store(true, Ordering::SeqCst);
                {
                    let _st = self.state.lock();
                    self.state.running.store(false, Ordering::SeqCst);
                    self.state.cond.notify_all();
                }
                handle
                    .join()
                    .map_err(|_| Error::Other("worker thread panicked".to_string()))?
            }
            Runtime::Direct(session) => {
                self.shutdown.store(true, Ordering::SeqCst);
                self.state.running.store(false, Ordering::SeqCst);
                *session
            }
            Runtime::Closed => {
                return Err(Error::InvalidArgument("driver already closed".to_string()))
            }
        };

        // The stop frame still reaches the wire; with the shutdown flag
        // set no reply is awaited
        if let Err(e) = session.send_command(OPC_GNSS_STOP, &[], CLOSE_STOP_TIMEOUT_MS) {
            log::warn!("CXD5610: stop during close failed: {e}");
        }
        log::info!("CXD5610: session closed");
        Ok(())
    }

    /// True once the bring-up sequence has completed successfully.
    pub fn ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> DriverStats {
        self.stats.snapshot()
    }

    fn lock_runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for GnssDriver {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
