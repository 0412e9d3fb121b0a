//! Session state machine: command exchange, receiver configuration, fault
//! recovery and the background acquisition loop

use super::notify;
use super::protocol::{
    build_frame, MAX_COMMAND_PAYLOAD, NOTIFY_SUBSCRIPTION, NOTIFY_THRESHOLD,
    OPC_BINARY_OUTPUT_SET, OPC_GNSS_SAT_SETTING, OPC_GNSS_START, OPC_GNSS_STOP,
    OPC_SYS_STATE_CHANGE, SAT_SYSTEM_MASK, START_MODE_HOT, STATE_RESET, STATE_WAKEUP,
};
use super::reader::PacketReader;
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use crate::transport::Transport;
use crate::types::{DriverStats, GnssFix};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Per-step reply timeout during receiver configuration
pub(crate) const CONFIGURE_STEP_TIMEOUT_MS: i32 = 3000;

/// Reply timeout for the best-effort stop command during close
pub(crate) const CLOSE_STOP_TIMEOUT_MS: i32 = 1000;

/// Consecutive read faults before the session is reinitialized
const FAULT_STREAK_LIMIT: u32 = 5;

const STATS_LOG_INTERVAL: u64 = 1000;

/// Counters shared between the session and the driver handle.
#[derive(Default)]
pub(crate) struct SessionStats {
    pub(crate) packets: AtomicU64,
    pub(crate) notifies: AtomicU64,
    pub(crate) quiet_errors: AtomicU64,
    pub(crate) recoveries: AtomicU64,
}

impl SessionStats {
    pub(crate) fn snapshot(&self) -> DriverStats {
        DriverStats {
            packets: self.packets.load(Ordering::Relaxed),
            notifies: self.notifies.load(Ordering::Relaxed),
            quiet_errors: self.quiet_errors.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
        }
    }
}

/// Fix and session flags shared between the worker and consumers.
pub(crate) struct StateInner {
    pub(crate) fix: GnssFix,
    pub(crate) ready: bool,
    pub(crate) data_valid: bool,
    pub(crate) err_streak: u32,
    pub(crate) last_opc: i32,
    pub(crate) sample_seq: u64,
}

pub(crate) struct SharedState {
    pub(crate) inner: Mutex<StateInner>,
    pub(crate) cond: Condvar,
    pub(crate) running: AtomicBool,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        SharedState {
            inner: Mutex::new(StateInner {
                fix: GnssFix::unknown(),
                ready: false,
                data_valid: false,
                err_streak: 0,
                last_opc: -1,
                sample_seq: 0,
            }),
            cond: Condvar::new(),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One receiver session: owns the packet reader and drives the command
/// and notification exchange. Runs on the worker thread in threaded mode,
/// or inline under the driver handle in polling mode.
pub(crate) struct Session {
    reader: PacketReader,
    state: Arc<SharedState>,
    stats: Arc<SessionStats>,
    shutdown: Arc<AtomicBool>,
    boot_seen: bool,
    sleeping: bool,
}

impl Session {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        interrupt: Box<dyn Interrupt>,
        state: Arc<SharedState>,
        stats: Arc<SessionStats>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Session {
            reader: PacketReader::new(transport, interrupt, shutdown.clone(), stats.clone()),
            state,
            stats,
            shutdown,
            boot_seen: false,
            sleeping: true,
        }
    }

    /// Send one command frame and wait for its status reply.
    ///
    /// Notifications arriving before the reply are decoded and folded into
    /// the shared fix. The first read skips the interrupt wait and runs
    /// quietly; a receiver that just got a command usually has the reply
    /// pending already, and anything else in the pipe is stale.
    pub(crate) fn send_command(&mut self, opc: u8, payload: &[u8], timeout_ms: i32) -> Result<i8> {
        if payload.len() > MAX_COMMAND_PAYLOAD {
            return Err(Error::InvalidArgument(format!(
                "command payload of {} bytes exceeds {} byte limit",
                payload.len(),
                MAX_COMMAND_PAYLOAD
            )));
        }

        let frame = build_frame(opc, payload);
        self.reader.write_frame(&frame)?;

        let mut first_try = true;
        while !self.shutdown.load(Ordering::SeqCst) {
            let use_timeout = if first_try { 0 } else { timeout_ms };
            let (ropc, rlen) = self.reader.read_packet(use_timeout, first_try)?;
            first_try = false;

            if ropc < NOTIFY_THRESHOLD {
                if ropc == OPC_SYS_STATE_CHANGE && rlen > 0 {
                    let state_code = self.reader.payload(ropc, rlen)[0];
                    if state_code == STATE_RESET && !self.boot_seen {
                        self.boot_seen = true;
                        log::info!("CXD5610: receiver boot complete");
                    } else if state_code == STATE_WAKEUP && self.sleeping {
                        self.sleeping = false;
                        log::info!("CXD5610: receiver left sleep state");
                    }
                }

                let status = if rlen > 0 {
                    self.reader.payload(ropc, rlen)[0] as i8
                } else {
                    0
                };
                return Ok(status);
            }

            let mut st = self.state.lock();
            notify::dispatch(ropc, self.reader.payload(ropc, rlen), &mut st.fix);
            drop(st);
            self.stats.notifies.fetch_add(1, Ordering::Relaxed);
        }

        Err(Error::Transport("command interrupted by shutdown".to_string()))
    }

    /// Run the bring-up sequence: stop, satellite systems, notification
    /// subscription, start. Returns the final status byte.
    pub(crate) fn configure(&mut self) -> Result<i8> {
        {
            let mut st = self.state.lock();
            st.fix.reset();
        }

        let status = self.config_step(OPC_GNSS_STOP, &[])?;
        if status < 0 {
            return Ok(status);
        }
        let status = self.config_step(OPC_GNSS_SAT_SETTING, &SAT_SYSTEM_MASK)?;
        if status < 0 {
            return Ok(status);
        }
        let status = self.config_step(OPC_BINARY_OUTPUT_SET, &NOTIFY_SUBSCRIPTION)?;
        if status < 0 {
            return Ok(status);
        }
        self.config_step(OPC_GNSS_START, &[START_MODE_HOT])
    }

    fn config_step(&mut self, opc: u8, payload: &[u8]) -> Result<i8> {
        match self.send_command(opc, payload, CONFIGURE_STEP_TIMEOUT_MS) {
            // A receiver that is still booting stays silent; a missing
            // reply during bring-up is not a failure.
            Err(e) if e.is_transient() => {
                log::debug!("CXD5610: no reply to command 0x{opc:02x} during bring-up ({e})");
                Ok(0)
            }
            other => other,
        }
    }

    /// Reopen the bus and rerun the bring-up sequence after a fault streak.
    fn recover(&mut self) {
        if let Err(e) = self.reader.reopen() {
            log::error!("CXD5610: recovery reopen failed: {e}");
            return;
        }

        let result = self.configure();
        match &result {
            Ok(status) => log::info!("CXD5610: session restart result={status}"),
            Err(e) => log::warn!("CXD5610: session restart failed: {e}"),
        }

        let mut st = self.state.lock();
        match result {
            Ok(status) => {
                st.ready = status == 0;
                if status < 0 {
                    st.data_valid = false;
                }
            }
            Err(_) => {
                st.ready = false;
                st.data_valid = false;
            }
        }
        st.err_streak = 0;
        drop(st);

        self.stats.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Account one worker-loop read fault and escalate to recovery after
    /// a streak of them.
    fn note_fault(&mut self, err: &Error, first_loop: &mut bool) {
        if err.is_transient() {
            if *first_loop {
                // Stale bytes from a previous run are expected right
                // after bring-up
                *first_loop = false;
                self.state.lock().err_streak = 0;
                log::debug!("CXD5610: ignoring startup read fault: {err}");
                return;
            }

            log::warn!("CXD5610: read fault ({err}), reopening I2C");
            if let Err(e) = self.reader.reopen() {
                log::error!("CXD5610: reopen failed: {e}");
            }
        } else {
            log::error!("CXD5610: read error: {err}");
        }

        let streak = {
            let mut st = self.state.lock();
            st.err_streak += 1;
            st.err_streak
        };
        if streak >= FAULT_STREAK_LIMIT {
            log::warn!("CXD5610: {streak} consecutive faults, reinitializing session");
            self.recover();
        }
    }

    /// Worker-thread body. Configures the receiver, then reads packets
    /// until the shared running flag drops. Returns the session so the
    /// driver can issue the final stop command after joining.
    pub(crate) fn run(mut self) -> Session {
        let bringup = self.configure();
        {
            let mut st = self.state.lock();
            st.ready = matches!(bringup, Ok(0));
            st.data_valid = false;
            st.last_opc = match &bringup {
                Ok(status) => *status as i32,
                Err(_) => -1,
            };
        }

        let status = match bringup {
            Ok(status) => status,
            Err(e) => {
                log::error!("CXD5610: session bring-up failed: {e}");
                return self;
            }
        };
        if status < 0 {
            log::error!("CXD5610: receiver rejected bring-up (status {status})");
            return self;
        }
        if status > 0 {
            log::warn!("CXD5610: bring-up finished with status {status}");
        }

        let mut first_loop = true;
        while self.state.running.load(Ordering::SeqCst) {
            match self.reader.read_packet(-1, first_loop) {
                Err(e) => {
                    if !self.state.running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.note_fault(&e, &mut first_loop);
                }
                Ok((opc, len)) => {
                    first_loop = false;
                    self.stats.packets.fetch_add(1, Ordering::Relaxed);

                    let mut st = self.state.lock();
                    st.err_streak = 0;
                    st.last_opc = opc as i32;
                    if opc < NOTIFY_THRESHOLD {
                        // Command reply: keep the opcode for diagnostics
                        continue;
                    }

                    notify::dispatch(opc, self.reader.payload(opc, len), &mut st.fix);
                    st.data_valid = true;
                    st.sample_seq += 1;
                    self.state.cond.notify_all();
                    drop(st);

                    let notifies = self.stats.notifies.fetch_add(1, Ordering::Relaxed) + 1;
                    if notifies % STATS_LOG_INTERVAL == 0 {
                        log::debug!("CXD5610: {notifies} notifications processed");
                    }
                }
            }
        }

        self
    }

    /// Blocking single-packet read for polling mode.
    pub(crate) fn read_direct(&mut self, timeout_ms: i32) -> Result<(GnssFix, i32)> {
        let (opc, len) = self.reader.read_packet(timeout_ms, false)?;
        self.stats.packets.fetch_add(1, Ordering::Relaxed);

        let mut st = self.state.lock();
        if opc >= NOTIFY_THRESHOLD {
            notify::dispatch(opc, self.reader.payload(opc, len), &mut st.fix);
            self.stats.notifies.fetch_add(1, Ordering::Relaxed);
        }
        Ok((st.fix, opc as i32))
    }
}
