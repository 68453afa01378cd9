use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lvx_protocol::command::{Command, HeartbeatAck, general};
use lvx_protocol::status::HealthSnapshot;
use lvx_protocol::{CommandSet, Frame, FrameType, SENSOR_CMD_PORT};
use tracing::{debug, warn};

use crate::error::{FatalPolicy, FatalReason};
use crate::net::{self, POLL_YIELD};
use crate::sink::MessageSink;

pub(crate) const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// How long any command waits for its ack.
pub(crate) const ACK_TIMEOUT: Duration = Duration::from_millis(100);

/// State shared between the session owner, the heartbeat task and capture.
pub(crate) struct SessionShared {
    pub(crate) heartbeat_running: AtomicBool,
    /// Last work state from a heartbeat ack; -1 before the first one.
    pub(crate) work_state: AtomicI8,
    pub(crate) health: Mutex<HealthSnapshot>,
    pub(crate) fatal: Mutex<Option<FatalReason>>,
    pub(crate) dropped_frames: AtomicU64,
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            heartbeat_running: AtomicBool::new(false),
            work_state: AtomicI8::new(-1),
            health: Mutex::new(HealthSnapshot::default()),
            fatal: Mutex::new(None),
            dropped_frames: AtomicU64::new(0),
        }
    }

    pub(crate) fn fatal_reason(&self) -> Option<FatalReason> {
        *self.fatal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn update_health(&self, word: lvx_protocol::status::HealthWord) {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(word);
    }
}

/// Records the fatal reason first, then applies the configured policy.
pub(crate) fn raise_fatal(shared: &SessionShared, policy: FatalPolicy, reason: FatalReason) {
    {
        let mut fatal = shared.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        fatal.get_or_insert(reason);
    }
    if policy == FatalPolicy::ExitProcess {
        std::process::exit(reason.exit_code());
    }
}

/// Serialises heartbeat traffic and command traffic on the command socket.
///
/// The heartbeat holds the lock for the duration of each beat, then counts
/// the level down from the release boundary while it sleeps. Commands
/// try-acquire only while the level sits at the boundary, i.e. in the window
/// right after a completed beat.
pub(crate) struct IdleGate {
    busy: Mutex<()>,
    level: AtomicU8,
}

impl IdleGate {
    pub(crate) const RELEASE: u8 = 9;

    pub(crate) fn new() -> Self {
        Self {
            busy: Mutex::new(()),
            level: AtomicU8::new(0),
        }
    }

    /// Blocks until the release window is open and the lock is free.
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        loop {
            if self.level.load(Ordering::Acquire) == Self::RELEASE {
                if let Ok(guard) = self.busy.try_lock() {
                    if self.level.load(Ordering::Acquire) == Self::RELEASE {
                        return guard;
                    }
                    drop(guard);
                }
            }
            thread::sleep(POLL_YIELD);
        }
    }

    fn lock_for_beat(&self) -> MutexGuard<'_, ()> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_level(&self, level: u8) {
        self.level.store(level, Ordering::Release);
    }
}

pub(crate) struct HeartbeatHandle {
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    pub(crate) fn stop(&mut self, shared: &SessionShared, gate: &IdleGate) {
        shared.heartbeat_running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _joined = thread.join();
        }
        // leave the gate open so later teardown commands cannot hang
        gate.set_level(IdleGate::RELEASE);
    }
}

pub(crate) fn spawn(
    socket: UdpSocket,
    sensor_ip: Ipv4Addr,
    shared: Arc<SessionShared>,
    gate: Arc<IdleGate>,
    sink: MessageSink,
    policy: FatalPolicy,
) -> HeartbeatHandle {
    shared.heartbeat_running.store(true, Ordering::Release);
    let thread = thread::spawn(move || run(&socket, sensor_ip, &shared, &gate, &sink, policy));
    HeartbeatHandle {
        thread: Some(thread),
    }
}

fn run(
    socket: &UdpSocket,
    sensor_ip: Ipv4Addr,
    shared: &SessionShared,
    gate: &IdleGate,
    sink: &MessageSink,
    policy: FatalPolicy,
) {
    let heartbeat = Command::Heartbeat.encode();
    let mut buf = [0_u8; 256];

    'beats: while shared.heartbeat_running.load(Ordering::Acquire) {
        {
            let _guard = gate.lock_for_beat();
            if let Err(err) = socket.send_to(&heartbeat, (sensor_ip, SENSOR_CMD_PORT)) {
                warn!(%err, "heartbeat send failed");
            } else {
                match net::recv_within(socket, ACK_TIMEOUT, &mut buf) {
                    Ok(Some(len)) => {
                        handle_response(&buf[..len], sensor_ip, shared, sink, policy);
                    }
                    Ok(None) => debug!("heartbeat ack missed"),
                    Err(err) => warn!(%err, "heartbeat receive failed"),
                }
            }
        }
        for level in (0..=IdleGate::RELEASE).rev() {
            gate.set_level(level);
            thread::sleep(HEARTBEAT_INTERVAL / 10);
            if !shared.heartbeat_running.load(Ordering::Acquire) {
                break 'beats;
            }
        }
    }
}

fn handle_response(
    datagram: &[u8],
    sensor_ip: Ipv4Addr,
    shared: &SessionShared,
    sink: &MessageSink,
    policy: FatalPolicy,
) {
    let frame = match Frame::parse(datagram) {
        Ok(frame) => frame,
        Err(err) => {
            shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
            debug!(%err, "dropped malformed frame on command socket");
            return;
        }
    };

    match (frame.frame_type, frame.cmd_set, frame.cmd_id) {
        (FrameType::Ack, CommandSet::General, general::HEARTBEAT) => {
            match HeartbeatAck::parse(frame.payload) {
                Ok(ack) if ack.ret_code == 0 => {
                    shared.work_state.store(ack.work_state as i8, Ordering::Release);
                    shared.update_health(ack.status);
                    if ack.work_state == 4 || ack.status.system() == 2 {
                        sink.note(sensor_ip, "*** ERROR: HEARTBEAT ERROR MESSAGE RECEIVED ***");
                        raise_fatal(shared, policy, FatalReason::HeartbeatError);
                    }
                }
                _ => sink.note(sensor_ip, "incorrect heartbeat response"),
            }
        }
        (FrameType::Message, CommandSet::General, general::ABNORMAL_STATUS) => {
            sink.note(sensor_ip, "*** ERROR: ABNORMAL STATUS MESSAGE RECEIVED ***");
            raise_fatal(shared, policy, FatalReason::AbnormalStatus);
        }
        _ => sink.note(sensor_ip, "incorrect heartbeat response"),
    }
}
