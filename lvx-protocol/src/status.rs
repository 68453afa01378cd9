use std::fmt::{self, Display};

use serde::Serialize;

use crate::error::ProtocolError;

/// The 4-byte status word carried in every point/IMU packet header and in
/// every heartbeat ack, in packet byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthWord([u8; 4]);

impl HealthWord {
    #[must_use]
    pub fn from_le(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    // Field positions follow the device documentation: bit 0 is the most
    // significant bit of the first byte on the wire.

    #[must_use]
    pub fn temperature(self) -> u8 {
        (self.0[0] >> 6) & 0b11
    }

    #[must_use]
    pub fn voltage(self) -> u8 {
        (self.0[0] >> 4) & 0b11
    }

    #[must_use]
    pub fn motor(self) -> u8 {
        (self.0[0] >> 2) & 0b11
    }

    /// Dirty/blocked optics warning.
    #[must_use]
    pub fn dirty(self) -> u8 {
        self.0[0] & 0b11
    }

    #[must_use]
    pub fn firmware(self) -> u8 {
        (self.0[1] >> 7) & 0b1
    }

    #[must_use]
    pub fn pps(self) -> u8 {
        (self.0[1] >> 6) & 0b1
    }

    /// Device service-life warning.
    #[must_use]
    pub fn device_life(self) -> u8 {
        (self.0[1] >> 5) & 0b1
    }

    #[must_use]
    pub fn fan(self) -> u8 {
        (self.0[1] >> 4) & 0b1
    }

    #[must_use]
    pub fn self_heating(self) -> u8 {
        (self.0[1] >> 3) & 0b1
    }

    #[must_use]
    pub fn ptp(self) -> u8 {
        (self.0[1] >> 2) & 0b1
    }

    /// 0 internal clock, 1 PTP, 2 GPS, 3 PPS, 4 abnormal.
    #[must_use]
    pub fn time_sync(self) -> u8 {
        self.0[1] & 0b11
    }

    /// Aggregate system status: 0 ok, 1 warning, 2 error.
    #[must_use]
    pub fn system(self) -> u8 {
        self.0[3] & 0b11
    }
}

impl Display for HealthWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "system:{} temp:{} volt:{} motor:{}",
            self.system(),
            self.temperature(),
            self.voltage(),
            self.motor()
        )
    }
}

/// Sensor work state as reported in the heartbeat ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum WorkState {
    Initializing = 0,
    Normal = 1,
    PowerSave = 2,
    Standby = 3,
    Error = 4,
}

impl TryFrom<u8> for WorkState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Initializing),
            1 => Ok(Self::Normal),
            2 => Ok(Self::PowerSave),
            3 => Ok(Self::Standby),
            4 => Ok(Self::Error),
            unknown => Err(ProtocolError::BadWorkState(unknown)),
        }
    }
}

impl Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            WorkState::Initializing => "initializing",
            WorkState::Normal => "normal",
            WorkState::PowerSave => "power-save",
            WorkState::Standby => "stand-by",
            WorkState::Error => "error",
        };
        f.write_str(str)
    }
}

/// Last-seen decomposition of the health word, updated from every inbound
/// packet and heartbeat ack. `-1` means "not seen yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub system: i8,
    pub temperature: i8,
    pub voltage: i8,
    pub motor: i8,
    pub dirty: i8,
    pub firmware: i8,
    pub pps: i8,
    pub device_life: i8,
    pub fan: i8,
    pub self_heating: i8,
    pub ptp: i8,
    pub time_sync: i8,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            system: -1,
            temperature: -1,
            voltage: -1,
            motor: -1,
            dirty: -1,
            firmware: -1,
            pps: -1,
            device_life: -1,
            fan: -1,
            self_heating: -1,
            ptp: -1,
            time_sync: -1,
        }
    }
}

impl HealthSnapshot {
    pub fn update(&mut self, word: HealthWord) {
        self.system = word.system() as i8;
        self.temperature = word.temperature() as i8;
        self.voltage = word.voltage() as i8;
        self.motor = word.motor() as i8;
        self.dirty = word.dirty() as i8;
        self.firmware = word.firmware() as i8;
        self.pps = word.pps() as i8;
        self.device_life = word.device_life() as i8;
        self.fan = word.fan() as i8;
        self.self_heating = word.self_heating() as i8;
        self.ptp = word.ptp() as i8;
        self.time_sync = word.time_sync() as i8;
    }

    /// Codes in reporting order: system, temperature, voltage, motor, dirty,
    /// firmware, PPS, device life, fan, self-heating, PTP, time sync.
    #[must_use]
    pub fn codes(&self) -> [i8; 12] {
        [
            self.system,
            self.temperature,
            self.voltage,
            self.motor,
            self.dirty,
            self.firmware,
            self.pps,
            self.device_life,
            self.fan,
            self.self_heating,
            self.ptp,
            self.time_sync,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_extraction_uses_msb_first_bit_order() {
        // temperature=2, voltage=1, motor=0, dirty=1
        let b0 = 0b1001_0001;
        // firmware=1, pps=0, device=1, fan=0, heating=1, ptp=0, sync=3
        let b1 = 0b1010_1011;
        let word = HealthWord::from_bytes([b0, b1, 0x00, 0b0000_0010]);
        assert_eq!(word.temperature(), 2);
        assert_eq!(word.voltage(), 1);
        assert_eq!(word.motor(), 0);
        assert_eq!(word.dirty(), 1);
        assert_eq!(word.firmware(), 1);
        assert_eq!(word.pps(), 0);
        assert_eq!(word.device_life(), 1);
        assert_eq!(word.fan(), 0);
        assert_eq!(word.self_heating(), 1);
        assert_eq!(word.ptp(), 0);
        assert_eq!(word.time_sync(), 3);
        assert_eq!(word.system(), 2);
    }

    #[test]
    fn snapshot_starts_unknown_and_tracks_updates() {
        let mut snapshot = HealthSnapshot::default();
        assert_eq!(snapshot.codes(), [-1; 12]);
        snapshot.update(HealthWord::from_bytes([0, 0, 0, 0]));
        assert_eq!(snapshot.codes(), [0; 12]);
    }
}
