use std::net::Ipv4Addr;
use std::path::Path;
use std::thread;
use std::time::Duration;

use lvx_protocol::command::{
    Command, CoordinateSystem, ExtrinsicsAck, LidarMode, ReturnMode, StateAck,
};

use crate::capture::{CaptureHandle, CaptureMode};
use crate::error::{Error, FatalReason, Result};
use crate::heartbeat;
use crate::session::{Extrinsics, Sensor};

/// Longest accepted pre-capture wait, seconds.
const MAX_WAIT_SECS: f64 = 900.0;

/// "Indefinite" capture bound, just under four years of sensor time.
pub(crate) const INDEFINITE_SECS: f64 = 126_230_400.0;

impl Sensor {
    /// Spins the lidar up into normal (rotating) mode.
    ///
    /// A ret code of 2 means the motor is still coming up; that is reported
    /// on the sink and treated as success. Readiness is observed through
    /// [`Sensor::work_state`].
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn lidar_spin_up(&mut self) -> Result<()> {
        self.sink
            .sent(self.sensor_ip, "sent lidar spin up request");
        let payload = self.transact(&Command::SetMode(LidarMode::Normal))?;
        match payload.first().copied().unwrap_or(1) {
            0 => Ok(()),
            2 => {
                self.sink
                    .note(self.sensor_ip, "lidar is spinning up, please wait...");
                Ok(())
            }
            code => {
                self.sink
                    .note(self.sensor_ip, "FAILED to spin up the lidar");
                Err(Error::RejectedByDevice { code })
            }
        }
    }

    /// Blocks until the heartbeat reports the normal work state.
    pub fn wait_until_ready(&self) {
        while self.work_state() != 1 {
            thread::sleep(Duration::from_millis(100));
        }
        self.sink.note(self.sensor_ip, "lidar is ready");
    }

    /// Drops the lidar into power-save; any running capture is closed.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn lidar_spin_down(&mut self) -> Result<()> {
        self.sink
            .sent(self.sensor_ip, "sent lidar spin down request");
        let payload = self.transact(&Command::SetMode(LidarMode::PowerSave))?;
        match payload.first().copied().unwrap_or(1) {
            1 => {
                self.sink
                    .note(self.sensor_ip, "FAILED to spin down the lidar");
                Err(Error::RejectedByDevice { code: 1 })
            }
            _ => {
                self.streaming = false;
                self.stop_capture();
                thread::sleep(Duration::from_millis(100));
                Ok(())
            }
        }
    }

    /// Puts the lidar in stand-by (motor on, laser off); any running
    /// capture is closed.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn lidar_stand_by(&mut self) -> Result<()> {
        self.sink
            .sent(self.sensor_ip, "sent lidar stand-by request");
        let payload = self.transact(&Command::SetMode(LidarMode::Standby))?;
        match payload.first().copied().unwrap_or(1) {
            1 => {
                self.sink
                    .note(self.sensor_ip, "FAILED to set lidar to stand-by");
                Err(Error::RejectedByDevice { code: 1 })
            }
            _ => {
                self.streaming = false;
                self.stop_capture();
                thread::sleep(Duration::from_millis(100));
                Ok(())
            }
        }
    }

    /// Starts the point/IMU stream and spawns the capture task in `mode`.
    ///
    /// Only one capture is in flight per session; the task consumes (and
    /// discards) packets until [`Sensor::save_to_file`] arms it.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn data_start(&mut self, mode: CaptureMode) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.streaming {
            self.sink
                .note(self.sensor_ip, "data stream already started");
            return Ok(());
        }
        let data_socket = self
            .data_socket
            .as_ref()
            .ok_or(Error::NotConnected)?
            .try_clone()?;
        let imu_socket = self
            .imu_socket
            .as_ref()
            .ok_or(Error::NotConnected)?
            .try_clone()?;
        let capture = CaptureHandle::spawn(
            data_socket,
            imu_socket,
            mode,
            self.model.retains_nulls(),
            std::sync::Arc::clone(&self.shared),
            self.sink.clone(),
            self.sensor_ip,
        );
        thread::sleep(Duration::from_millis(120));

        self.sink
            .sent(self.sensor_ip, "sent start data stream request");
        match self.transact(&Command::SetSampling(true)) {
            Ok(payload) if payload.first() == Some(&0) => {
                self.capture = Some(capture);
                self.streaming = true;
                Ok(())
            }
            Ok(payload) => {
                self.sink
                    .note(self.sensor_ip, "FAILED to start data stream");
                let mut capture = capture;
                capture.stop();
                Err(Error::RejectedByDevice {
                    code: payload.first().copied().unwrap_or(1),
                })
            }
            Err(err) => {
                self.sink
                    .note(self.sensor_ip, "incorrect start data stream response");
                let mut capture = capture;
                capture.stop();
                Err(err)
            }
        }
    }

    /// Stops the point/IMU stream and closes any armed capture file.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn data_stop(&mut self) -> Result<()> {
        if !self.streaming {
            self.sink
                .note(self.sensor_ip, "data stream already stopped");
            return Ok(());
        }
        self.sink
            .sent(self.sensor_ip, "sent stop data stream request");
        let payload = self.transact(&Command::SetSampling(false))?;
        match payload.first().copied().unwrap_or(1) {
            1 => {
                self.sink
                    .note(self.sensor_ip, "FAILED to stop data stream");
                Err(Error::RejectedByDevice { code: 1 })
            }
            _ => {
                self.streaming = false;
                self.stop_capture();
                thread::sleep(Duration::from_millis(100));
                Ok(())
            }
        }
    }

    /// Switches the point stream between Cartesian and spherical output.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_coordinate_system(&mut self, system: CoordinateSystem) -> Result<()> {
        self.sink.sent(
            self.sensor_ip,
            &format!("sent change to {system} coordinates request"),
        );
        let payload = self.transact(&Command::SetCoordinateSystem(system))?;
        match payload.first().copied().unwrap_or(1) {
            0 => {
                self.coord_system = Some(system);
                Ok(())
            }
            code => {
                self.sink.note(
                    self.sensor_ip,
                    &format!("FAILED to set {system} coordinate output"),
                );
                Err(Error::RejectedByDevice { code })
            }
        }
    }

    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_rain_fog(&mut self, enabled: bool) -> Result<()> {
        let text = if enabled {
            "sent turn on rain/fog suppression request"
        } else {
            "sent turn off rain/fog suppression request"
        };
        self.sink.sent(self.sensor_ip, text);
        self.expect_ok(
            &Command::SetRainFog(enabled),
            "FAILED to set rain/fog suppression value",
        )
    }

    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_fan(&mut self, enabled: bool) -> Result<()> {
        let text = if enabled {
            "sent turn on fan request"
        } else {
            "sent turn off fan request"
        };
        self.sink.sent(self.sensor_ip, text);
        self.expect_ok(&Command::SetFan(enabled), "FAILED to set fan value")
    }

    /// Reads the fan state byte back from the sensor.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn get_fan(&mut self) -> Result<u8> {
        self.sink.sent(self.sensor_ip, "sent get fan state request");
        let payload = self.transact(&Command::GetFan)?;
        let ack = StateAck::parse(&payload)?;
        if ack.ret_code != 0 {
            self.sink
                .note(self.sensor_ip, "FAILED to get fan state value");
            return Err(Error::RejectedByDevice {
                code: ack.ret_code,
            });
        }
        self.sink
            .note(self.sensor_ip, &format!("fan state: {}", ack.state));
        Ok(ack.state)
    }

    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_return_mode(&mut self, mode: ReturnMode) -> Result<()> {
        self.sink.sent(
            self.sensor_ip,
            &format!("sent {mode} return lidar mode request"),
        );
        self.expect_ok(
            &Command::SetReturnMode(mode),
            "FAILED to set lidar mode value",
        )
    }

    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_imu_push(&mut self, enabled: bool) -> Result<()> {
        let text = if enabled {
            "sent start IMU data push request"
        } else {
            "sent stop IMU data push request"
        };
        self.sink.sent(self.sensor_ip, text);
        self.expect_ok(
            &Command::SetImuPush(enabled),
            "FAILED to set IMU data push value",
        )
    }

    /// Reads the IMU push state byte back from the sensor.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn get_imu_push(&mut self) -> Result<u8> {
        self.sink
            .sent(self.sensor_ip, "sent get IMU push state request");
        let payload = self.transact(&Command::GetImuPush)?;
        let ack = StateAck::parse(&payload)?;
        if ack.ret_code != 0 {
            self.sink
                .note(self.sensor_ip, "FAILED to get IMU push state value");
            return Err(Error::RejectedByDevice {
                code: ack.ret_code,
            });
        }
        self.sink
            .note(self.sensor_ip, &format!("IMU push state: {}", ack.state));
        Ok(ack.state)
    }

    /// Writes mounting extrinsics: metres (floored to millimetres) and
    /// degrees. On success the stored values are read back.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_extrinsics(
        &mut self,
        x_m: f64,
        y_m: f64,
        z_m: f64,
        roll_deg: f32,
        pitch_deg: f32,
        yaw_deg: f32,
    ) -> Result<()> {
        let command = Command::WriteExtrinsics {
            roll_deg,
            pitch_deg,
            yaw_deg,
            x_mm: (x_m * 1000.0).floor() as i32,
            y_mm: (y_m * 1000.0).floor() as i32,
            z_mm: (z_m * 1000.0).floor() as i32,
        };
        self.sink
            .sent(self.sensor_ip, "sent set extrinsic parameters request");
        self.expect_ok(&command, "FAILED to set extrinsic parameters")?;
        self.read_extrinsics().map(|_| ())
    }

    /// Zeroes the stored extrinsics.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_extrinsics_to_zero(&mut self) -> Result<()> {
        self.sink.sent(
            self.sensor_ip,
            "sent set extrinsic parameters to zero request",
        );
        self.expect_ok(
            &Command::WriteExtrinsics {
                roll_deg: 0.0,
                pitch_deg: 0.0,
                yaw_deg: 0.0,
                x_mm: 0,
                y_mm: 0,
                z_mm: 0,
            },
            "FAILED to set extrinsic parameters to zero",
        )?;
        self.read_extrinsics().map(|_| ())
    }

    /// Reads the stored extrinsics and caches them on the session.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn read_extrinsics(&mut self) -> Result<Extrinsics> {
        self.sink
            .sent(self.sensor_ip, "sent read extrinsic parameters request");
        let payload = self.transact(&Command::ReadExtrinsics)?;
        let ack = ExtrinsicsAck::parse(&payload)?;
        if ack.ret_code != 0 {
            self.sink
                .note(self.sensor_ip, "FAILED to read extrinsic parameters");
            return Err(Error::RejectedByDevice {
                code: ack.ret_code,
            });
        }
        let extrinsics = Extrinsics {
            x_m: f64::from(ack.x_mm) / 1000.0,
            y_m: f64::from(ack.y_mm) / 1000.0,
            z_m: f64::from(ack.z_mm) / 1000.0,
            roll_deg: ack.roll_deg,
            pitch_deg: ack.pitch_deg,
            yaw_deg: ack.yaw_deg,
        };
        self.extrinsics = Some(extrinsics);
        Ok(extrinsics)
    }

    /// Pushes a UTC timebase to the sensor. Out-of-range fields clamp to
    /// safe defaults silently.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn update_utc(
        &mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        microseconds: u32,
    ) -> Result<()> {
        let year = match year.checked_sub(2000) {
            Some(offset) if offset <= 255 => offset as u8,
            _ => 0,
        };
        let month = if (1..=12).contains(&month) { month } else { 1 };
        let day = if (1..=31).contains(&day) { day } else { 1 };
        let hour = if hour <= 23 { hour } else { 0 };
        let microseconds = if microseconds <= 3_600_000_000 {
            microseconds
        } else {
            0
        };
        self.sink.sent(self.sensor_ip, "sent update UTC request");
        self.expect_ok(
            &Command::WriteUtc {
                year,
                month,
                day,
                hour,
                microseconds,
            },
            "FAILED to update UTC values",
        )
    }

    /// Assigns a static IP inside the range the sensor's IP-range code
    /// permits. The check happens driver-side; a violation produces no
    /// network traffic. On success the session disconnects and the change
    /// is fatal (exit code 5 under the legacy policy) because the sensor
    /// must be power-cycled.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice` for an out-of-range address, `Fatal` on success.
    pub fn set_static_ip(&mut self, address: Ipv4Addr) -> Result<()> {
        let range = match self.ip_range_code {
            1 => 11..=80,
            2 => 81..=150,
            3 => 151..=220,
            _ => 11..=220,
        };
        if !range.contains(&address.octets()[3]) {
            self.sink.note(
                self.sensor_ip,
                &format!(
                    "FAILED to change static IP (must be .{} to .{})",
                    range.start(),
                    range.end()
                ),
            );
            return Err(Error::RejectedByDevice { code: 1 });
        }
        let payload = self.transact(&Command::SetStaticIp(address))?;
        match payload.first().copied().unwrap_or(1) {
            0 => {
                self.sink.emit(&format!(
                    "Changed IP from {} to a static IP of {address}",
                    self.sensor_ip
                ));
                self.disconnect()?;
                self.sink
                    .emit("\n********** PROGRAM ENDED - MUST REBOOT SENSOR **********\n");
                heartbeat::raise_fatal(
                    &self.shared,
                    self.fatal_policy,
                    FatalReason::StaticIpApplied,
                );
                Err(Error::Fatal(FatalReason::StaticIpApplied))
            }
            code => {
                self.sink
                    .note(self.sensor_ip, "FAILED to change static IP");
                Err(Error::RejectedByDevice { code })
            }
        }
    }

    /// Switches the sensor to DHCP addressing. On success the session
    /// disconnects and the change is fatal (exit code 4 under the legacy
    /// policy) because the sensor must be power-cycled.
    ///
    /// # Errors
    ///
    /// `RejectedByDevice`, `Timeout`, or `Fatal` from the session state.
    pub fn set_dynamic_ip(&mut self) -> Result<()> {
        let payload = self.transact(&Command::SetDynamicIp)?;
        match payload.first().copied().unwrap_or(1) {
            0 => {
                self.sink.emit(&format!(
                    "Changed IP from {} to dynamic IP (DHCP assigned)",
                    self.sensor_ip
                ));
                self.disconnect()?;
                self.sink
                    .emit("\n********** PROGRAM ENDED - MUST REBOOT SENSOR **********\n");
                heartbeat::raise_fatal(
                    &self.shared,
                    self.fatal_policy,
                    FatalReason::DynamicIpApplied,
                );
                Err(Error::Fatal(FatalReason::DynamicIpApplied))
            }
            code => {
                self.sink.note(
                    self.sensor_ip,
                    "FAILED to change to dynamic IP (DHCP assigned)",
                );
                Err(Error::RejectedByDevice { code })
            }
        }
    }

    /// Arms the running capture task to write `path`.
    ///
    /// `wait_secs` of sensor time is consumed first, then `duration_secs`
    /// of sensor time is written; a duration of 0 means indefinite. Both
    /// are measured against packet timestamps.
    ///
    /// # Errors
    ///
    /// `Configuration` on out-of-range arguments or when no stream is
    /// running.
    pub fn save_to_file(
        &mut self,
        path: impl AsRef<Path>,
        wait_secs: f64,
        duration_secs: f64,
    ) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if !self.streaming {
            self.sink.note(
                self.sensor_ip,
                "WARNING: data stream not started, no data file created",
            );
            return Err(Error::Configuration("data stream not started".to_owned()));
        }
        if !(0.0..=MAX_WAIT_SECS).contains(&wait_secs) {
            return Err(Error::Configuration(format!(
                "time to wait must be within 0..={MAX_WAIT_SECS} seconds"
            )));
        }
        if !(0.0..INDEFINITE_SECS).contains(&duration_secs) {
            return Err(Error::Configuration(format!(
                "duration must be within 0..{INDEFINITE_SECS} seconds"
            )));
        }
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::Configuration("file path missing".to_owned()));
        }
        if self.firmware == "UNKNOWN" {
            self.sink.note(self.sensor_ip, "unknown firmware version");
        }
        let capture = self
            .capture
            .as_ref()
            .ok_or_else(|| Error::Configuration("data stream not started".to_owned()))?;
        capture.arm(
            path.to_path_buf(),
            wait_secs,
            duration_secs,
            self.firmware_kind,
        );
        self.writing = true;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }

    /// Closes the capture file without stopping the sensor stream.
    pub fn close_file(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.writing = false;
    }

    fn expect_ok(&mut self, command: &Command, failure: &str) -> Result<()> {
        let payload = self.transact(command)?;
        match payload.first().copied().unwrap_or(1) {
            0 => Ok(()),
            code => {
                self.sink.note(self.sensor_ip, failure);
                Err(Error::RejectedByDevice { code })
            }
        }
    }
}
