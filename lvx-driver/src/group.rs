use std::net::Ipv4Addr;
use std::path::Path;
use std::thread;
use std::time::Duration;

use lvx_protocol::command::{CoordinateSystem, ReturnMode};

use crate::capture::CaptureMode;
use crate::container;
use crate::discovery::{self, DEFAULT_SCAN_WINDOW, GroupKind};
use crate::error::{Error, Result};
use crate::session::{ConnectionInfo, DriverConfig, Sensor};

/// A homogeneous set of sessions driven as one unit.
///
/// A composite Mid-100 connects as three members ordered L/M/R by IP-range
/// code; an atomic sensor connects as a single member. Every operation fans
/// out to all members in declaration order.
pub struct SensorArray {
    sensors: Vec<Sensor>,
}

impl SensorArray {
    /// Discovers sensors and connects the first complete unit.
    ///
    /// # Errors
    ///
    /// `Configuration` when nothing complete is discovered; otherwise as
    /// [`Sensor::connect`].
    pub fn auto_connect(config: &DriverConfig, computer_ip: Ipv4Addr) -> Result<Self> {
        let found = discovery::discover(DEFAULT_SCAN_WINDOW)?;
        let groups = discovery::classify_groups(&found);
        let Some(group) = groups
            .iter()
            .find(|group| group.kind != GroupKind::Indeterminate)
        else {
            return Err(Error::Configuration(
                "no Livox sensors discovered".to_owned(),
            ));
        };

        let targets: Vec<_> = match group.kind {
            GroupKind::Composite => group.members.iter().collect(),
            _ => group.members.iter().take(1).collect(),
        };
        let mut sensors = Vec::with_capacity(targets.len());
        for target in targets {
            let mut sensor = Sensor::new(config.clone());
            sensor.connect_verified(computer_ip, target.ip, 0, 0, 0, &found)?;
            sensors.push(sensor);
        }
        Ok(Self { sensors })
    }

    /// Wraps already-connected sessions (useful for hand-built setups).
    #[must_use]
    pub fn from_sensors(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }

    #[must_use]
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut [Sensor] {
        &mut self.sensors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Spins every member up, then blocks until all report normal state.
    ///
    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn lidar_spin_up(&mut self) -> Result<()> {
        self.fan_out(Sensor::lidar_spin_up)?;
        loop {
            thread::sleep(Duration::from_millis(100));
            if self.sensors.iter().all(|sensor| sensor.work_state() == 1) {
                break;
            }
        }
        for sensor in &self.sensors {
            sensor.wait_until_ready();
        }
        Ok(())
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn lidar_spin_down(&mut self) -> Result<()> {
        self.fan_out(Sensor::lidar_spin_down)
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn lidar_stand_by(&mut self) -> Result<()> {
        self.fan_out(Sensor::lidar_stand_by)
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn data_start(&mut self, mode: CaptureMode) -> Result<()> {
        self.fan_out(|sensor| sensor.data_start(mode))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn data_stop(&mut self) -> Result<()> {
        self.fan_out(Sensor::data_stop)
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn set_coordinate_system(&mut self, system: CoordinateSystem) -> Result<()> {
        self.fan_out(|sensor| sensor.set_coordinate_system(system))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn set_return_mode(&mut self, mode: ReturnMode) -> Result<()> {
        self.fan_out(|sensor| sensor.set_return_mode(mode))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn set_rain_fog(&mut self, enabled: bool) -> Result<()> {
        self.fan_out(|sensor| sensor.set_rain_fog(enabled))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn set_fan(&mut self, enabled: bool) -> Result<()> {
        self.fan_out(|sensor| sensor.set_fan(enabled))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn set_imu_push(&mut self, enabled: bool) -> Result<()> {
        self.fan_out(|sensor| sensor.set_imu_push(enabled))
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn update_utc(
        &mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        microseconds: u32,
    ) -> Result<()> {
        self.fan_out(|sensor| sensor.update_utc(year, month, day, hour, microseconds))
    }

    /// Arms every member's capture; the second and third members write to
    /// `_M`/`_R` sibling paths.
    ///
    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn save_to_file(
        &mut self,
        path: impl AsRef<Path>,
        wait_secs: f64,
        duration_secs: f64,
    ) -> Result<()> {
        let path = path.as_ref();
        let mut first_error = None;
        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            let member_path = match index {
                0 => path.to_path_buf(),
                1 => container::sibling_path(path, "_M"),
                _ => container::sibling_path(path, "_R"),
            };
            if let Err(err) = sensor.save_to_file(member_path, wait_secs, duration_secs) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn close_file(&mut self) {
        for sensor in &mut self.sensors {
            sensor.close_file();
        }
    }

    /// True when every member finished (or streams indefinitely).
    #[must_use]
    pub fn done_capturing(&self) -> bool {
        self.sensors.iter().all(Sensor::done_capturing)
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn disconnect(&mut self) -> Result<()> {
        self.fan_out(Sensor::disconnect)
    }

    /// # Errors
    ///
    /// The first member error, after every member was attempted.
    pub fn reboot(&mut self) -> Result<()> {
        self.fan_out(Sensor::reboot)
    }

    #[must_use]
    pub fn connection_info(&self) -> Vec<ConnectionInfo> {
        self.sensors
            .iter()
            .filter_map(Sensor::connection_info)
            .collect()
    }

    fn fan_out(&mut self, mut operation: impl FnMut(&mut Sensor) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for sensor in &mut self.sensors {
            if let Err(err) = operation(sensor) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
