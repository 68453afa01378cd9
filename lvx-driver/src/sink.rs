use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Destination for the human-readable per-command lines.
///
/// Replaces the original per-object verbosity flag: callers wanting the
/// legacy output install [`MessageSink::Stderr`], tools embed a callback,
/// and the default stays quiet.
#[derive(Clone, Default)]
pub enum MessageSink {
    #[default]
    Off,
    Stderr,
    Callback(Arc<dyn Fn(&str) + Send + Sync>),
}

impl MessageSink {
    pub fn emit(&self, line: &str) {
        match self {
            MessageSink::Off => {}
            MessageSink::Stderr => eprintln!("{line}"),
            MessageSink::Callback(callback) => callback(line),
        }
    }

    /// "sent" line: host → sensor.
    pub(crate) fn sent(&self, sensor_ip: Ipv4Addr, text: &str) {
        self.emit(&format!("   {sensor_ip:<15}   <--     {text}"));
    }

    /// Outcome line: sensor → host.
    pub(crate) fn note(&self, sensor_ip: Ipv4Addr, text: &str) {
        self.emit(&format!("   {sensor_ip:<15}   -->     {text}"));
    }
}

impl fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSink::Off => f.write_str("MessageSink::Off"),
            MessageSink::Stderr => f.write_str("MessageSink::Stderr"),
            MessageSink::Callback(_) => f.write_str("MessageSink::Callback(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn callback_receives_formatted_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink = MessageSink::Callback(Arc::new(move |line: &str| {
            captured
                .lock()
                .expect("collector lock")
                .push(line.to_owned());
        }));
        sink.sent(Ipv4Addr::new(192, 168, 1, 12), "sent lidar spin up request");
        sink.note(Ipv4Addr::new(192, 168, 1, 12), "lidar is ready");
        let lines = lines.lock().expect("collector lock");
        assert_eq!(
            lines[0],
            "   192.168.1.12      <--     sent lidar spin up request"
        );
        assert!(lines[1].contains("-->     lidar is ready"));
    }
}
