use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::{Context, Result};
use getset::{CopyGetters, Getters};
use serde::Deserialize;

use crate::signaling::SignalingFormat;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalStatePolicy {
    /// Close every data channel and cancel signaling.
    #[default]
    Teardown,
    /// Only report the transition.
    LogOnly,
}

#[derive(Clone, Debug, Deserialize, PartialEq, CopyGetters)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionSettings {
    broadcast_interval_ms: u64,
    #[get_copy = "pub"]
    message_length: usize,
    #[get_copy = "pub"]
    event_buffer: usize,
    #[get_copy = "pub"]
    on_terminal_state: TerminalStatePolicy,
    #[get_copy = "pub"]
    signaling_format: SignalingFormat,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 5_000,
            message_length: 15,
            event_buffer: 16,
            on_terminal_state: TerminalStatePolicy::default(),
            signaling_format: SignalingFormat::default(),
        }
    }
}

impl SessionSettings {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms.max(1))
    }

    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_terminal_state_policy(mut self, policy: TerminalStatePolicy) -> Self {
        self.on_terminal_state = policy;
        self
    }

    pub fn with_signaling_format(mut self, format: SignalingFormat) -> Self {
        self.signaling_format = format;
        self
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Getters)]
#[serde(default, rename_all = "kebab-case")]
pub struct LogSettings {
    #[get = "pub"]
    dir: Option<String>,
    #[get = "pub"]
    file_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, CopyGetters, Getters)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    #[get = "pub"]
    ice_servers: Vec<String>,
    ice_disconnected_timeout_secs: Option<u64>,
    ice_failed_timeout_secs: Option<u64>,
    #[get_copy = "pub"]
    exit_on_terminal_state: bool,
    #[get = "pub"]
    session: SessionSettings,
    #[get = "pub"]
    log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
            ice_disconnected_timeout_secs: None,
            ice_failed_timeout_secs: None,
            exit_on_terminal_state: true,
            session: SessionSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn ice_disconnected_timeout(&self) -> Option<Duration> {
        self.ice_disconnected_timeout_secs.map(Duration::from_secs)
    }

    pub fn ice_failed_timeout(&self) -> Option<Duration> {
        self.ice_failed_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.session().broadcast_interval(),
            Duration::from_secs(5)
        );
        assert_eq!(settings.session().message_length(), 15);
        assert_eq!(
            settings.session().on_terminal_state(),
            TerminalStatePolicy::Teardown
        );
    }

    #[test]
    fn parses_overrides() {
        let settings = Settings::parse(
            r#"
            ice-servers = ["stun:stun.example.com:3478"]
            ice-failed-timeout-secs = 1200
            exit-on-terminal-state = false

            [session]
            broadcast-interval-ms = 250
            message-length = 8
            on-terminal-state = "log-only"
            signaling-format = "json"

            [log]
            dir = "logs"
            file-name = "paste-rtc.log"
            "#,
        )
        .unwrap();
        assert_eq!(settings.ice_servers(), &["stun:stun.example.com:3478"]);
        assert_eq!(
            settings.ice_failed_timeout(),
            Some(Duration::from_secs(1200))
        );
        assert_eq!(settings.ice_disconnected_timeout(), None);
        assert!(!settings.exit_on_terminal_state());
        assert_eq!(
            settings.session().broadcast_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(settings.session().message_length(), 8);
        assert_eq!(settings.session().event_buffer(), 16);
        assert_eq!(
            settings.session().on_terminal_state(),
            TerminalStatePolicy::LogOnly
        );
        assert_eq!(
            settings.session().signaling_format(),
            SignalingFormat::Json
        );
        assert_eq!(settings.log().dir().as_deref(), Some("logs"));
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(Settings::parse("[session]\non-terminal-state = \"exit\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/paste-rtc.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
