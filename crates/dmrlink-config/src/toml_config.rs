use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use dmrlink_core::{ColourCode, Timeslot};

use super::session_config::{
    default_missed_ping_budget, default_ping_interval_secs, CfgServer, CfgStation, SessionConfig,
};

/// Build `SessionConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if !root.server.extra.is_empty() {
        return Err(format!("Unrecognized fields in server: {:?}", sorted_keys(&root.server.extra)).into());
    }
    if !root.station.extra.is_empty() {
        return Err(format!("Unrecognized fields in station: {:?}", sorted_keys(&root.station.extra)).into());
    }

    if root.server.host.is_empty() {
        return Err("server.host must not be empty".into());
    }
    if root.station.essid == 0 {
        return Err("station.essid must not be zero".into());
    }
    if root.station.callsign.is_empty() {
        return Err("station.callsign must not be empty".into());
    }
    let colour_code = ColourCode::new(root.station.colour_code)
        .ok_or_else(|| format!("station.colour_code out of range: {}", root.station.colour_code))?;
    let timeslot = Timeslot::from_number(root.station.slot)
        .ok_or_else(|| format!("station.slot must be 1 or 2, got {}", root.station.slot))?;

    let mut cfg = SessionConfig {
        debug_log: root.debug_log,
        server: CfgServer {
            host: root.server.host,
            port: root.server.port,
            password: root.server.password,
            ping_interval_secs: root.server.ping_interval_secs,
            missed_ping_budget: root.server.missed_ping_budget,
        },
        station: CfgStation::default(),
    };

    let st = root.station;
    cfg.station.essid = st.essid;
    cfg.station.callsign = st.callsign;
    cfg.station.rx_freq_hz = st.rx_freq_hz;
    cfg.station.tx_freq_hz = st.tx_freq_hz;
    cfg.station.colour_code = colour_code;
    cfg.station.timeslot = timeslot;
    cfg.station.duplex = st.duplex;
    cfg.station.latitude = st.latitude;
    cfg.station.longitude = st.longitude;
    cfg.station.options = st.options;

    // Optional cosmetic fields keep their defaults when absent
    if let Some(v) = st.tx_power {
        cfg.station.tx_power = v;
    }
    if let Some(v) = st.height_m {
        cfg.station.height_m = v;
    }
    if let Some(v) = st.location {
        cfg.station.location = v;
    }
    if let Some(v) = st.description {
        cfg.station.description = v;
    }
    if let Some(v) = st.url {
        cfg.station.url = v;
    }
    if let Some(v) = st.software_id {
        cfg.station.software_id = v;
    }
    if let Some(v) = st.package_id {
        cfg.station.package_id = v;
    }

    Ok(cfg)
}

/// Build `SessionConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SessionConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    server: ServerDto,
    station: StationDto,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct ServerDto {
    pub host: String,
    pub port: u16,
    pub password: String,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_missed_ping_budget")]
    pub missed_ping_budget: u32,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct StationDto {
    pub essid: u32,
    pub callsign: String,
    pub rx_freq_hz: u32,
    pub tx_freq_hz: u32,
    pub colour_code: u8,
    pub slot: u8,

    #[serde(default)]
    pub duplex: bool,
    #[serde(default)]
    pub latitude: f32,
    #[serde(default)]
    pub longitude: f32,

    pub tx_power: Option<u8>,
    pub height_m: Option<u16>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub software_id: Option<String>,
    pub package_id: Option<String>,
    pub options: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
