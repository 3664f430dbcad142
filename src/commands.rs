/*
 * This file is part of aorus-control.
 *
 * Copyright (C) 2025 aorus-control contributors
 *
 * aorus-control is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * aorus-control is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with aorus-control. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command implementations
//!
//! Every command opens a [`Session`], which probes availability before any
//! other hardware access. Output is written to the given writer; logs and
//! reporter messages go to stderr.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ac_core::constants::curve;
use ac_core::{
    describe_domain, driver_from_config, quantize_fan_speed, remediation, validate_charge_limit,
    validate_curve_point, validate_custom_fan_speed, validate_gpu_boost,
    AorusError, AttributeId, Availability, AvailabilityProbe, ControlConfig, DriverKind,
    DriverPort, FanCurve, Panel, Reporter, Setting, SettingStore, SettingValue, Synchronizer,
    SyncStatus, SystemInfo, TelemetryPoller, ThermalLevel, TracingReporter, ValidationError,
};
use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::cli::{Cli, Commands, CurveCommands, SetArgs};

// ============================================================================
// Session
// ============================================================================

/// Configuration plus a synchronizer whose availability has been probed
pub struct Session {
    pub config: ControlConfig,
    pub sync: Synchronizer,
    pub availability: Availability,
}

impl Session {
    /// Load configuration and open the configured driver
    pub async fn open(config_path: Option<&Path>, simulate: bool) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) => ControlConfig::load_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ControlConfig::load()?,
        };
        if simulate {
            config.driver = DriverKind::Simulated;
        }

        let driver = driver_from_config(&config);
        Ok(Self::with_driver(config, driver, Arc::new(TracingReporter)).await)
    }

    /// Build a session around an existing driver and run the probe
    pub async fn with_driver(
        config: ControlConfig,
        driver: Arc<dyn DriverPort>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        debug!(driver = driver.name(), "Opening session");
        let sync = Synchronizer::new(driver, Arc::new(SettingStore::new()), reporter);
        let availability = AvailabilityProbe::new(sync.clone())
            .with_platform_path(&config.platform_path)
            .run()
            .await;
        Self {
            config,
            sync,
            availability,
        }
    }

    fn require_available(&self) -> anyhow::Result<()> {
        match &self.availability {
            Availability::Unavailable { reason } => {
                Err(AorusError::Unavailable(reason.clone()).into())
            }
            _ => Ok(()),
        }
    }
}

/// Run a parsed command line
pub async fn run_cli(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(cli.config.as_deref(), cli.simulate).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_command(&session, &cli.command, &mut out).await
}

/// Dispatch one command against an open session
pub async fn run_command(
    session: &Session,
    command: &Commands,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Status { json } => cmd_status(session, *json, out).await,
        Commands::Get { attribute } => cmd_get(session, attribute, out).await,
        Commands::Set(args) => cmd_set(session, args, out).await,
        Commands::Curve(CurveCommands::Show { json }) => cmd_curve_show(session, *json, out).await,
        Commands::Curve(CurveCommands::Set {
            index,
            temperature,
            speed,
        }) => cmd_curve_set(session, *index, *temperature, *speed, out).await,
        Commands::Monitor { interval_ms, count } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| session.config.telemetry_interval());
            cmd_monitor(session, interval, *count, out).await
        }
        Commands::Probe => cmd_probe(session, out),
    }
}

// ============================================================================
// Value Parsing
// ============================================================================

/// Parse and validate a command line value for an attribute
///
/// Curve points take `TEMP,SPEED` or `TEMP SPEED`. With `round`, a custom fan
/// speed is first moved to the nearest multiple of 5.
pub fn parse_setting_value(
    attribute: AttributeId,
    raw: &str,
    round: bool,
) -> ac_core::Result<SettingValue> {
    let integer = |text: &str| {
        text.trim()
            .parse::<i64>()
            .map_err(|e| AorusError::parse(attribute.to_string(), text.trim(), e))
    };

    let value = match attribute {
        AttributeId::FanMode => SettingValue::FanMode(raw.parse()?),
        AttributeId::ChargeMode => SettingValue::ChargeMode(raw.parse()?),
        AttributeId::FanCustomSpeed => {
            let mut speed = integer(raw)?;
            if round {
                speed = quantize_fan_speed(speed);
            }
            SettingValue::FanCustomSpeed(validate_custom_fan_speed(speed)?)
        }
        AttributeId::ChargeLimit => SettingValue::ChargeLimit(validate_charge_limit(integer(raw)?)?),
        AttributeId::GpuBoost => SettingValue::GpuBoost(validate_gpu_boost(integer(raw)?)?),
        AttributeId::FanCurvePoint(index) => {
            let parts: Vec<&str> = raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .collect();
            let [temperature, speed] = parts.as_slice() else {
                return Err(AorusError::parse(
                    attribute.to_string(),
                    raw,
                    "expected TEMP,SPEED",
                ));
            };
            let (_, point) =
                validate_curve_point(index as usize, integer(*temperature)?, integer(*speed)?)?;
            SettingValue::CurvePoint(point)
        }
        AttributeId::BatteryCycle
        | AttributeId::UsbChargeS3
        | AttributeId::UsbChargeS4
        | AttributeId::SystemInfo => {
            return Err(ValidationError::ReadOnly(attribute.to_string()).into())
        }
    };
    Ok(value)
}

// ============================================================================
// Formatting
// ============================================================================

fn describe_setting(setting: &Setting) -> String {
    let value = match &setting.value {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    };
    format!("  {:<24} {:<34} {}", setting.attribute.to_string(), value, setting.status)
}

fn thermal_label(celsius: i32) -> &'static str {
    match ThermalLevel::classify(celsius) {
        ThermalLevel::Normal => "normal",
        ThermalLevel::Warm => "warm",
        ThermalLevel::Hot => "hot",
        ThermalLevel::Critical => "critical",
    }
}

/// Telemetry summary with thermal classification
pub fn format_system_info(info: &SystemInfo) -> String {
    format!(
        "CPU {}°C ({}), GPU {}°C ({}), MB {}°C, fans {} / {} RPM",
        info.cpu_temp,
        thermal_label(info.cpu_temp),
        info.gpu_temp,
        thermal_label(info.gpu_temp),
        info.mb_temp,
        info.cpu_fan_rpm,
        info.gpu_fan_rpm
    )
}

/// Human-readable status report, grouped by panel
pub fn format_status(snapshot: &[Setting], availability: &Availability, driver: &str) -> String {
    let mut text = String::new();
    text.push_str("AORUS Control Status\n");
    text.push_str("====================\n");
    text.push_str(&format!("Driver:       {}\n", driver));
    text.push_str(&format!("Availability: {}\n", availability));

    for panel in Panel::ALL {
        text.push('\n');
        text.push_str(panel.title());
        text.push('\n');
        let attributes = panel.attributes();
        for setting in snapshot.iter().filter(|s| attributes.contains(&s.attribute)) {
            text.push_str(&describe_setting(setting));
            text.push('\n');
        }
    }

    let info = snapshot
        .iter()
        .find(|s| s.attribute == AttributeId::SystemInfo)
        .and_then(|s| s.value)
        .and_then(|v| v.as_system_info());
    if let Some(info) = info {
        text.push_str(&format!("\nThermals: {}\n", format_system_info(&info)));
    }
    text
}

/// Duty the fan curve asks for at the current CPU temperature
pub fn curve_target(fan_curve: &FanCurve, info: Option<SystemInfo>) -> Option<String> {
    let info = info?;
    let speed = fan_curve.estimate_speed(info.cpu_temp)?;
    Some(format!(
        "Curve target: {} ({}%) at CPU {}°C",
        speed,
        curve::speed_to_percent(speed),
        info.cpu_temp
    ))
}

/// Curve table plus advisory ordering warnings
pub fn format_curve(fan_curve: &FanCurve) -> String {
    let mut text = String::from("Idx  Temp   Speed  Duty\n");
    for (index, point) in fan_curve.points().iter().enumerate() {
        match point {
            Some(point) => text.push_str(&format!(
                "{:>3}  {:>3}°C  {:>5}  {:>3}%\n",
                index,
                point.temperature,
                point.speed,
                point.speed_percent()
            )),
            None => text.push_str(&format!("{:>3}  unknown\n", index)),
        }
    }
    for warning in fan_curve.check_monotonic() {
        text.push_str(&format!("warning: {}\n", warning));
    }
    text
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_status(session: &Session, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if !session.availability.is_unavailable() {
        session.sync.refresh_all().await;
    }
    let store = session.sync.store();
    let snapshot = store.snapshot();

    if json {
        let warnings: Vec<String> = store
            .fan_curve()
            .check_monotonic()
            .iter()
            .map(ToString::to_string)
            .collect();
        let report = serde_json::json!({
            "driver": session.sync.driver().name(),
            "availability": session.availability.to_string(),
            "config": session.config,
            "settings": snapshot,
            "curve_warnings": warnings,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(
            out,
            "{}",
            format_status(&snapshot, &session.availability, session.sync.driver().name())
        )?;
        if let Some(line) = curve_target(&store.fan_curve(), store.system_info()) {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

async fn cmd_get(session: &Session, attribute: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let attribute: AttributeId = attribute.parse()?;
    session.require_available()?;

    let value = session
        .sync
        .refresh_attribute(attribute)
        .await
        .map_err(AorusError::from)?;
    writeln!(out, "{}", value)?;
    Ok(())
}

async fn cmd_set(session: &Session, args: &SetArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let attribute: AttributeId = args.attribute.parse()?;
    let value = parse_setting_value(attribute, &args.value, args.round)
        .with_context(|| format!("{} accepts {}", attribute, describe_domain(attribute)))?;
    session.require_available()?;

    // Mode gating checks the cached modes, so load the panel first
    session.sync.refresh_panel(Panel::of(attribute)).await;
    session.sync.apply(attribute, value).await?;

    info!(attribute = %attribute, value = %value, "Setting applied");
    writeln!(out, "{} = {}", attribute, value)?;
    Ok(())
}

async fn cmd_curve_show(session: &Session, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    session.require_available()?;
    session.sync.refresh_panel(Panel::Curve).await;
    let fan_curve = session.sync.store().fan_curve();

    if json {
        let points: Vec<_> = AttributeId::curve_points()
            .map(|attribute| session.sync.store().get(attribute))
            .collect();
        let warnings: Vec<String> = fan_curve
            .check_monotonic()
            .iter()
            .map(ToString::to_string)
            .collect();
        let report = serde_json::json!({ "points": points, "warnings": warnings });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(out, "{}", format_curve(&fan_curve))?;
    }
    Ok(())
}

async fn cmd_curve_set(
    session: &Session,
    index: usize,
    temperature: i64,
    speed: i64,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    validate_curve_point(index, temperature, speed)?;
    session.require_available()?;

    session.sync.refresh_panel(Panel::Curve).await;
    session.sync.set_curve_point(index, temperature, speed).await?;

    let attribute = AttributeId::FanCurvePoint(index as u8);
    if let Some(value) = session.sync.store().value(attribute) {
        writeln!(out, "{} = {}", attribute, value)?;
    }
    for warning in session.sync.store().fan_curve().check_monotonic() {
        writeln!(out, "warning: {}", warning)?;
    }
    Ok(())
}

async fn cmd_monitor(
    session: &Session,
    interval: Duration,
    count: Option<u64>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    session.require_available()?;

    let poller = TelemetryPoller::new(session.sync.clone(), interval);
    let mut ticks = poller.ticks();
    poller.start();
    let mut seen = 0u64;

    loop {
        tokio::select! {
            changed = ticks.changed() => {
                if changed.is_err() {
                    break;
                }
                let _ = ticks.borrow_and_update();
                seen += 1;

                let timestamp = chrono::Local::now().format("%H:%M:%S");
                let setting = session.sync.store().get(AttributeId::SystemInfo);
                match (setting.status, setting.value.and_then(|v| v.as_system_info())) {
                    (SyncStatus::Synced, Some(info)) => {
                        writeln!(out, "[{}] {}", timestamp, format_system_info(&info))?
                    }
                    (SyncStatus::Failed(reason), _) => {
                        writeln!(out, "[{}] telemetry unavailable: {}", timestamp, reason)?
                    }
                    _ => {}
                }

                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}

fn cmd_probe(session: &Session, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(
        out,
        "{}: {}",
        session.sync.driver().name(),
        session.availability
    )?;
    if session.availability.is_unavailable() {
        writeln!(out, "{}", remediation(&session.config.platform_path))?;
        return Err(anyhow!("hardware controls unavailable"));
    }
    Ok(())
}
