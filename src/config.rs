use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::platform::sim::{SensorModel, TargetScenario};
use crate::tasks::DisplayPacing;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "AURUS_SONAR";

#[derive(Debug, Clone, Deserialize)]
pub struct SonarConfig {
    pub log: LogConfig,
    pub display: DisplayConfig,
    pub simulation: SimulationConfig,
    /// Stop after this long and print the blackboard. Runs forever when unset.
    pub run_for_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` still wins.
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Open the OLED viewer window. Headless when false.
    pub window: bool,
    pub pacing: DisplayPacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Fixed,
    Sweep,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub scenario: ScenarioKind,
    pub target_cm: f32,
    pub min_cm: f32,
    pub max_cm: f32,
    pub sweep_period_ms: u64,
    pub echo_loss_rate: f64,
    pub jitter_us: u64,
}

impl SimulationConfig {
    pub fn sensor_model(&self) -> SensorModel {
        let scenario = match self.scenario {
            ScenarioKind::Fixed => TargetScenario::Fixed { cm: self.target_cm },
            ScenarioKind::Sweep => TargetScenario::Sweep {
                min_cm: self.min_cm,
                max_cm: self.max_cm,
                period: Duration::from_millis(self.sweep_period_ms),
            },
        };
        SensorModel { scenario, echo_loss_rate: self.echo_loss_rate, jitter_us: self.jitter_us }
    }
}

/// Builder pre-loaded with every default, so the config file is optional.
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("log.level", "info")?
        .set_default("display.window", true)?
        .set_default("display.pacing", "independent")?
        .set_default("simulation.scenario", "sweep")?
        .set_default("simulation.target_cm", 34.3)?
        .set_default("simulation.min_cm", 1.0)?
        .set_default("simulation.max_cm", 450.0)?
        .set_default("simulation.sweep_period_ms", 20_000)?
        .set_default("simulation.echo_loss_rate", 0.05)?
        .set_default("simulation.jitter_us", 20)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<SonarConfig, ConfigError> {
    let cfg: SonarConfig = builder.build()?.try_deserialize()?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &SonarConfig) -> Result<(), ConfigError> {
    let sim = &cfg.simulation;
    if !(0.0..=1.0).contains(&sim.echo_loss_rate) {
        return Err(ConfigError::Message(format!(
            "simulation.echo_loss_rate must be within [0, 1], got {}",
            sim.echo_loss_rate
        )));
    }
    if sim.scenario == ScenarioKind::Sweep && sim.min_cm >= sim.max_cm {
        return Err(ConfigError::Message(format!(
            "simulation.min_cm ({}) must be below simulation.max_cm ({})",
            sim.min_cm, sim.max_cm
        )));
    }
    Ok(())
}

/// Defaults, then `path` (if present), then `AURUS_SONAR__SECTION__KEY` variables.
pub fn load_config(path: &str) -> Result<SonarConfig, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = defaults().and_then(|builder| {
        finish(
            builder
                .add_source(File::new(path, FileFormat::Toml).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)),
        )
    });

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<SonarConfig, ConfigError> {
        finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults_deserialize() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg.log.level, "info");
        assert!(cfg.display.window);
        assert_eq!(cfg.display.pacing, DisplayPacing::Independent);
        assert_eq!(cfg.simulation.scenario, ScenarioKind::Sweep);
        assert_eq!(cfg.run_for_ms, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let cfg = from_toml(
            r#"
            run_for_ms = 5000

            [display]
            window = false
            pacing = "shared_semaphore"

            [simulation]
            scenario = "fixed"
            target_cm = 120.5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.run_for_ms, Some(5000));
        assert!(!cfg.display.window);
        assert_eq!(cfg.display.pacing, DisplayPacing::SharedSemaphore);
        assert_eq!(cfg.simulation.sensor_model().scenario, TargetScenario::Fixed { cm: 120.5 });
    }

    #[test]
    fn test_rejects_bad_loss_rate() {
        let err = from_toml("[simulation]\necho_loss_rate = 1.5").unwrap_err();
        assert!(err.to_string().contains("echo_loss_rate"));
    }

    #[test]
    fn test_rejects_empty_sweep() {
        assert!(from_toml("[simulation]\nmin_cm = 50.0\nmax_cm = 50.0").is_err());
    }
}
