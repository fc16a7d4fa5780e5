use crate::derived::LineStyle;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Tunables shared by all commands.
///
/// Loaded from a TOML file where every key is optional, then overridden by command line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Percentiles reported next to the basic statistics
    pub percentiles: Vec<f64>,
    /// Differences within `±threshold` ms count as a low deviation
    pub deviation_threshold_ms: f64,
    /// Ascending ping RTT bin edges in ms
    pub ping_range_edges: Vec<f64>,
    pub drift_window_minutes: i64,
    pub line_style: LineStyle,
    /// Print reports to stdout as well as writing them to file
    pub echo: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            percentiles: vec![25.0, 50.0, 75.0, 80.0, 90.0, 95.0, 99.0],
            deviation_threshold_ms: 3.0,
            ping_range_edges: vec![0.0, 10.0, 30.0, 60.0, 90.0],
            drift_window_minutes: 10,
            line_style: LineStyle::Compact,
            echo: true,
        }
    }
}

impl AnalysisSettings {
    pub fn from_file<P>(path: P) -> Result<Self, SettingsError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;

        log::debug!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    /// Settings from `path` if given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(p) = self.percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
            return Err(SettingsError::Invalid(format!(
                "percentile {p} is outside [0, 100]"
            )));
        }
        if self.deviation_threshold_ms.is_nan() || self.deviation_threshold_ms < 0.0 {
            return Err(SettingsError::Invalid(format!(
                "deviation threshold must not be negative, got {}",
                self.deviation_threshold_ms
            )));
        }
        if self.ping_range_edges.len() < 2
            || self.ping_range_edges.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(SettingsError::Invalid(
                "ping range edges must be at least two strictly ascending values".to_string(),
            ));
        }
        self.drift_window()?;
        Ok(())
    }

    /// The drift window as a duration. Fails when it is not positive or does not fit a
    /// [TimeDelta].
    pub fn drift_window(&self) -> Result<TimeDelta, SettingsError> {
        match TimeDelta::try_minutes(self.drift_window_minutes) {
            Some(window) if window > TimeDelta::zero() => Ok(window),
            _ => Err(SettingsError::Invalid(format!(
                "drift window must be a positive number of minutes, got {}",
                self.drift_window_minutes
            ))),
        }
    }

    /// Builds [`AnalysisSettings`] with the given percentiles, ignored when empty.
    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        if !percentiles.is_empty() {
            self.percentiles = percentiles;
        }
        self
    }

    pub fn deviation_threshold_ms(mut self, threshold: Option<f64>) -> Self {
        if let Some(threshold) = threshold {
            self.deviation_threshold_ms = threshold;
        }
        self
    }

    pub fn drift_window_minutes(mut self, minutes: Option<i64>) -> Self {
        if let Some(minutes) = minutes {
            self.drift_window_minutes = minutes;
        }
        self
    }

    pub fn line_style(mut self, style: Option<LineStyle>) -> Self {
        if let Some(style) = style {
            self.line_style = style;
        }
        self
    }

    /// Builds [`AnalysisSettings`] without console echo when `quiet` is set.
    pub fn quiet(mut self, quiet: bool) -> Self {
        if quiet {
            self.echo = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;

    #[test]
    fn partial_file_keeps_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "deviation_threshold_ms = 5.0\nline_style = \"spaced\"")?;

        let settings = AnalysisSettings::from_file(file.path())?;
        assert_eq!(settings.deviation_threshold_ms, 5.0);
        assert_eq!(settings.line_style, LineStyle::Spaced);
        assert_eq!(settings.ping_range_edges, AnalysisSettings::default().ping_range_edges);
        assert_eq!(settings.drift_window()?, TimeDelta::minutes(10));
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "threshold = 5.0")?;

        assert!(matches!(
            AnalysisSettings::from_file(file.path()),
            Err(SettingsError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        let settings = AnalysisSettings {
            ping_range_edges: vec![10.0, 0.0],
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AnalysisSettings::default().percentiles(vec![101.0]);
        assert!(settings.validate().is_err());

        let settings = AnalysisSettings::default().drift_window_minutes(Some(0));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn oversized_drift_window_is_an_error() {
        let settings =
            AnalysisSettings::default().drift_window_minutes(Some(9_000_000_000_000_000));
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
        assert!(matches!(settings.drift_window(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn builder_overrides() {
        let settings = AnalysisSettings::default()
            .percentiles(vec![])
            .deviation_threshold_ms(Some(1.5))
            .line_style(None)
            .quiet(true);

        assert_eq!(settings.percentiles, AnalysisSettings::default().percentiles);
        assert_eq!(settings.deviation_threshold_ms, 1.5);
        assert_eq!(settings.line_style, LineStyle::Compact);
        assert!(!settings.echo);
    }
}
