//! Extension de pmoconfig pour le pipeline de découverte

use anyhow::{anyhow, Result};
use pmoconfig::Config;
use pmomodel::Preference;
use std::time::Duration;
use tracing::warn;

use crate::pipeline::PipelineSettings;

/// Trait d'extension pour pmoconfig::Config
pub trait PipelineConfigExt {
    /// Préférences de découverte typées, entrées invalides ignorées
    fn get_preferences(&self) -> Result<Vec<Preference>>;

    /// Ajoute une préférence à la configuration et sauvegarde
    fn push_preference(&self, preference: &Preference) -> Result<()>;

    /// Réglages du pipeline depuis la section `pipeline`
    fn pipeline_settings(&self) -> Result<PipelineSettings>;
}

impl PipelineConfigExt for Config {
    fn get_preferences(&self) -> Result<Vec<Preference>> {
        let raw = self.get_preferences_value()?;
        // Pont YAML → JSON pour profiter des dérives serde du modèle
        let raw_json = serde_json::to_value(&raw)?;
        let entries: Vec<serde_json::Value> = serde_json::from_value(raw_json)?;

        let mut preferences = Vec::new();
        for entry in entries {
            match serde_json::from_value::<Preference>(entry.clone()) {
                Ok(preference) => match preference.validate() {
                    Ok(()) => preferences.push(preference),
                    Err(err) => {
                        warn!(error=%err, "Ignoring preference without any criterion")
                    }
                },
                Err(err) => warn!(error=%err, "Ignoring malformed preference entry"),
            }
        }
        Ok(preferences)
    }

    fn push_preference(&self, preference: &Preference) -> Result<()> {
        let json = serde_json::to_value(preference)?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&serde_json::to_string(&json)?)?;
        self.push_preference_value(yaml)
    }

    fn pipeline_settings(&self) -> Result<PipelineSettings> {
        let threshold = self.get_relevance_threshold()?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "relevance_threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        Ok(PipelineSettings {
            relevance_threshold: threshold,
            max_episodes_per_run: self.get_max_episodes_per_run()?,
            retry_delay: Duration::from_millis(self.get_retry_delay_ms()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_parse_and_invalid_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let entries: serde_yaml::Value = serde_yaml::from_str(
            "- show_name: The Tim Ferriss Show\n  min_duration_seconds: 1800\n- {}\n- topics: [ai]",
        )
        .unwrap();
        config.set_value(&["preferences"], entries).unwrap();

        let preferences = config.get_preferences().unwrap();
        assert_eq!(preferences.len(), 2);
        assert_eq!(
            preferences[0].show_name.as_deref(),
            Some("The Tim Ferriss Show")
        );
        assert!(preferences[1].topics.contains("ai"));
    }

    #[test]
    fn push_preference_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let preference =
            Preference::for_topics(["rust"]).with_duration(Some(600), None);
        config.push_preference(&preference).unwrap();

        let loaded = config.get_preferences().unwrap();
        assert_eq!(loaded, vec![preference]);
    }

    #[test]
    fn settings_reject_threshold_outside_unit_interval() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.relevance_threshold, 0.6);
        assert_eq!(settings.retry_delay, Duration::from_millis(500));

        config.set_relevance_threshold(1.4).unwrap();
        assert!(config.pipeline_settings().is_err());
    }
}
