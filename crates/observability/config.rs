use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let alerts = match non_empty("ALERT_WEBHOOK_URL") {
            None => None,
            Some(raw) => match Url::parse(raw.trim()) {
                Ok(webhook_url) => {
                    let min_level = match non_empty("ALERT_MIN_LEVEL") {
                        None => Level::ERROR,
                        Some(raw_level) => parse_level(&raw_level).unwrap_or_else(|| {
                            warnings.push(format!(
                                "ALERT_MIN_LEVEL is invalid (value: {raw_level}); using ERROR"
                            ));
                            Level::ERROR
                        }),
                    };
                    Some(AlertConfig {
                        webhook_url,
                        min_level,
                    })
                }
                Err(err) => {
                    // The URL itself is a secret and stays out of the log.
                    warnings.push(format!(
                        "ALERT_WEBHOOK_URL is invalid; alerts disabled (parse error: {err})"
                    ));
                    None
                }
            },
        };

        Self {
            service_context,
            alerts,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_component_name_and_no_alerts() {
        let config = config_with(&[]);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.stage, "unknown");
        assert!(config.alerts.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_alert_url_disables_alerts_with_warning() {
        let config = config_with(&[("ALERT_WEBHOOK_URL", "not a url")]);

        assert!(config.alerts.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("not a url"));
    }

    #[test]
    fn alert_level_falls_back_to_error() {
        let config = config_with(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/ops"),
            ("ALERT_MIN_LEVEL", "loud"),
        ]);

        let alerts = config.alerts.unwrap();
        assert_eq!(alerts.min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }
}
