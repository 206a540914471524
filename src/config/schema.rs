use serde::{Deserialize, Serialize};

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarConfig {
    /// Shell command whose output feeds the bar.
    pub status_command: Option<String>,
    pub separator_symbol: Option<String>,
    pub hide_on_modifier: bool,
    pub colors: bool,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            status_command: None,
            separator_symbol: None,
            hide_on_modifier: false,
            colors: true,
        }
    }
}

/// A problem found by [`BarConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMessage {
    Warning(String),
    Error(String),
}

impl BarConfig {
    pub fn validate(&self) -> Vec<ConfigMessage> {
        let mut messages = Vec::new();

        if let Some(cmd) = &self.status_command {
            if cmd.trim().is_empty() {
                messages.push(ConfigMessage::Warning(
                    "status_command is empty; no status will be shown".to_string(),
                ));
            }
        }

        if let Some(symbol) = &self.separator_symbol {
            if symbol.is_empty() {
                messages.push(ConfigMessage::Error(
                    "separator_symbol must not be empty".to_string(),
                ));
            } else if symbol.contains('\n') {
                messages.push(ConfigMessage::Error(
                    "separator_symbol must be a single line".to_string(),
                ));
            }
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: BarConfig = toml::from_str("").unwrap();
        assert_eq!(config, BarConfig::default());
        assert!(config.colors);
        assert!(!config.hide_on_modifier);
    }

    #[test]
    fn all_keys_parse() {
        let config: BarConfig = toml::from_str(
            r#"
status_command = "i3status"
separator_symbol = "::"
hide_on_modifier = true
colors = false
"#,
        )
        .unwrap();
        assert_eq!(config.status_command.as_deref(), Some("i3status"));
        assert_eq!(config.separator_symbol.as_deref(), Some("::"));
        assert!(config.hide_on_modifier);
        assert!(!config.colors);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<BarConfig>("status_comand = \"x\"").is_err());
    }

    #[test]
    fn validation_flags_bad_values() {
        let config = BarConfig {
            status_command: Some("  ".into()),
            separator_symbol: Some(String::new()),
            ..Default::default()
        };
        let messages = config.validate();
        assert!(matches!(messages[0], ConfigMessage::Warning(_)));
        assert!(matches!(messages[1], ConfigMessage::Error(_)));
    }
}
