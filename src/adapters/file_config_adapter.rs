//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[store]
path = /tmp/cycletrader.sqlite

[cycle]
max_positions = 5
quote_amount = 250.5
timeframe = 1h

[execution]
trade_mode = paper
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("store", "path"),
            Some("/tmp/cycletrader.sqlite".to_string())
        );
        assert_eq!(adapter.get_int("cycle", "max_positions", 0), 5);
        assert_eq!(adapter.get_double("cycle", "quote_amount", 0.0), 250.5);
        assert_eq!(adapter.get_string("cycle", "timeframe"), Some("1h".to_string()));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string("[cycle]\n").unwrap();
        assert_eq!(adapter.get_string("cycle", "missing"), None);
        assert_eq!(adapter.get_int("cycle", "missing", 42), 42);
        assert_eq!(adapter.get_double("cycle", "missing", 9.5), 9.5);
        assert!(adapter.get_bool("cycle", "missing", true));
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter = FileConfigAdapter::from_string("[cycle]\nmax_positions = lots\n").unwrap();
        assert_eq!(adapter.get_int("cycle", "max_positions", 3), 3);
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[flags]\na = true\nb = yes\nc = 1\nd = no\n").unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(adapter.get_bool("flags", "b", false));
        assert!(adapter.get_bool("flags", "c", false));
        assert!(!adapter.get_bool("flags", "d", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[store]\npath = data.sqlite\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("store", "path"), Some("data.sqlite".to_string()));
    }

    #[test]
    fn from_file_missing_is_error() {
        assert!(FileConfigAdapter::from_file("/nonexistent/cycletrader.ini").is_err());
    }
}
