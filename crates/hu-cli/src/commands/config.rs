//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use hu_core::config::{self, BrokerConfig};

/// The `--config` path, or the default location
pub fn resolve_config_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path.cloned().unwrap_or_else(config::default_config_path)
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Get a config value by key
pub fn config_get(config_path: Option<&PathBuf>, key: &str) -> Result<()> {
    let path = resolve_config_path(config_path);

    // Unset keys still have a value, so fall back to the defaults
    let table: toml::Table = if path.exists() {
        read_table(&path)?
    } else {
        toml::from_str(&toml::to_string(&BrokerConfig::default())?)?
    };

    // Navigate through the key path (e.g., "loopback.port")
    let mut current: &toml::Value = &toml::Value::Table(table);
    for part in key.split('.') {
        match current.as_table().and_then(|t| t.get(part)) {
            Some(v) => current = v,
            None => anyhow::bail!("Key not found: {}", key),
        }
    }

    match current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Integer(i) => println!("{}", i),
        toml::Value::Float(f) => println!("{}", f),
        toml::Value::Boolean(b) => println!("{}", b),
        toml::Value::Array(a) => {
            for item in a {
                println!("{}", item);
            }
        }
        toml::Value::Table(_) => {
            println!("{}", toml::to_string_pretty(current)?);
        }
        toml::Value::Datetime(d) => println!("{}", d),
    }

    Ok(())
}

/// Set a config value by key
///
/// The edited file must still load as a valid `BrokerConfig`, otherwise
/// nothing is written.
pub fn config_set(config_path: Option<&PathBuf>, key: &str, value: &str) -> Result<()> {
    let path = resolve_config_path(config_path);

    let mut table = if path.exists() {
        read_table(&path)?
    } else {
        toml::Table::new()
    };

    let parts: Vec<&str> = key.split('.').collect();
    let (last_key, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: {}", key))?;

    let mut current = &mut table;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }

    let toml_value = if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(value.to_string())
    };
    current.insert(last_key.to_string(), toml_value);

    let new_content = toml::to_string_pretty(&table)?;
    let parsed: BrokerConfig = toml::from_str(&new_content)
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;
    parsed.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    std::fs::write(&path, new_content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = resolve_config_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}, showing defaults", path));
        print_info("Run 'hu-shell config init' to create one");
        println!();
        println!("{}", toml::to_string_pretty(&BrokerConfig::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write the default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = resolve_config_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &BrokerConfig::default())?;
    print_success(&format!("Created configuration file: {:?}", path));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_creates_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        config_set(Some(&path), "loopback.port", "5556").unwrap();
        let config: BrokerConfig = config::load_config(&path).unwrap();
        assert_eq!(config.loopback.port, 5556);

        assert!(config_set(Some(&path), "loopback.port", "0").is_err());
        assert!(config_set(Some(&path), "loopback.port", "not-a-port").is_err());
        let config: BrokerConfig = config::load_config(&path).unwrap();
        assert_eq!(config.loopback.port, 5556);
    }

    #[test]
    fn test_init_respects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[loopback]\nport = 6000\n").unwrap();

        config_init(Some(&path), false).unwrap();
        let config: BrokerConfig = config::load_config(&path).unwrap();
        assert_eq!(config.loopback.port, 6000);

        config_init(Some(&path), true).unwrap();
        let config: BrokerConfig = config::load_config(&path).unwrap();
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_invalid_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(config_set(Some(&path), "loopback.", "1").is_err());
        assert!(!path.exists());
    }
}
