//! Environment overrides mutate process state, so they live in their own
//! test binary away from the other config tests.

use simscan::config::{Config, ProviderKind};
use simscan::Result;

#[test]
fn test_env_overrides_file_values() -> Result<()> {
    use tempfile::Builder;

    let mut config = Config::default();
    config.session.ticks = 8;
    config.generator.model = "from-file".to_string();

    let temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    let temp_path = temp_file.path().to_str().unwrap();
    config.save_to_file(temp_path)?;

    std::env::set_var("SIMSCAN_SESSION__TICKS", "3");
    std::env::set_var("SIMSCAN_GENERATOR__PROVIDER", "ollama");
    let loaded = Config::load_from_file(temp_path);
    std::env::remove_var("SIMSCAN_SESSION__TICKS");
    std::env::remove_var("SIMSCAN_GENERATOR__PROVIDER");
    let loaded = loaded?;

    assert_eq!(loaded.session.ticks, 3);
    assert_eq!(loaded.generator.provider, ProviderKind::Ollama);
    assert_eq!(loaded.generator.model, "from-file");
    Ok(())
}
