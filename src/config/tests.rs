use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.provider.base_url = "https://test-host:8080/".to_string();
        original_config.provider.generation_model = "test-model".to_string();
        original_config.provider.batch_size = 32;

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn base_dir_is_not_serialized() {
        let config = Config {
            base_dir: "/tmp/somewhere".into(),
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&config).expect("should serialize");
        assert!(!toml_content.contains("/tmp/somewhere"));
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [provider
            base_url = "https://example.com"
            temperature = "warm"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_value_type_handling() {
        let invalid_toml = r#"
            [retrieval]
            top_k = "four"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn default_dir_is_app_specific() {
        if let Ok(dir) = get_config_dir() {
            assert!(dir.ends_with("pdf-qa"));
        }
    }
}
