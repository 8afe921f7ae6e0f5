use clap::Parser;
use rustquarantine::cli::Cli;
use rustquarantine::config::Config;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_hierarchy_defaults_file_env_cli() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    // 1. Defaults
    let config = Config::default();
    assert!(config.ignore_hidden);
    assert_eq!(config.schedule_interval_minutes, 60);
    assert_eq!(config.duplicates.min_size, 1);

    // 2. Config file overrides defaults
    let toml_content = r#"
quarantine_base = "/srv/quarantine"
schedule_interval_minutes = 30

[duplicates]
enabled = true
min_size = 512
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.quarantine_base, PathBuf::from("/srv/quarantine"));
    assert_eq!(config.schedule_interval_minutes, 30);
    assert!(config.duplicates.enabled);
    assert_eq!(config.duplicates.min_size, 512);
    assert!(config.ignore_hidden); // still the default

    // 3. Environment variables override the config file
    std::env::set_var("RUSTQUARANTINE_SCHEDULE_INTERVAL_MINUTES", "5");
    std::env::set_var("RUSTQUARANTINE_DUPLICATES__MIN_SIZE", "4096");
    let mut config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.schedule_interval_minutes, 5);
    assert_eq!(config.duplicates.min_size, 4096);
    assert!(config.duplicates.enabled); // still from the file

    // 4. CLI flags override environment variables
    let cli = Cli::try_parse_from([
        "rustquarantine",
        "watch",
        ".",
        "--interval-minutes",
        "2",
        "--quarantine-base",
        "/cli/base",
        "--include-hidden",
    ])
    .unwrap();
    config.merge_command(&cli.command);
    config.validate().unwrap();
    assert_eq!(config.schedule_interval_minutes, 2);
    assert_eq!(config.quarantine_base, PathBuf::from("/cli/base"));
    assert!(!config.ignore_hidden);
    assert_eq!(config.duplicates.min_size, 4096);

    // 5. A bad environment value is reported, not ignored
    std::env::set_var("RUSTQUARANTINE_SCHEDULE_INTERVAL_MINUTES", "0");
    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(format!("{err:#}").contains("schedule_interval_minutes"));

    // Clean up
    std::env::remove_var("RUSTQUARANTINE_SCHEDULE_INTERVAL_MINUTES");
    std::env::remove_var("RUSTQUARANTINE_DUPLICATES__MIN_SIZE");
}

#[test]
fn test_json_and_yaml_files_by_extension() {
    let temp_dir = tempdir().unwrap();

    let json_path = temp_dir.path().join("config.json");
    fs::write(
        &json_path,
        r#"{"preserve_structure": true, "duplicates": {"duplicates_dir": "/dupes"}}"#,
    )
    .unwrap();
    let config = Config::from_figment(Config::figment(Some(&json_path))).unwrap();
    assert!(config.preserve_structure);
    assert_eq!(config.duplicates_dir(), PathBuf::from("/dupes"));

    let yaml_path = temp_dir.path().join("config.yaml");
    fs::write(&yaml_path, "recursive: false\nignore_hidden: false\n").unwrap();
    let config = Config::from_figment(Config::figment(Some(&yaml_path))).unwrap();
    assert!(!config.recursive);
    assert!(!config.ignore_hidden);
}

#[test]
fn test_invalid_values_name_the_key() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, "recursive = \"sometimes\"").unwrap();
    let err = Config::from_figment(Config::figment(Some(&config_path))).unwrap_err();
    assert!(format!("{err:#}").contains("recursive"), "{err:#}");

    fs::write(&config_path, "schedule_interval_minutes = 0").unwrap();
    let err = Config::from_figment(Config::figment(Some(&config_path))).unwrap_err();
    assert!(format!("{err:#}").contains("schedule_interval_minutes"));
}

#[test]
fn test_cli_only_overrides_given_flags() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "preserve_structure = true\nrecursive = false\nquarantine_base = \"/from/file\"\n",
    )
    .unwrap();
    let mut config = Config::from_figment(Config::figment(Some(&config_path))).unwrap();

    let cli = Cli::try_parse_from(["rustquarantine", "scan", "."]).unwrap();
    config.merge_command(&cli.command);
    assert!(config.preserve_structure);
    assert!(!config.recursive);
    assert_eq!(config.quarantine_base, PathBuf::from("/from/file"));

    let cli = Cli::try_parse_from([
        "rustquarantine",
        "dupes",
        ".",
        "--min-size",
        "2KiB",
        "--duplicates-dir",
        "/elsewhere",
    ])
    .unwrap();
    config.merge_command(&cli.command);
    assert_eq!(config.duplicates.min_size, 2048);
    assert_eq!(config.duplicates_dir(), PathBuf::from("/elsewhere"));
    assert_eq!(config.quarantine_base, PathBuf::from("/from/file"));
}

#[test]
fn test_rendered_config_loads_back() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let mut config = Config::default();
    config.duplicates.enabled = true;
    config.schedule_interval_minutes = 15;
    fs::write(&config_path, config.to_toml().unwrap()).unwrap();

    let loaded = Config::from_figment(Config::figment(Some(&config_path))).unwrap();
    assert_eq!(loaded, config);
}
