use clap::Parser;
use dupescan::cli::{Cli, Commands};
use dupescan::config::{Config, ConfigError};
use figment::providers::{Format, Serialized, Toml};
use figment::{Figment, Jail};

#[test]
fn test_config_load_defaults() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.io_threads, 4);
}

#[test]
fn test_config_load_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "dupescan.toml",
            r#"
            io_threads = 8
            chunk_size = 65536
            parallel_threshold = 1048576
            follow_symlinks = true
            ignore_patterns = ["target/", "*.bak"]
            min_size = 1
            max_size = 1000000
            strict = true
            show_all = true
            "#,
        )?;

        let path = jail.directory().join("dupescan.toml");
        let config = Config::load(Some(&path)).map_err(|e| e.to_string())?;

        assert_eq!(config.io_threads, 8);
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.parallel_threshold, Some(1_048_576));
        assert!(config.follow_symlinks);
        assert!(!config.skip_hidden);
        assert_eq!(config.ignore_patterns, vec!["target/", "*.bak"]);
        assert_eq!(config.min_size, Some(1));
        assert_eq!(config.max_size, Some(1_000_000));
        assert!(config.strict);
        assert!(config.show_all);
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("c.toml", "io_threads = 8\nskip_hidden = false\n")?;
        jail.set_env("DUPESCAN_IO_THREADS", 32);
        jail.set_env("DUPESCAN_SKIP_HIDDEN", true);

        let config = Config::load(Some(&jail.directory().join("c.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.io_threads, 32);
        assert!(config.skip_hidden);
        Ok(())
    });
}

#[test]
fn test_cli_overrides_env() {
    Jail::expect_with(|jail| {
        jail.create_file("c.toml", "")?;
        jail.set_env("DUPESCAN_IO_THREADS", 32);

        let mut config = Config::load(Some(&jail.directory().join("c.toml"))).map_err(|e| e.to_string())?;
        let cli = Cli::try_parse_from(["dupescan", "scan", ".", "--io-threads", "3"]).map_err(|e| e.to_string())?;
        let Commands::Scan(args) = cli.command else {
            return Err("expected scan".to_string().into());
        };
        args.apply_to(&mut config);

        assert_eq!(config.io_threads, 3);
        Ok(())
    });
}

#[test]
fn test_invalid_file_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "min_size = 10\nmax_size = 5\n")?;
        let result = Config::load(Some(&jail.directory().join("bad.toml")));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        jail.create_file("typed.toml", "io_threads = \"many\"\n")?;
        let result = Config::load(Some(&jail.directory().join("typed.toml")));
        assert!(matches!(result, Err(ConfigError::Extract(_))));
        Ok(())
    });
}

#[test]
fn test_save_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = Config {
        io_threads: 6,
        max_size: Some(1 << 30),
        ignore_patterns: vec!["*.iso".into()],
        ..Default::default()
    };

    config.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("io_threads = 6"));
    assert!(!text.contains("min_size"));

    let loaded: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();
    assert_eq!(loaded.io_threads, 6);
    assert_eq!(loaded.ignore_patterns, vec!["*.iso"]);
    assert_eq!(loaded, config);
}
