use assert_cmd::Command;

fn folio() -> Command {
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.env_remove("DATABASE_URI")
        .env_remove("PORT")
        .env_remove("API_PREFIX")
        .env_remove("FOLIO_ENV")
        .env("FOLIO_CONFIG_DIR", std::env::temp_dir().join("folio-cli-no-config"));
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn config_prints_defaults() {
    let stdout = stdout_of(folio().arg("config"));

    assert!(stdout.contains("environment = development"));
    assert!(stdout.contains("server.port = 1234"));
    assert!(stdout.contains("server.api_prefix = api"));
    assert!(stdout.contains("database.uri = mem://"));
}

#[test]
fn config_honours_plain_overrides() {
    let stdout = stdout_of(
        folio()
            .arg("config")
            .env("PORT", "4321")
            .env("API_PREFIX", "library")
            .env("DATABASE_URI", "ws://root:secret@db:8000"),
    );

    assert!(stdout.contains("server.port = 4321"));
    assert!(stdout.contains("server.api_prefix = library"));
    assert!(stdout.contains("database.uri = ws://***@db:8000"));
}

#[test]
fn unknown_environment_fails() {
    let output = folio()
        .arg("config")
        .env("FOLIO_ENV", "staging")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();

    assert!(String::from_utf8(output).unwrap().contains("staging"));
}

#[test]
fn migrate_against_in_memory_store() {
    let stdout = stdout_of(folio().arg("migrate").env("DATABASE_URI", "mem://"));

    assert!(stdout.contains("applied 2 migration(s)"));
}
