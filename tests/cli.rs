use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;

#[allow(deprecated)]
fn base_command(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("atx-dev").expect("atx-dev binary available");
    let config_dir = temp.child("config-root");
    config_dir.create_dir_all().unwrap();
    cmd.env("ATX_CONFIG_DIR", config_dir.path());

    let data_dir = temp.child("data-root");
    data_dir.create_dir_all().unwrap();
    cmd.env("ATX_DATA_DIR", data_dir.path());

    let home_dir = temp.child("home");
    home_dir.create_dir_all().unwrap();
    cmd.env("HOME", home_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn link_builds_youtube_and_internal_urls() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["link", "abc123", "01:02:03"])
        .assert()
        .success()
        .stdout(contains("external: https://www.youtube.com/watch?v=abc123&t=3723s"))
        .stdout(contains("internal: /transcript/abc123#T01-02-03"))
        .stdout(contains("stream:   https://www.youtube.com/watch?v=abc123"));
    temp.close()?;
    Ok(())
}

#[test]
fn link_uses_twitch_offsets_for_twitch_streams() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["link", "998877", "01:02:03", "--type", "Twitch"])
        .assert()
        .success()
        .stdout(contains("https://www.twitch.tv/videos/998877?t=1h2m3s"))
        .stdout(contains("stream:   https://www.twitch.tv/videos/998877\n"));
    temp.close()?;
    Ok(())
}

#[test]
fn link_json_has_all_three_urls() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    let output = base_command(&temp)
        .args(["--json", "link", "abc", "00:00:10"])
        .output()?;
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["external"], "https://www.youtube.com/watch?v=abc&t=10s");
    assert_eq!(parsed["internal"], "/transcript/abc#T00-00-10");
    assert_eq!(parsed["stream"], "https://www.youtube.com/watch?v=abc");
    temp.close()?;
    Ok(())
}

#[test]
fn link_rejects_malformed_time_with_usage_code() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["link", "abc", "1:2"])
        .assert()
        .code(2)
        .stderr(contains("atx: invalid time '1:2'"));
    temp.close()?;
    Ok(())
}

#[test]
fn link_bases_follow_config() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    temp.child("config-root/config.toml").write_str(
        "[links]\ntwitch_base = \"https://tw.example/\"\nyoutube_base = \"https://yt.example\"\n",
    )?;
    base_command(&temp)
        .args(["link", "42", "00:01:00", "--type", "Twitch"])
        .assert()
        .success()
        .stdout(contains("external: https://tw.example/videos/42?t=0h1m0s"));
    temp.close()?;
    Ok(())
}

#[test]
fn config_where_lists_directories_and_server() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    temp.child("config-root/config.toml")
        .write_str("[api]\nbase_url = \"http://archive.test/api/\"\n")?;
    temp.child("config-root/conf.d/10-links.toml")
        .write_str("[links]\nyoutube_base = \"https://yt.example\"\n")?;
    base_command(&temp)
        .args(["config", "where"])
        .assert()
        .success()
        .stdout(contains("API server: http://archive.test/api\n"))
        .stdout(contains("Sources (in load order):"))
        .stdout(contains("config.toml (main)"))
        .stdout(contains("10-links.toml (drop-in)"));
    temp.close()?;
    Ok(())
}

#[test]
fn server_flag_overrides_configured_base_url() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["--server", "http://127.0.0.1:9", "config", "where"])
        .assert()
        .success()
        .stdout(contains("API server: http://127.0.0.1:9"));
    temp.close()?;
    Ok(())
}

#[test]
fn config_lint_reports_clean_defaults() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["config", "lint"])
        .assert()
        .success()
        .stdout(contains("Configuration looks good."));
    temp.close()?;
    Ok(())
}

#[test]
fn config_lint_fails_on_non_http_server() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    temp.child("config-root/config.toml")
        .write_str("[api]\nbase_url = \"ftp://archive.test\"\n")?;
    base_command(&temp)
        .args(["config", "lint"])
        .assert()
        .code(1)
        .stdout(contains("error: api.base_url"))
        .stderr(contains("configuration contains errors"));
    temp.close()?;
    Ok(())
}

#[test]
fn unknown_config_keys_are_rejected() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    temp.child("config-root/config.toml")
        .write_str("[api]\nbase = \"http://archive.test\"\n")?;
    base_command(&temp)
        .args(["config", "where"])
        .assert()
        .failure()
        .stderr(contains("failed to decode configuration"));
    temp.close()?;
    Ok(())
}

#[test]
fn settings_round_trip_through_the_data_dir() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["settings", "set", "theme", "dark"])
        .assert()
        .success()
        .stdout(contains("Saved."));
    base_command(&temp)
        .args(["settings", "set", "sidebar", "closed"])
        .assert()
        .success();
    base_command(&temp)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(contains("theme: dark"))
        .stdout(contains("density: standard"))
        .stdout(contains("sidebar: closed"))
        .stdout(contains("membership key: not set"));
    temp.close()?;
    Ok(())
}

#[test]
fn settings_reject_unknown_values() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["settings", "set", "density", "roomy"])
        .assert()
        .code(2);
    temp.close()?;
    Ok(())
}

#[test]
fn membership_status_without_key() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["membership", "status"])
        .assert()
        .success()
        .stdout(contains("No membership key stored."));
    base_command(&temp)
        .args(["membership", "clear"])
        .assert()
        .success()
        .stdout(contains("Membership key deleted."));
    temp.close()?;
    Ok(())
}

#[test]
fn blank_graph_term_is_a_usage_error() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["--server", "http://127.0.0.1:9", "graph", "  "])
        .assert()
        .code(2)
        .stderr(contains("atx: "));
    temp.close()?;
    Ok(())
}

#[test]
fn unreachable_server_exits_with_one() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["--server", "http://127.0.0.1:9", "transcript", "abc"])
        .assert()
        .code(1)
        .stderr(contains("atx: failed to fetch transcript abc").and(contains("caused by:")));
    temp.close()?;
    Ok(())
}

#[test]
fn maintenance_mode_blocks_network_commands() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    temp.child("config-root/config.toml").write_str(
        "[maintenance]\nenabled = true\nmessage = \"Back soon.\"\n",
    )?;
    base_command(&temp)
        .args(["search", "cat"])
        .assert()
        .failure()
        .stderr(contains("Back soon."));
    temp.close()?;
    Ok(())
}

#[test]
fn completions_mention_subcommands() -> color_eyre::Result<()> {
    let temp = TempDir::new()?;
    base_command(&temp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("stream-graph"));
    temp.close()?;
    Ok(())
}
