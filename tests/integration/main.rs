//! Integration tests for shcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use serial_test::serial;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Stdio;
    use tempfile::TempDir;

    /// Binary isolated from the user's config and cache
    fn shcache(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("shcache");
        cmd.env("SHCACHE_CONFIG", temp.path().join("config.toml"))
            .env("SHCACHE_CACHE_DIR", temp.path().join("cache"))
            .env_remove("SHCACHE_TIMEOUT");
        cmd
    }

    fn counted_command(temp: &TempDir) -> (String, PathBuf) {
        let counter = temp.path().join("runs");
        let command = format!("echo run >> {}; sleep 1; echo done", counter.display());
        (command, counter)
    }

    fn run_count(counter: &Path) -> usize {
        fs::read_to_string(counter)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache the output"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shcache"));
    }

    #[test]
    fn get_prints_output() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["get", "echo hello"])
            .assert()
            .success()
            .stdout("hello\n");
    }

    #[test]
    fn get_reuses_cached_output() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);

        shcache(&temp).args(["get", &command]).assert().success().stdout("done\n");
        shcache(&temp).args(["get", &command]).assert().success().stdout("done\n");

        assert_eq!(run_count(&counter), 1);
    }

    #[test]
    fn update_forces_a_run() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);

        shcache(&temp).args(["get", &command]).assert().success();
        shcache(&temp).args(["update", &command]).assert().success().stdout("done\n");

        assert_eq!(run_count(&counter), 2);
    }

    #[test]
    fn get_exit_propagates_cached_code() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["get", "--exit", "echo partial; exit 3"])
            .assert()
            .code(3)
            .stdout("partial\n");

        // Served from the entry the second time
        shcache(&temp)
            .args(["get", "--exit", "echo partial; exit 3"])
            .assert()
            .code(3);
    }

    #[test]
    fn code_prints_exit_code() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["code", "exit 2"])
            .assert()
            .success()
            .stdout("2\n");
    }

    #[test]
    fn expired_entry_is_rerun() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);

        shcache(&temp).args(["get", &command]).assert().success();
        std::thread::sleep(std::time::Duration::from_millis(2100));
        shcache(&temp)
            .args(["--timeout", "1", "get", &command])
            .assert()
            .success();

        assert_eq!(run_count(&counter), 2);
    }

    #[test]
    fn peek_missing_entry_is_empty() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["peek", "echo never-run"])
            .assert()
            .success()
            .stdout("");
    }

    #[test]
    fn peek_reads_existing_entry() {
        let temp = TempDir::new().unwrap();
        shcache(&temp).args(["get", "printf 'a\\nb\\n'"]).assert().success();
        shcache(&temp)
            .args(["peek", "--follow", "printf 'a\\nb\\n'"])
            .assert()
            .success()
            .stdout("a\nb\n");
    }

    #[test]
    fn status_reports_state() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["status", "--format", "json", "echo status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"needs-update\""))
            .stdout(predicate::str::contains("\"update_in_progress\": false"));

        shcache(&temp).args(["get", "echo status"]).assert().success();

        // A new process has nothing in memory yet, so it would reread
        shcache(&temp)
            .args(["status", "--format", "plain", "echo status"])
            .assert()
            .success()
            .stdout("needs-reread\n");
    }

    #[test]
    fn key_has_readable_prefix() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["key", "echo hello"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("echohello"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        shcache(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("timeout_secs = 60"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        shcache(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").is_file());
    }

    #[test]
    fn config_timeout_is_used() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "[cache]\ntimeout_secs = 7\n").unwrap();
        shcache(&temp)
            .args(["status", "--format", "json", "true"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"timeout_secs\": 7"));
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "[cache\n").unwrap();
        shcache(&temp)
            .args(["get", "true"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    #[serial]
    fn concurrent_processes_run_command_once() {
        let temp = TempDir::new().unwrap();
        let (command, counter) = counted_command(&temp);

        let children: Vec<_> = (0..3)
            .map(|_| {
                std::process::Command::new(env!("CARGO_BIN_EXE_shcache"))
                    .env("SHCACHE_CONFIG", temp.path().join("config.toml"))
                    .env("SHCACHE_CACHE_DIR", temp.path().join("cache"))
                    .args(["get", &command])
                    .stdout(Stdio::piped())
                    .spawn()
                    .unwrap()
            })
            .collect();

        for child in children {
            let output = child.wait_with_output().unwrap();
            assert!(output.status.success());
            assert_eq!(String::from_utf8_lossy(&output.stdout), "done\n");
        }
        assert_eq!(run_count(&counter), 1);
    }
}
