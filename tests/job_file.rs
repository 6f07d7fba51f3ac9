// tests/job_file.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use jobrunner::config::{load_and_validate, load_from_path};
use jobrunner::errors::JobrunnerError;
use jobrunner::types::{CommandLine, Interactive};
use jobrunner_test_utils::builders::RawJobSpecBuilder;
use jobrunner_test_utils::init_tracing;
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

fn job_file(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

#[test]
fn full_job_file_is_loaded() -> TestResult {
    init_tracing();
    let file = job_file(
        r#"
command = ["ssh", "backup@host", "df -h"]
cwd = "/tmp"
pty = true
interactive = "echo"
timeout = "2m"
password_timeout = "10s"
input_delay = "250ms"
input = "yes\n"
password = ["first"]
inherit_env = false
close_stdin = false

[env]
LC_ALL = "C"
"#,
    )?;

    let spec = load_and_validate(file.path())?;
    let spawn = &spec.options.spawn;
    let comm = &spec.options.communicate;

    assert_eq!(
        spec.command,
        CommandLine::Tokens(vec![
            "ssh".to_string(),
            "backup@host".to_string(),
            "df -h".to_string()
        ])
    );
    assert_eq!(spawn.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
    assert!(spawn.pty);
    assert_eq!(
        spawn.env.as_ref().and_then(|env| env.get("LC_ALL")).map(String::as_str),
        Some("C")
    );
    assert_eq!(comm.interactive, Interactive::Echo);
    assert_eq!(comm.timeout, Some(Duration::from_secs(120)));
    assert_eq!(comm.password_timeout, Some(Duration::from_secs(10)));
    assert_eq!(comm.input_delay, Duration::from_millis(250));
    assert_eq!(comm.input.as_deref(), Some(b"yes\n".as_slice()));
    assert_eq!(comm.passwords, vec!["first".to_string()]);
    assert!(!comm.close_stdin);
    Ok(())
}

#[test]
fn command_string_and_defaults() -> TestResult {
    let file = job_file(r#"command = "echo 'hello world'""#)?;

    let raw = load_from_path(file.path())?;
    assert!(raw.inherit_env);
    assert!(raw.close_stdin);
    assert_eq!(raw.interactive, Interactive::Off);

    let spec = load_and_validate(file.path())?;
    assert_eq!(spec.options.spawn.env, None);
    assert!(spec.options.communicate.passwords.is_empty());
    Ok(())
}

#[test]
fn password_timeout_not_below_timeout_is_rejected() -> TestResult {
    let file = job_file(
        r#"
command = "true"
timeout = "5s"
password_timeout = "5s"
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(JobrunnerError::ConfigError(msg)) => {
            assert!(msg.contains("password_timeout"), "message: {msg}");
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn missing_command_is_rejected() -> TestResult {
    let file = job_file(r#"pty = true"#)?;

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(JobrunnerError::ConfigError(_))));
    Ok(())
}

#[test]
fn bad_duration_names_the_field() -> TestResult {
    let file = job_file(
        r#"
command = "true"
input_delay = "soon"
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(JobrunnerError::ConfigError(msg)) => assert!(msg.contains("input_delay")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_keys_are_toml_errors() -> TestResult {
    let file = job_file(
        r#"
command = "true"
retries = 3
"#,
    )?;

    let result = load_from_path(file.path());
    assert!(matches!(result, Err(JobrunnerError::TomlError(_))));
    Ok(())
}

#[test]
fn password_env_is_resolved_from_the_environment() -> TestResult {
    let path = std::env::var("PATH")?;
    let spec = RawJobSpecBuilder::new("true").password_env("PATH").build();
    assert_eq!(spec.options.communicate.passwords, vec![path]);

    let unset = jobrunner::config::JobSpec::try_from(
        RawJobSpecBuilder::new("true")
            .password_env("JOBRUNNER_SURELY_UNSET_VARIABLE")
            .raw(),
    );
    assert!(matches!(unset, Err(JobrunnerError::ConfigError(_))));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn loaded_job_runs() -> TestResult {
    init_tracing();
    let spec = RawJobSpecBuilder::new("sh -c 'echo $GREETING'")
        .env("GREETING", "from-job-file")
        .timeout("10s")
        .build();

    let job = jobrunner::run(spec.command, spec.options).await?;
    assert_eq!(job.stdout(), "from-job-file\n");
    Ok(())
}
