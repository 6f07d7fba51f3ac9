#![allow(dead_code)]

//! Throwaway shell scripts for driving jobs in tests.

use std::fs;
use std::io;
use std::path::PathBuf;

use tempfile::TempDir;

/// A `/bin/sh` script living in its own temp directory. The directory is
/// removed when this is dropped.
///
/// Scripts are run through `sh` rather than exec'd directly, so a file still
/// open in a concurrently forked test process cannot cause `ETXTBSY`.
pub struct Script {
    dir: TempDir,
    path: PathBuf,
}

impl Script {
    pub fn new(body: &str) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("script.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Command tokens that run the script.
    pub fn command(&self) -> Vec<String> {
        vec!["/bin/sh".to_string(), self.path.display().to_string()]
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

/// Prompts with echo off until it reads `expected`, like `sudo` or `ssh`.
/// Echo stays off between attempts and comes back on once accepted.
pub fn password_prompt(expected: &str) -> io::Result<Script> {
    Script::new(&format!(
        r#"stty -echo
while true; do
  printf 'Password: '
  read -r pw
  printf '\n'
  if [ "$pw" = "{expected}" ]; then
    stty echo
    echo "access granted"
    exit 0
  fi
  echo "Sorry, try again." >&2
done"#
    ))
}

/// Asks for each of `expected` in turn, re-enabling echo only after the last
/// one; exits 1 on the first wrong answer.
pub fn multi_password_prompt(expected: &[&str]) -> io::Result<Script> {
    let mut body = String::from("stty -echo\n");
    for (index, secret) in expected.iter().enumerate() {
        body.push_str(&format!(
            r#"printf 'Password {n}: '
read -r pw
printf '\n'
if [ "$pw" != "{secret}" ]; then
  stty echo
  echo "wrong password {n}" >&2
  exit 1
fi
"#,
            n = index + 1
        ));
    }
    body.push_str(&format!(
        "stty echo\necho \"all {} accepted\"\n",
        expected.len()
    ));
    Script::new(&body)
}
