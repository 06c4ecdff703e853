//! Test-only helpers: scripted sessions, a recording lifecycle, fixture files.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::core::dialect::Dialect;
use crate::core::types::RemoteFailure;
use crate::error::RunError;
use crate::io::lifecycle::Lifecycle;
use crate::io::session::{Connector, Session, SubmitError};

#[derive(Debug, Default)]
struct Script {
    results: VecDeque<Result<(), SubmitError>>,
    submitted: Vec<String>,
    connects: u32,
    failing_connects: u32,
}

/// Connector whose sessions answer from a queue of scripted results.
///
/// Once the queue is empty every submission succeeds. All sessions opened by
/// one connector share the queue and the submission log.
#[derive(Debug, Default, Clone)]
pub struct ScriptedConnector {
    script: Rc<RefCell<Script>>,
}

impl ScriptedConnector {
    pub fn with_results(results: Vec<Result<(), SubmitError>>) -> Self {
        let connector = Self::default();
        connector.script.borrow_mut().results = results.into();
        connector
    }

    /// The first `count` connection attempts fail.
    pub fn failing_connects(self, count: u32) -> Self {
        self.script.borrow_mut().failing_connects = count;
        self
    }

    /// Code submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.script.borrow().submitted.clone()
    }

    /// Successful connections so far.
    pub fn connects(&self) -> u32 {
        self.script.borrow().connects
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn endpoint(&self) -> String {
        "scripted:0".to_string()
    }

    fn connect(&self, _dialect: Dialect) -> Result<ScriptedSession> {
        let mut script = self.script.borrow_mut();
        if script.failing_connects > 0 {
            script.failing_connects -= 1;
            bail!("connection refused");
        }
        script.connects += 1;
        Ok(ScriptedSession {
            script: Rc::clone(&self.script),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedSession {
    script: Rc<RefCell<Script>>,
}

impl Session for ScriptedSession {
    fn run(&mut self, code: &str) -> Result<(), SubmitError> {
        let mut script = self.script.borrow_mut();
        script.submitted.push(code.to_string());
        script.results.pop_front().unwrap_or(Ok(()))
    }
}

/// Lifecycle that records calls and optionally fails one of them.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    calls: RefCell<Vec<&'static str>>,
    fail_on: Option<&'static str>,
}

impl RecordingLifecycle {
    pub fn failing_on(call: &'static str) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn call(&self, name: &'static str) -> Result<(), RunError> {
        self.calls.borrow_mut().push(name);
        if self.fail_on == Some(name) {
            return Err(RunError::Lifecycle {
                command: format!("runtime {name}"),
                detail: "exit status 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Lifecycle for RecordingLifecycle {
    fn stop(&self) -> Result<(), RunError> {
        self.call("stop")
    }

    fn start(&self) -> Result<(), RunError> {
        self.call("start")
    }
}

/// Remote execution failure with a category.
pub fn execution_failure(category: &str, message: &str) -> SubmitError {
    SubmitError::Execution(RemoteFailure {
        category: Some(category.to_string()),
        message: message.to_string(),
    })
}

/// Temp tree with `a.py`, `b.md` (one python block, one groovy block) and `c.txt`.
pub fn mixed_fixture() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    write_file(temp.path(), "a.py", "a = 1\n");
    write_file(
        temp.path(),
        "b.md",
        "# Usage\n\n```python\nprint(a)\n```\n\n```groovy\nprintln a\n```\n",
    );
    write_file(temp.path(), "c.txt", "plain notes\n");
    temp
}

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(&path, contents).expect("write fixture");
    path
}
