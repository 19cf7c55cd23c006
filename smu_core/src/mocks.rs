//! Test and demo doubles for the instrument link.

use smu_traits::InstrumentLink;
use std::sync::{Arc, Mutex};

/// Shared command log. Clone a handle before moving the link into a
/// controller to assert on the traffic afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Count of set-voltage writes, the per-sample traffic.
    pub fn voltage_writes(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|c| c.starts_with("SOUR:VOLT "))
            .count()
    }

    fn push(&self, command: &str) {
        if let Ok(mut g) = self.0.lock() {
            g.push(command.to_string());
        }
    }
}

/// Scriptable in-memory link: records every command, answers queries with a
/// canned reply, and can be told to fail on a command prefix.
pub struct ScriptedLink {
    log: CommandLog,
    is_connected: bool,
    fail_on: Option<String>,
    fail_queries: bool,
    query_reply: String,
}

impl ScriptedLink {
    pub fn connected() -> Self {
        Self {
            log: CommandLog::default(),
            is_connected: true,
            fail_on: None,
            fail_queries: false,
            query_reply: "1".into(),
        }
    }

    /// A link with no device behind it; runs take the simulated path.
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            ..Self::connected()
        }
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Fail any write whose command starts with `prefix`.
    pub fn fail_on(mut self, prefix: &str) -> Self {
        self.fail_on = Some(prefix.to_string());
        self
    }

    /// Fail every query; probes must survive this.
    pub fn fail_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }
}

impl InstrumentLink for ScriptedLink {
    fn connected(&self) -> bool {
        self.is_connected
    }

    fn write(&mut self, command: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(prefix) = &self.fail_on {
            if command.starts_with(prefix.as_str()) {
                return Err(Box::new(std::io::Error::other(format!(
                    "scripted failure on {command}"
                ))));
            }
        }
        self.log.push(command);
        Ok(())
    }

    fn query(
        &mut self,
        command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_queries {
            return Err(Box::new(std::io::Error::other(format!(
                "scripted query failure on {command}"
            ))));
        }
        self.log.push(command);
        Ok(self.query_reply.clone())
    }
}
