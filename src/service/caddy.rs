use std::path::Path;
use std::time::Duration;

use crate::cmd;
use crate::error::{ProxyError, ProxyResult};
use crate::service::ServiceManager;
use crate::validate::Diagnostic;

/// Production `ServiceManager`: `caddy validate` for the merged
/// check, `systemctl reload` for the swap. Caddy itself keeps the
/// old configuration serving when a reload is rejected, which is
/// exactly the transactional behavior the trait requires.
pub struct CaddyService {
    program: String,
    unit: String,
    check_timeout: Duration,
}

impl CaddyService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "caddy".to_string(),
            unit: "caddy".to_string(),
            check_timeout: Duration::from_secs(10),
        }
    }

    /// Path or name of the caddy binary.
    #[must_use]
    pub fn program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Systemd unit to reload.
    #[must_use]
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    /// Deadline for a single `caddy validate` run.
    #[must_use]
    pub const fn check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }
}

impl Default for CaddyService {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager for CaddyService {
    fn check_prerequisites(&self) -> ProxyResult<()> {
        for program in [self.program.as_str(), "systemctl"] {
            if !cmd::command_exists(program) {
                return Err(ProxyError::PrerequisiteMissing(format!(
                    "'{program}' not found on PATH",
                )));
            }
        }
        Ok(())
    }

    fn check(&self, root: &Path) -> ProxyResult<()> {
        let root = root
            .to_str()
            .ok_or_else(|| ProxyError::Other(format!("non-UTF8 root path: {}", root.display())))?;

        match cmd::run_with_timeout(
            &self.program,
            &["validate", "--config", root, "--adapter", "caddyfile"],
            self.check_timeout,
        ) {
            Ok(_) => Ok(()),
            Err(ProxyError::CommandFailed { stderr, .. }) => {
                let mut diagnostics: Vec<Diagnostic> = stderr
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(Diagnostic::global)
                    .collect();
                if diagnostics.is_empty() {
                    diagnostics.push(Diagnostic::global("caddy validate failed"));
                }
                Err(ProxyError::Validation { diagnostics })
            }
            Err(other) => Err(other),
        }
    }

    fn reload(&self) -> ProxyResult<()> {
        cmd::run("systemctl", &["reload", &self.unit])
            .map(|_| ())
            .map_err(|e| match e {
                ProxyError::CommandFailed { status, stderr, .. } => ProxyError::ServiceReload(
                    format!("systemctl reload {} exited {status}: {stderr}", self.unit),
                ),
                other => ProxyError::ServiceReload(other.to_string()),
            })
    }
}
