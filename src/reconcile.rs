use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::error::{ProxyError, ProxyResult};
use crate::layout::Layout;
use crate::service::ServiceManager;
use crate::snapshot::{SnapshotStore, epoch_secs};
use crate::store::FragmentStore;
use crate::validate::{self, Diagnostic};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a reconciliation attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Validation,
    Timeout,
}

/// Reconciler state. `Validating`, `Applying`, and `Rejected` are
/// transient and only ever held while the reconciliation lock is
/// taken, so observers see `Idle` or `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    Idle,
    Validating,
    Applying,
    Active,
    Rejected,
}

impl std::fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::Active => "active",
            Self::Rejected => "rejected",
        })
    }
}

/// Outcome of one reconciliation attempt. Not persisted anywhere
/// beyond [`Reconciler::last`]; logs are the durable record.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub applied_at: Option<u64>,
    pub rejection: Option<Rejection>,
}

impl ReconcileResult {
    fn applied() -> Self {
        Self {
            valid: true,
            diagnostics: Vec::new(),
            applied_at: Some(epoch_secs()),
            rejection: None,
        }
    }

    fn rejected(rejection: Rejection, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            valid: false,
            diagnostics,
            applied_at: None,
            rejection: Some(rejection),
        }
    }
}

enum Verdict {
    Clean,
    Rejected(Rejection, Vec<Diagnostic>),
}

struct Inner {
    state: ReconcileState,
    last: Option<ReconcileResult>,
}

/// Validate-then-swap orchestrator for the shared proxy.
///
/// One reconciliation runs at a time (the internal lock serializes
/// attempts); each attempt walks
/// `Idle -> Validating -> {Applying -> Active, Rejected -> Idle}`.
/// A rejected attempt never touches the serving configuration - that
/// is the core guarantee keeping one tenant's broken fragment from
/// taking every other tenant down.
pub struct Reconciler {
    layout: Layout,
    store: FragmentStore,
    service: Arc<dyn ServiceManager>,
    snapshots: SnapshotStore,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl Reconciler {
    #[must_use]
    pub fn new(layout: Layout, service: Arc<dyn ServiceManager>) -> Self {
        let snapshots = SnapshotStore::new(layout.snapshot_dir.clone());
        let store = FragmentStore::new(layout.clone());
        Self {
            layout,
            store,
            service,
            snapshots,
            timeout: DEFAULT_TIMEOUT,
            inner: Mutex::new(Inner {
                state: ReconcileState::Idle,
                last: None,
            }),
        }
    }

    /// Deadline for the whole validating phase (static checks plus
    /// the merged validator run). Overrunning it rejects the attempt.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Root-configuration snapshots to retain for rollback.
    #[must_use]
    pub fn keep_snapshots(mut self, keep: usize) -> Self {
        self.snapshots = SnapshotStore::new(self.layout.snapshot_dir.clone()).keep(keep);
        self
    }

    #[must_use]
    pub fn state(&self) -> ReconcileState {
        self.lock().state
    }

    /// The most recent attempt's outcome, if any attempt ran.
    #[must_use]
    pub fn last(&self) -> Option<ReconcileResult> {
        self.lock().last.clone()
    }

    /// Run one validate-then-swap cycle.
    ///
    /// Returns `Ok` with the attempt outcome for both applied and
    /// rejected attempts; rejection is an expected, reportable
    /// result, not an error. The only `Err` worth alerting on is
    /// `ServiceReload`: validation passed but the serving process
    /// refused the swap, which usually means the validator and the
    /// server disagree about the config (version skew). In that case
    /// the pre-apply snapshot is restored before the error surfaces.
    pub fn reconcile(&self) -> ProxyResult<ReconcileResult> {
        let mut inner = self.lock();

        inner.state = ReconcileState::Validating;
        tracing::debug!(root = %self.layout.root_file.display(), "reconciliation started");

        let verdict = match self.validating_phase() {
            Ok(verdict) => verdict,
            Err(e) => {
                inner.state = ReconcileState::Idle;
                return Err(e);
            }
        };

        match verdict {
            Verdict::Rejected(rejection, diagnostics) => {
                inner.state = ReconcileState::Rejected;
                tracing::warn!(
                    ?rejection,
                    problems = diagnostics.len(),
                    "reconciliation rejected; previous configuration keeps serving"
                );
                let result = ReconcileResult::rejected(rejection, diagnostics);
                inner.last = Some(result.clone());
                inner.state = ReconcileState::Idle;
                Ok(result)
            }
            Verdict::Clean => {
                inner.state = ReconcileState::Applying;
                let snapshot = match self.snapshots.take(&self.layout.root_file) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        inner.state = ReconcileState::Idle;
                        return Err(e);
                    }
                };

                match self.service.reload() {
                    Ok(()) => {
                        inner.state = ReconcileState::Active;
                        let result = ReconcileResult::applied();
                        inner.last = Some(result.clone());
                        tracing::info!("merged configuration applied");
                        Ok(result)
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "reload failed after validation passed; restoring snapshot"
                        );
                        if snapshot.is_some() {
                            if let Err(restore) =
                                self.snapshots.restore_latest(&self.layout.root_file)
                            {
                                tracing::error!(error = %restore, "snapshot restore failed");
                            }
                        }
                        inner.state = ReconcileState::Idle;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Static per-fragment checks plus the merged validator run,
    /// bounded by the configured timeout. Runs on a worker thread so
    /// an overrun can be abandoned instead of waited out.
    fn validating_phase(&self) -> ProxyResult<Verdict> {
        let fragments = self.store.active()?;
        let names: Vec<String> = fragments.keys().cloned().collect();
        let work: Vec<(String, PathBuf)> = fragments.into_iter().collect();

        let (tx, rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        let root = self.layout.root_file.clone();

        thread::spawn(move || {
            let verdict = run_checks(&work, &root, service.as_ref(), &names);
            let _ = tx.send(verdict);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(verdict) => Ok(verdict),
            Err(_) => Ok(Verdict::Rejected(
                Rejection::Timeout,
                vec![Diagnostic::global(&format!(
                    "validation did not finish within {:?}",
                    self.timeout,
                ))],
            )),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_checks(
    work: &[(String, PathBuf)],
    root: &std::path::Path,
    service: &dyn ServiceManager,
    names: &[String],
) -> Verdict {
    let mut diagnostics = Vec::new();

    for (name, path) in work {
        match validate::check_file(path) {
            Ok(problems) => diagnostics.extend(problems.into_iter().map(|message| Diagnostic {
                fragment: Some(name.clone()),
                message,
            })),
            // A fragment deleted mid-reconcile will not be imported
            // either; skip it rather than failing the attempt.
            Err(ProxyError::Io(ref io)) if io.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => diagnostics.push(Diagnostic::for_fragment(name, &e.to_string())),
        }
    }

    if diagnostics.is_empty() {
        match service.check(root) {
            Ok(()) => return Verdict::Clean,
            Err(ProxyError::Validation { diagnostics: d }) => {
                diagnostics = validate::attribute(d, names);
            }
            Err(ProxyError::Timeout(t)) => {
                return Verdict::Rejected(
                    Rejection::Timeout,
                    vec![Diagnostic::global(&format!(
                        "merged validator timed out after {t:?}",
                    ))],
                );
            }
            Err(other) => diagnostics.push(Diagnostic::global(&other.to_string())),
        }
    }

    Verdict::Rejected(Rejection::Validation, diagnostics)
}
