use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bootstrap;
use crate::caddyfile;
use crate::error::{ProxyError, ProxyResult};
use crate::fragment::Fragment;
use crate::layout::Layout;
use crate::reconcile::{ReconcileResult, ReconcileState, Reconciler};
use crate::root::RootConfig;
use crate::service::ServiceManager;
use crate::service::caddy::CaddyService;
use crate::snapshot::SnapshotStore;
use crate::store::FragmentStore;

/// The managed reverse proxy: root configuration, fragment store,
/// snapshots, and the reconciler, wired together behind one CLI.
///
/// Embed it in a small binary (or an `xtask`) on the host:
///
/// ```rust,no_run
/// use trellis::{Proxy, RootConfig};
///
/// fn main() -> anyhow::Result<()> {
///     let proxy = Proxy::new(RootConfig::new("admin@example.com"));
///     proxy.run()?;
///     Ok(())
/// }
/// ```
pub struct Proxy {
    layout: Layout,
    root: RootConfig,
    service: Arc<dyn ServiceManager>,
    keep_snapshots: usize,
    validation_timeout: Duration,
    reconciler: OnceLock<Reconciler>,
}

impl Proxy {
    #[must_use]
    pub fn new(root: RootConfig) -> Self {
        Self {
            layout: Layout::default(),
            root,
            service: Arc::new(CaddyService::new()),
            keep_snapshots: 10,
            validation_timeout: Duration::from_secs(10),
            reconciler: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Swap the service adapter; tests use scripted fakes here.
    #[must_use]
    pub fn service(mut self, service: impl ServiceManager + 'static) -> Self {
        self.service = Arc::new(service);
        self
    }

    #[must_use]
    pub const fn keep_snapshots(mut self, keep: usize) -> Self {
        self.keep_snapshots = keep;
        self
    }

    #[must_use]
    pub const fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Initialize the root configuration and directories - the
    /// proxy owner's one-time bootstrap; safe to re-run.
    pub fn init(&self) -> ProxyResult<()> {
        bootstrap::initialize(&self.layout, &self.root, &self.snapshots())
    }

    /// Write a tenant fragment and, unless told otherwise, reconcile.
    pub fn deploy(
        &self,
        fragment: &Fragment,
        reload: bool,
    ) -> ProxyResult<Option<ReconcileResult>> {
        self.store().write(fragment)?;
        self.maybe_reconcile(reload)
    }

    pub fn disable(&self, name: &str, reload: bool) -> ProxyResult<Option<ReconcileResult>> {
        self.store().disable(name)?;
        self.maybe_reconcile(reload)
    }

    pub fn enable(&self, name: &str, reload: bool) -> ProxyResult<Option<ReconcileResult>> {
        self.store().enable(name)?;
        self.maybe_reconcile(reload)
    }

    pub fn remove(&self, name: &str, reload: bool) -> ProxyResult<Option<ReconcileResult>> {
        self.store().remove(name)?;
        self.maybe_reconcile(reload)
    }

    /// Run one validate-then-swap cycle.
    pub fn reconcile(&self) -> ProxyResult<ReconcileResult> {
        self.reconciler().reconcile()
    }

    /// Restore the most recent root snapshot and reconcile.
    pub fn rollback(&self) -> ProxyResult<ReconcileResult> {
        let snapshot = self.snapshots().restore_latest(&self.layout.root_file)?;
        eprintln!("Restored {}", snapshot.display());
        self.reconcile()
    }

    pub fn status(&self) -> ProxyResult<Status> {
        let store = self.store();
        Ok(Status {
            state: self.reconciler().state(),
            active: store.active()?.keys().cloned().collect(),
            disabled: store.disabled()?,
            last: self.reconciler().last(),
        })
    }

    /// Parse CLI arguments and dispatch the appropriate command.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatched command fails; a rejected
    /// reconciliation surfaces as `ProxyError::Validation` so the
    /// process exit status tells the deploying pipeline what
    /// happened.
    pub fn run(&self) -> ProxyResult<()> {
        init_tracing();
        let cli = Cli::parse();

        match &cli.command {
            Command::Init { email } => self.cmd_init(email.as_deref()),
            Command::Deploy {
                name,
                domain,
                port,
                upstream,
                headers,
                security_headers,
                gzip,
                file,
                no_reload,
                dry_run,
            } => {
                let fragment = build_fragment(
                    name.as_deref(),
                    domain.as_deref(),
                    *port,
                    upstream.as_deref(),
                    headers,
                    *security_headers,
                    *gzip,
                    file.as_deref(),
                )?;
                self.cmd_deploy(&fragment, *no_reload, *dry_run)
            }
            Command::Disable { name, no_reload } => {
                self.disable(name, !no_reload).and_then(report_optional)
            }
            Command::Enable { name, no_reload } => {
                self.enable(name, !no_reload).and_then(report_optional)
            }
            Command::Remove { name, no_reload } => {
                self.remove(name, !no_reload).and_then(report_optional)
            }
            Command::Reload => self.reconcile().and_then(report),
            Command::Status { json } => self.cmd_status(*json),
            Command::Rollback => self.rollback().and_then(report),
        }
    }

    fn cmd_init(&self, email: Option<&str>) -> ProxyResult<()> {
        self.service.check_prerequisites()?;

        let root = email.map_or_else(
            || self.root.clone(),
            |email| {
                let mut root = self.root.clone();
                root.email = email.to_string();
                root
            },
        );
        bootstrap::initialize(&self.layout, &root, &self.snapshots())?;
        eprintln!("Root configuration written: {}", self.layout.root_file.display());
        eprintln!("Fragment directory: {}", self.layout.fragment_dir.display());
        Ok(())
    }

    fn cmd_deploy(&self, fragment: &Fragment, no_reload: bool, dry_run: bool) -> ProxyResult<()> {
        if dry_run {
            eprintln!("=== Dry run: no changes will be made ===");
            eprintln!();
            eprintln!(
                "--- {} ---",
                self.layout.fragment_path(&fragment.name).display(),
            );
            println!("{}", caddyfile::render_fragment(fragment, &self.layout));
            return Ok(());
        }

        let path = self.store().write(fragment)?;
        eprintln!("Fragment written: {}", path.display());

        self.deploy_reload(no_reload)
    }

    fn deploy_reload(&self, no_reload: bool) -> ProxyResult<()> {
        if no_reload {
            eprintln!("Reload skipped; run 'reload' to apply");
            return Ok(());
        }
        self.reconcile().and_then(report)
    }

    fn cmd_status(&self, json: bool) -> ProxyResult<()> {
        let status = self.status()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!("state: {}", status.state);
        println!("fragments ({}):", status.active.len());
        for name in &status.active {
            println!("  {name}");
        }
        if !status.disabled.is_empty() {
            println!("disabled ({}):", status.disabled.len());
            for name in &status.disabled {
                println!("  {name}");
            }
        }
        if let Some(last) = &status.last {
            if last.valid {
                println!(
                    "last reconciliation: applied at {}",
                    last.applied_at.unwrap_or_default(),
                );
            } else {
                println!("last reconciliation: rejected");
                for diagnostic in &last.diagnostics {
                    println!("  {diagnostic}");
                }
            }
        }
        Ok(())
    }

    fn maybe_reconcile(&self, reload: bool) -> ProxyResult<Option<ReconcileResult>> {
        if reload {
            self.reconcile().map(Some)
        } else {
            Ok(None)
        }
    }

    fn store(&self) -> FragmentStore {
        FragmentStore::new(self.layout.clone())
    }

    fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.layout.snapshot_dir.clone()).keep(self.keep_snapshots)
    }

    fn reconciler(&self) -> &Reconciler {
        self.reconciler.get_or_init(|| {
            Reconciler::new(self.layout.clone(), Arc::clone(&self.service))
                .timeout(self.validation_timeout)
                .keep_snapshots(self.keep_snapshots)
        })
    }
}

/// Point-in-time view for `status`.
#[derive(Debug, Serialize)]
pub struct Status {
    pub state: ReconcileState,
    pub active: Vec<String>,
    pub disabled: Vec<String>,
    pub last: Option<ReconcileResult>,
}

fn report(result: ReconcileResult) -> ProxyResult<()> {
    if result.valid {
        eprintln!("Configuration applied");
        return Ok(());
    }

    eprintln!("Configuration rejected; previous configuration keeps serving:");
    for diagnostic in &result.diagnostics {
        eprintln!("  {diagnostic}");
    }
    Err(ProxyError::Validation {
        diagnostics: result.diagnostics,
    })
}

fn report_optional(result: Option<ReconcileResult>) -> ProxyResult<()> {
    match result {
        Some(result) => report(result),
        None => {
            eprintln!("Reload skipped; run 'reload' to apply");
            Ok(())
        }
    }
}

#[allow(clippy::fn_params_excessive_bools, clippy::too_many_arguments)]
fn build_fragment(
    name: Option<&str>,
    domain: Option<&str>,
    port: Option<u16>,
    upstream: Option<&str>,
    headers: &[String],
    security_headers: bool,
    gzip: bool,
    file: Option<&std::path::Path>,
) -> ProxyResult<Fragment> {
    let mut fragment = if let Some(file) = file {
        Fragment::from_yaml_file(file)?
    } else {
        let (Some(name), Some(domain), Some(port)) = (name, domain, port) else {
            return Err(ProxyError::Other(
                "--name, --domain, and --port are required unless --file is given".into(),
            ));
        };
        Fragment::new(name, domain, port)
    };

    if let Some(upstream) = upstream {
        fragment = fragment.upstream_host(upstream);
    }
    for header in headers {
        let (key, value) = header.split_once('=').ok_or_else(|| {
            ProxyError::Other(format!("--header expects NAME=VALUE, got '{header}'"))
        })?;
        fragment = fragment.header(key, value);
    }
    if security_headers {
        fragment = fragment.security_headers();
    }
    if gzip {
        fragment = fragment.gzip();
    }
    Ok(fragment)
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Multi-tenant reverse-proxy fragment management")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the root configuration and directory layout
    Init {
        /// Override the operator contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Write an application's fragment and reload the proxy
    Deploy {
        /// Fragment name; also the config file stem and log name
        #[arg(long)]
        name: Option<String>,

        /// Public domain routed to the application
        #[arg(long)]
        domain: Option<String>,

        /// Upstream port the application listens on
        #[arg(long)]
        port: Option<u16>,

        /// Upstream host when not localhost
        #[arg(long)]
        upstream: Option<String>,

        /// Response header as NAME=VALUE (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,

        /// Apply the standard security header set
        #[arg(long)]
        security_headers: bool,

        /// Enable gzip response encoding
        #[arg(long)]
        gzip: bool,

        /// Read the fragment definition from a YAML descriptor
        #[arg(long)]
        file: Option<PathBuf>,

        /// Write the fragment without reloading
        #[arg(long)]
        no_reload: bool,

        /// Preview the rendered fragment without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Exclude a fragment from the proxy without deleting it
    Disable {
        /// Fragment name
        name: String,

        /// Skip the reload after renaming
        #[arg(long)]
        no_reload: bool,
    },

    /// Bring a disabled fragment back into the proxy
    Enable {
        /// Fragment name
        name: String,

        /// Skip the reload after renaming
        #[arg(long)]
        no_reload: bool,
    },

    /// Delete a fragment
    Remove {
        /// Fragment name
        name: String,

        /// Skip the reload after deleting
        #[arg(long)]
        no_reload: bool,
    },

    /// Validate all fragments and reload the proxy
    Reload,

    /// Show fragments and the last reconciliation outcome
    Status {
        /// Emit machine-readable JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Restore the latest root snapshot and reload
    Rollback,
}
