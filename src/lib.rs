//! Multi-tenant reverse-proxy config management for Rust.
//!
//! Trellis runs one shared Caddy reverse proxy on a VPS and lets any
//! number of independently deployed applications hang their routes
//! off it - like plants on a trellis - without ever touching each
//! other's configuration. No hand-edited Caddyfile, no "who broke
//! the proxy" incidents.
//!
//! # Overview
//!
//! Two roles share the host:
//!
//! - The **proxy owner** initializes a root configuration once: a
//!   global options block (operator email, admin endpoint) plus a
//!   single wildcard import of the fragment directory. The root file
//!   never contains application routing.
//! - Each **tenant application** owns exactly one fragment file,
//!   `sites.d/<name>.caddy`, written atomically on every deploy. A
//!   fragment routes one public domain to one local upstream port,
//!   with its own response headers and access log.
//!
//! A deploy then triggers **reconciliation**: every fragment the
//! import pattern matches is validated, the merged configuration is
//! checked, and only then is the running proxy reloaded. A broken
//! fragment gets rejected with diagnostics naming the offender while
//! the previous configuration keeps serving - one tenant's mistake
//! never takes the others down.
//!
//! # Architecture
//!
//! The pieces line up behind [`Proxy`]:
//!
//! - [`RootConfig`] + [`Layout`] - what the owner controls and where
//!   everything lives on disk
//! - [`Fragment`] + [`FragmentStore`] - the per-tenant unit and the
//!   atomic, name-validated writer over the fragment directory
//! - [`Reconciler`] - the serialized validate-then-swap cycle with a
//!   bounded validation phase
//! - [`ServiceManager`] - the seam to `caddy validate` and
//!   `systemctl reload` (swap in a fake for tests)
//! - [`SnapshotStore`] - versioned root snapshots backing `rollback`
//!
//! # Examples
//!
//! ## Host-side management binary
//!
//! Create a small binary on the VPS (or an `xtask` in your infra
//! repo):
//!
//! ```rust,no_run
//! use trellis::{Proxy, RootConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let proxy = Proxy::new(
//!         RootConfig::new("admin@example.com").admin("localhost:2019"),
//!     );
//!     proxy.run()?;
//!     Ok(())
//! }
//! ```
//!
//! Then drive it per deploy:
//!
//! ```sh
//! # Once, at bootstrap
//! trellis init
//!
//! # From each application's CI job
//! trellis deploy --name app1 --domain app1.example.com --port 8080
//!
//! # Preview what would be written
//! trellis deploy --name app1 --domain app1.example.com --port 8080 --dry-run
//!
//! # Take a misbehaving app out without deleting its config
//! trellis disable app1
//! ```
//!
//! The exit status reports the reconciliation outcome, so a CI
//! pipeline fails when its fragment is rejected.
//!
//! ## Programmatic deploys
//!
//! ```rust,no_run
//! use trellis::{Fragment, Proxy, RootConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let proxy = Proxy::new(RootConfig::new("admin@example.com"));
//!
//!     let fragment = Fragment::new("app1", "app1.example.com", 8080)
//!         .security_headers()
//!         .gzip();
//!
//!     let result = proxy.deploy(&fragment, true)?;
//!     println!("applied: {:?}", result.map(|r| r.valid));
//!     Ok(())
//! }
//! ```
//!
//! ## Fragment descriptors in the app repo
//!
//! Tenants can keep the routing definition next to their code and
//! deploy with `--file`:
//!
//! ```yaml
//! name: app1
//! domain: app1.example.com
//! port: 8080
//! gzip: true
//! headers:
//!   X-Robots-Tag: noindex
//! ```
//!
//! # Caveats
//!
//! Fragment names are only as unique as the filesystem makes them:
//! two applications deploying under the same name silently overwrite
//! each other. Assign names centrally, one per repository.

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod bootstrap;
pub mod caddyfile;
pub mod cmd;
pub mod error;
pub mod fragment;
pub mod layout;
pub mod proxy;
pub mod reconcile;
pub mod root;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod validate;

pub use error::ProxyError;
pub use error::ProxyResult;
pub use fragment::Fragment;
pub use fragment::validate_name;
pub use layout::Layout;
pub use proxy::Proxy;
pub use proxy::Status;
pub use reconcile::ReconcileResult;
pub use reconcile::ReconcileState;
pub use reconcile::Reconciler;
pub use reconcile::Rejection;
pub use root::RootConfig;
pub use service::ServiceManager;
pub use service::caddy::CaddyService;
pub use snapshot::SnapshotStore;
pub use store::FragmentStore;
pub use validate::Diagnostic;
