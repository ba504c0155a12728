//! Desired-state reconciliation for NSX-T.
//!
//! Reads one declarative resource (a distributed firewall section with its
//! rules, or a Tier-0 gateway with its locale services, interfaces, BGP
//! configuration and static routes), compares it with what the NSX manager
//! currently holds, and issues at most one create, update or delete call to
//! converge the two.
//!
//! # Architecture
//!
//! ## Input
//!
//! - [`model`]: Typed desired-state tree and file loading (TOML or JSON)
//! - [`validate`]: Offline checks: names, duplicate siblings, placement anchors
//! - [`config`]: Manager connection settings from file, flags and environment
//!
//! ## Manager access
//!
//! - [`transport`]: The `Transport` seam and the blocking HTTP implementation
//! - [`remote`]: Paginated listings and existing resource trees
//! - [`capabilities`]: Server version gating
//! - [`catalog`]: Name-to-id snapshots of referenceable objects
//!
//! ## Reconciliation
//!
//! - [`resolve`]: Display-name references to ids and policy paths
//! - [`schemas`]: Comparison schemas handed to `nsx-diff-core`
//! - [`plan`]: Action selection and section placement
//! - [`wire`]: Manager API and hierarchical policy API request bodies
//! - [`apply`]: Execution, check mode and conflict reporting
//! - [`reconcile`]: The end-to-end pipeline for one resource
//!
//! ## Reporting
//!
//! - [`report`]: Colored terminal output for outcomes, plans and validation
//!
//! # Workflow
//!
//! 1. **Validate** the desired file before any request
//! 2. **Detect** the manager version (firewall sections only)
//! 3. **Resolve** references against a catalog snapshot
//! 4. **Fetch** the existing resource tree and **diff** it against the desired one
//! 5. **Plan** exactly one action and **apply** it, or report it in check mode
//!
//! # Examples
//!
//! ```ignore
//! use nsxt_reconcile::config::{resolve_config, ConfigOverrides};
//! use nsxt_reconcile::model::load_desired;
//! use nsxt_reconcile::reconcile::reconcile;
//! use nsxt_reconcile::transport::HttpTransport;
//!
//! let config = resolve_config("nsxt.toml".as_ref(), true, &ConfigOverrides::default())?;
//! let transport = HttpTransport::new(&config)?;
//! let desired = load_desired("section.toml".as_ref())?;
//! let outcome = reconcile(&transport, desired, true)?;
//! println!("{} {:?}", outcome.action, outcome.payload);
//! ```

pub mod apply;
pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod model;
pub mod plan;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod resolve;
pub mod schemas;
pub mod transport;
pub mod validate;
pub mod wire;
