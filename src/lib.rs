//! # puzvault
//!
//! A self-hosted crossword puzzle aggregator backend.
//!
//! Scheduled agents fetch puzzle files from outlets into per-source
//! drop directories; the importer validates, fingerprints and catalogs
//! them into a permanent store backed by SQLite. The web/feed layer is
//! a separate collaborator that reads the catalog this crate maintains.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────────┐
//! │  Agents  │──▶ │ import/ drop  │──▶ │   Importer    │
//! │ (worker) │    │ directories   │    │ scan→validate │
//! └──────────┘    └───────────────┘    │ →hash→dedup   │
//!       ▲                              │ →catalog      │
//! ┌──────────┐                         └──────┬───────┘
//! │Scheduler │                ┌───────────────┼─────────────┐
//! └──────────┘                ▼               ▼             ▼
//!                        puzzles/          errors/        SQLite
//!                     (permanent store) (quarantine)    (catalog)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pzv init                          # create database
//! pzv source add "Daily" --code daily
//! pzv scan                          # one import pass
//! pzv run                           # importer daemon (watch mode)
//! pzv worker                        # agent worker + scheduler
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Ready-pair discovery across source directories |
//! | [`validate`] | Sidecar + `.puz` validation |
//! | [`hash`] | Streaming content fingerprinting |
//! | [`catalog`] | Puzzle catalog storage and dedup gate |
//! | [`quarantine`] | Failure quarantine |
//! | [`import`] | Per-candidate import orchestration |
//! | [`watcher`] | Event-driven / polling importer daemon |
//! | [`agents`] | Agent trait and registry |
//! | [`scheduler`] | Agent schedule evaluation |
//! | [`worker`] | Agent task worker loop |
//! | [`preview`] | Empty-grid SVG previews |
//! | [`puz`] | AcrossLite `.puz` reader |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agents;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod import;
pub mod migrate;
pub mod models;
pub mod preview;
pub mod puz;
pub mod quarantine;
pub mod scanner;
pub mod scheduler;
pub mod sources;
pub mod validate;
pub mod watcher;
pub mod worker;
