//! # cfstore
//!
//! An embeddable, persistent key-value storage engine built around
//! **column families**: independent, namespaced keyspaces, each with its
//! own memtables, write-ahead log, persistent index, and value log.
//!
//! Follows the WiscKey design of keeping large values out of the sorted
//! index and in a separate append-only value log, reached through a
//! small, stable pointer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    ColumnFamily                         │
//! │  ┌────────────┐  ┌──────────────┐                      │
//! │  │  Active     │  │   Frozen     │     flush worker     │
//! │  │  Memtable   │  │  Memtables   │ ───────────────────┐ │
//! │  │  + WAL      │  │  + WALs      │                    │ │
//! │  └─────┬───────┘  └──────┬───────┘                    │ │
//! │        │   rotate         │                            ▼ │
//! │        └─────────►       └──────►               ┌──────────┐
//! │                                                  │  Indexer │
//! │                                                  └────┬─────┘
//! │                                                       │ out-of-line
//! │                                                       ▼
//! │                                                 ┌───────────┐
//! │                                                 │ Value Log │
//! │                                                 └───────────┘
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`column_family`] | Engine core — open, get, put, delete, flush, GC, close |
//! | [`memtable`] | In-memory, WAL-backed write buffer for one memtable generation |
//! | [`wal`] | Generic, CRC-protected write-ahead log shared by memtable/indexer |
//! | [`indexer`] | Persistent ordered map from key to index entry (WAL + snapshot model) |
//! | [`vlog`] | Segmented, append-only store for out-of-line values, with GC |
//! | [`dirlock`] | Exclusive advisory locking for a column family's directories |
//! | [`config`] | Column family options and per-write options |
//! | [`error`] | Top-level error type |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is persisted to a WAL
//!   before being acknowledged, guaranteeing durability and crash
//!   recovery.
//! - **Value log separation** — values above `value_threshold` are
//!   written to an out-of-line, append-only value log instead of the
//!   index, keeping the index small and cache-friendly.
//! - **Background flush and GC** — frozen memtables drain into the
//!   indexer and value log on a dedicated thread; a second thread
//!   reclaims value log segments once their live-data ratio drops below
//!   `value_log_gc_ratio`.
//! - **Block-level CRC32 integrity** — every on-disk record (WAL,
//!   indexer, value log) is checksummed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cfstore::{ColumnFamily, ColumnFamilyOptions, WriteOptions};
//!
//! let opts = ColumnFamilyOptions::new("users", "/tmp/my_db");
//! let cf = ColumnFamily::open(opts).unwrap();
//!
//! cf.put(b"hello".to_vec(), b"world".to_vec(), WriteOptions::default()).unwrap();
//! assert_eq!(cf.get(b"hello").unwrap(), Some(b"world".to_vec()));
//!
//! cf.delete(b"hello".to_vec(), WriteOptions::default()).unwrap();
//! assert_eq!(cf.get(b"hello").unwrap(), None);
//!
//! cf.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod column_family;
pub mod config;
pub mod dirlock;
pub mod encoding;
pub mod error;
pub mod indexer;
pub mod memtable;
pub mod vlog;
pub mod wal;

pub use column_family::ColumnFamily;
pub use config::{ColumnFamilyOptions, IoMode, WriteOptions};
pub use error::{CfError, Result};
