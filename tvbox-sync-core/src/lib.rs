#![doc = "tvbox-sync-core: acquisition pipeline for tvbox-sync."]

//! This crate holds the pipeline that keeps a local publish directory in step
//! with a remote repository snapshot: fetch (clone or zip download), extract,
//! merge, index and cleanup. The CLI and static file server live in the
//! `tvbox-sync` crate.
//!
//! # Usage
//! Build a [`config::SyncConfig`], pick a transport with
//! [`download::transport_for`] and call [`synchronise::synchronise`].

pub mod cleanup;
pub mod command;
pub mod config;
pub mod contract;
pub mod download;
pub mod extract;
pub mod index;
pub mod merge;
pub mod synchronise;
