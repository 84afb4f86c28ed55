//! penpot-mcp: MCP server for editing Penpot design files
//!
//! This library exposes structural edits on Penpot files (pages, shapes,
//! components and token bindings) as MCP tools. Every edit is computed
//! locally from a freshly fetched file and submitted to the Penpot backend
//! as a revision-checked change list.
//!
//! # Architecture
//!
//! - **Document model**: a lossless view of a fetched file, with typed
//!   accessors for the attributes the edits touch
//! - **Edit planning**: pure functions from a document to a change list
//! - **Remote access**: fetch and submit through [`remote::DocumentService`]
//! - **Tools**: argument parsing and result formatting for each MCP tool
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`document`] — File, page, shape and change types
//! - [`edit`] — Change planning for each mutation
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation
//! - [`remote`] — Document service clients
//! - [`tools`] — MCP tool handlers

pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod mcp;
pub mod remote;
pub mod tools;
