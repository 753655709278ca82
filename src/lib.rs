//! # MinIO Resource Controller
//!
//! A Kubernetes controller that keeps a MinIO deployment in line with custom
//! resources: buckets, users, canned policies, policy attachments and bucket
//! lifecycle rules, plus the Alias/Endpoint resources describing how to reach the
//! server.
//!
//! ## Layout
//!
//! - [`crd`] - custom resource types and their status blocks
//! - [`controller::connection`] - turns a resource's connection into credentials
//! - [`controller::reconciler`] - the reconcile engine and the per-kind behavior
//! - [`provider`] - remote operations, against MinIO or an in-memory backend
//! - [`runtime`] - startup and the watch loop used by the binary

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;
