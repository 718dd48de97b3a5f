// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that converge collector children toward their desired state.

pub mod collector;
pub mod objects;
pub mod prune;

pub use collector::CollectorReconciler;
pub use objects::{apply, converge, ManagedObject, ObjectOutcome};
pub use prune::prune;
