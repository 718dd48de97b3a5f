// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources owned by the operator.

pub mod collector;
pub mod instrumentation;

pub use collector::{Mode, OpenTelemetryCollector, OpenTelemetryCollectorSpec, TargetAllocatorSpec};
pub use instrumentation::{Instrumentation, InstrumentationSpec, LanguageSpec};
