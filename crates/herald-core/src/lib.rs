//! Event scheduling and delivery engine for Herald.
//!
//! This crate owns the delivery cycle: poll sources, validate and order
//! what they produce, show one blocking choice at a time, and batch
//! notifications into history.
//!
//! # Modules
//!
//! - [`adapter`] -- [`Adapter`] host contract and the in-memory
//!   [`RecordingAdapter`].
//! - [`config`] -- Configuration loading from `herald-config.yaml` into
//!   strongly-typed structs.
//! - [`debug`] -- [`DebugConsole`] operator surface.
//! - [`engine`] -- The [`Engine`] queue and delivery state machine.
//! - [`rng`] -- Seeded, replayable LCG shared with generative sources.
//! - [`scheduler`] -- [`Scheduler`] that ticks the engine on an interval.
//! - [`source`] -- [`EventSource`] trait, registry, and concurrent poll.
//! - [`timer`] -- One-shot timers measured in host milliseconds.
//! - [`validation`] -- Wire event schema checks.
//!
//! [`Adapter`]: adapter::Adapter
//! [`RecordingAdapter`]: adapter::RecordingAdapter
//! [`DebugConsole`]: debug::DebugConsole
//! [`Engine`]: engine::Engine
//! [`Scheduler`]: scheduler::Scheduler
//! [`EventSource`]: source::EventSource

pub mod adapter;
pub mod config;
pub mod debug;
pub mod engine;
pub mod rng;
pub mod scheduler;
pub mod source;
pub mod timer;
pub mod validation;
