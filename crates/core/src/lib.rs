//! Core domain layer for the Courier subscription registry.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! services that decide which applications get notified when a monitored
//! blockchain group produces a new block, and where that notification goes.
//! It has no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     courier (admin CLI)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      courier-storage                        │
//! │               (PostgreSQL, in-memory)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     courier-core  ← YOU ARE HERE            │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Subscription, Binding and the registration request
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Registry and block notifier
//! - [`error`] - Error taxonomy
//! - [`metrics`] - Counter definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::SubscriptionRepository`] - Persist and query subscriptions
//! - [`ports::BindingPublisher`] - Deliver a notification to a broker binding
//!
//! ## Uniqueness
//!
//! An application may register a given exchange + queue pair only once.
//! [`services::SubscriptionRegistry::create`] checks the triple up front and
//! relies on the store to reject the loser of a concurrent race.
//!
//! ## Dispatch
//!
//! On a new block the notifier lists the group's subscriptions and
//! publishes one notification per binding.

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
