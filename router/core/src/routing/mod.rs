//! Model Routing
//!
//! Everything that decides which backend model serves a request.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   fetch   ┌─────────────┐  Arc<SelectionPolicy>  ┌──────────────┐
//! │ PolicySource │ ────────► │ ConfigCache │ ─────────────────────► │ select_model │
//! └──────────────┘           └─────────────┘                        └──────────────┘
//!                                   ▲
//!                                   │ strategy.json
//!                           ┌───────────────┐
//!                           │ build_policy  │ (offline, from evaluation results)
//!                           └───────────────┘
//! ```

pub mod cache;
pub mod policy;
pub mod selector;
pub mod strategy;

pub use cache::{CacheEntry, ConfigCache};
pub use policy::{ModelScore, SelectionPolicy, DEFAULT_USE_CASE};
pub use selector::select_model;
pub use strategy::{build_policy, EvaluationRecord, StrategyError};
