//! # NestChat Core
//!
//! Domain types, traits, and error definitions for the NestChat
//! parenting-advice backend. This crate has **zero framework
//! dependencies**; it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! The LLM backend is a trait here (`ChatClient`); the HTTP
//! implementation lives in `nestchat-provider`. This keeps the
//! orchestration pipeline testable with scripted fakes and keeps the
//! dependency graph pointing inward.

pub mod client;
pub mod error;
pub mod message;
pub mod profile;

// Re-export key types at crate root for ergonomics
pub use client::{ChatClient, ChatReply, ChatRequest};
pub use error::{AdvisorError, ClientError, Error, Result, StoreError};
pub use message::{ChatTurn, ResponseMode, Role, SessionHistory, SessionId};
pub use profile::ChildProfile;
