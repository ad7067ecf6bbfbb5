//! Beluga - compile chat scripts into timed chat videos
//!
//! A script is a plain-text list of chat events:
//!
//! ```text
//! WELCOME Alex$^2
//!
//! Bob:
//! Hi __there__ @Alex!$^3#!pop
//! ```
//!
//! This library provides:
//! - A parser from script text to [`models::Script`]
//! - A validator that checks names against character and sound registries
//! - A timeline compiler assigning every event an absolute time window
//! - A compositor that renders events in parallel and hands the frames and
//!   sound cues to a muxer

pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod fmt;
pub mod gif;
pub mod models;
pub mod mux;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod renderer;
pub mod timeline;
pub mod tokenizer;
pub mod validate;
