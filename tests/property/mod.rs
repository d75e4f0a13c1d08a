// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Planner idempotence and overlap rejection, and route-entry uniqueness
//! across zone counts.

mod planner;
mod topology;
