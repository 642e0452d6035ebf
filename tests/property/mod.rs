// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of scanning, checking and rewriting that must hold for every
//! generated query and permission set.

mod admission;
mod scanning;
