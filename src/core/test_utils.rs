//! Test utilities for block-based testing.
//!
//! This module provides canned blocks and helpers for comparing dumps whose
//! only nondeterminism is instruction addresses.
