//! Reusable compliance suites for trait implementations
