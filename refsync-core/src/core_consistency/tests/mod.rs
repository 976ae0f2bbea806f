//! Consistency core test suite
