//! Session actor and registry test suite

mod registry_tests;
