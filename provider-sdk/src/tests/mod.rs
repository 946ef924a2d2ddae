//! Provider adapter tests against mock HTTP servers
//!
//! Each module starts a WireMock server standing in for one provider API and
//! checks the request the adapter sends and the payload it normalizes.

pub mod browser_mock_tests;
pub mod memory_mock_tests;
pub mod search_mock_tests;
