//! Lifecycle management for throwaway secrets-service instances in tests.
//!
//! A [`ServerManager`] launches the service binary against one or more
//! configuration files, waits for its listener, then drives it through
//! initialisation and unsealing with a [`VaultClient`]. The root credential
//! captured on the way is installed on the client, which test bodies use
//! directly. Teardown happens in [`ServerManager::stop`] or on drop.
//!
//! Two doubles support auth-method tests: [`MockLdapServer`] gives the service
//! a reachable directory endpoint, and [`StubRegistry`] answers selected
//! requests with canned responses before they reach the network. The
//! [`doctest`] module combines all of these into the global setup used by the
//! documentation examples.
//!
//! All operations are blocking. Configuration is explicit: every constructor
//! takes a [`vault_harness_config::Config`] or values derived from it.

pub mod client;
pub mod doctest;
pub mod ldap;
pub mod server;
pub mod stubs;
pub mod telemetry;

pub use client::{ClientError, Method, Response, VaultClient};
pub use doctest::{DoctestEnvironment, DoctestError, DoctestFixture, DoctestSession};
pub use ldap::{LdapError, MockLdapServer};
pub use server::{SealState, ServerError, ServerManager, UnsealKeys};
pub use stubs::{StubError, StubMode, StubRegistry, StubResponse};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
