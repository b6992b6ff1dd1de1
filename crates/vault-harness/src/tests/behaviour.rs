//! Step definitions for `tests/features/server_lifecycle.feature`.

use std::cell::RefCell;
use std::sync::Arc;

use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

use super::support::*;
use crate::client::Method;
use crate::server::{SealState, ServerError};
use crate::stubs::{StubRegistry, StubResponse};

fn ldap_login_url(world: &TestWorld, user: &str) -> String {
    let harness = world.harness().expect("harness");
    format!("{}/v1/auth/ldap/login/{user}", harness.vault.address())
}

#[given("a running fake service")]
fn given_fake_service(world: &RefCell<TestWorld>) {
    world.borrow_mut().harness = Some(Harness::new().expect("start fake service"));
}

#[given("a started manager with {shares} shares and threshold {threshold}")]
fn given_started_manager(world: &RefCell<TestWorld>, shares: u8, threshold: u8) {
    let mut world = world.borrow_mut();
    let harness = world.harness.as_mut().expect("fake service running");
    harness.config.secret_shares = shares;
    harness.config.secret_threshold = threshold;
    let manager = harness.started_manager().expect("start manager");
    world.manager = Some(manager);
}

#[given("a stubbed manager with {shares} shares and threshold {threshold}")]
fn given_stubbed_manager(world: &RefCell<TestWorld>, shares: u8, threshold: u8) {
    let mut world = world.borrow_mut();
    let harness = world.harness.as_mut().expect("fake service running");
    harness.config.secret_shares = shares;
    harness.config.secret_threshold = threshold;
    let stubs = Arc::new(StubRegistry::passthrough());
    let client = harness
        .client()
        .expect("client")
        .with_stubs(Arc::clone(&stubs));
    let mut manager = harness.manager_with_client(client).expect("manager");
    manager.start().expect("start manager");
    world.manager = Some(manager);
    world.stubs = Some(stubs);
}

#[given("the manager has initialized the server")]
fn given_initialized(world: &RefCell<TestWorld>) {
    world
        .borrow_mut()
        .manager_mut()
        .expect("manager")
        .initialize()
        .expect("initialize");
}

#[given("the manager has unsealed the server")]
fn given_unsealed(world: &RefCell<TestWorld>) {
    world
        .borrow_mut()
        .manager_mut()
        .expect("manager")
        .unseal()
        .expect("unseal");
}

#[given("the client is authenticated with the root token")]
fn given_authenticated(world: &RefCell<TestWorld>) {
    world
        .borrow_mut()
        .manager_mut()
        .expect("manager")
        .authenticate_root()
        .expect("authenticate");
}

#[given("a stubbed LDAP login for {user}")]
fn given_ldap_stub(world: &RefCell<TestWorld>, user: String) {
    let user = user.trim_matches('"');
    let world = world.borrow();
    let url = ldap_login_url(&world, user);
    let stubs = world.stubs.as_ref().expect("stub registry");
    stubs
        .register(
            Method::Post,
            &url,
            StubResponse::json(json!({
                "auth": {"client_token": ROOT_TOKEN, "policies": ["default"]}
            })),
        )
        .expect("register stub");
}

#[when("the manager initializes the server")]
fn when_initialize(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let result = world.manager_mut().expect("manager").initialize();
    world.error = result.err();
}

#[when("the manager unseals the server")]
fn when_unseal(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let result = world.manager_mut().expect("manager").unseal();
    world.error = result.err();
}

#[when("the first unseal key is submitted twice")]
fn when_duplicate_share(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let manager = world.manager().expect("manager");
    let key = manager
        .unseal_keys()
        .and_then(|keys| keys.keys().first().cloned())
        .expect("first key");
    manager
        .client()
        .submit_unseal_key(&key)
        .expect("first submission");
    let rejection = manager
        .client()
        .submit_unseal_key(&key)
        .expect_err("repeated submission");
    world.rejection = Some(rejection);
}

#[when("the manager is stopped twice")]
fn when_stopped_twice(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let manager = world.manager_mut().expect("manager");
    manager.stop();
    manager.stop();
}

#[when("the client logs in through LDAP as {user}")]
fn when_ldap_login(world: &RefCell<TestWorld>, user: String) {
    let user = user.trim_matches('"');
    let mut world = world.borrow_mut();
    let login = world
        .manager()
        .expect("manager")
        .client()
        .ldap_login(user, "hvacrox")
        .expect("login");
    world.login = Some(login);
}

#[then("{count} unseal keys and a root token are captured")]
fn then_keys_captured(world: &RefCell<TestWorld>, count: usize) {
    let world = world.borrow();
    let manager = world.manager().expect("manager");
    assert!(world.error.is_none(), "unexpected error: {:?}", world.error);
    assert_eq!(manager.unseal_keys().map(|keys| keys.len()), Some(count));
    assert_eq!(manager.root_token(), Some(ROOT_TOKEN));
    assert_eq!(manager.state(), SealState::InitializedSealed);
}

#[then("the service reports initialized")]
fn then_service_initialized(world: &RefCell<TestWorld>) {
    assert!(world.borrow().harness().expect("harness").vault.is_initialized());
}

#[then("the operation fails because the server is already initialized")]
fn then_already_initialized(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.error, Some(ServerError::AlreadyInitialized)),
        "unexpected outcome: {:?}",
        world.error
    );
}

#[then("the service received {count} init request")]
fn then_init_requests(world: &RefCell<TestWorld>, count: usize) {
    let world = world.borrow();
    let vault = &world.harness().expect("harness").vault;
    assert_eq!(vault.count("PUT", "/v1/sys/init"), count);
}

#[then("the service received {count} unseal requests")]
fn then_unseal_requests(world: &RefCell<TestWorld>, count: usize) {
    let world = world.borrow();
    assert!(world.error.is_none(), "unexpected error: {:?}", world.error);
    let vault = &world.harness().expect("harness").vault;
    assert_eq!(vault.count("PUT", "/v1/sys/unseal"), count);
}

#[then("the service reports unsealed")]
fn then_service_unsealed(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(!world.harness().expect("harness").vault.is_sealed());
    assert_eq!(world.manager().expect("manager").state(), SealState::Unsealed);
}

#[then("the service reports sealed")]
fn then_service_sealed(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let vault = &world.harness().expect("harness").vault;
    assert!(vault.is_sealed());
    assert_eq!(vault.unseal_progress(), 1);
}

#[then("the repeated share is rejected with status {status}")]
fn then_share_rejected(world: &RefCell<TestWorld>, status: u16) {
    let world = world.borrow();
    let rejection = world.rejection.as_ref().expect("rejection recorded");
    assert_eq!(rejection.status(), Some(status));
}

#[then("the server process is no longer running")]
fn then_not_running(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let manager = world.manager().expect("manager");
    assert!(!manager.is_running());
    assert_eq!(manager.state(), SealState::Stopped);
}

#[then("initializing fails because the manager is stopped")]
fn then_initialize_fails_stopped(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let error = world
        .manager_mut()
        .expect("manager")
        .initialize()
        .expect_err("stopped");
    assert!(matches!(error, ServerError::Stopped));
}

#[then("the login returns the root token")]
fn then_login_token(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let login = world.login.as_ref().expect("login recorded");
    assert_eq!(login.client_token, ROOT_TOKEN);
}

#[then("the LDAP login stub was served once")]
fn then_stub_served(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let url = ldap_login_url(&world, "somedude");
    let stubs = world.stubs.as_ref().expect("stub registry");
    assert_eq!(stubs.hits(Method::Post, &url), 1);
    let vault = &world.harness().expect("harness").vault;
    assert_eq!(vault.count("POST", "/v1/auth/ldap/login/somedude"), 0);
}

#[scenario(path = "tests/features/server_lifecycle.feature")]
fn server_lifecycle_behaviour(world: RefCell<TestWorld>) {
    let _ = world;
}
