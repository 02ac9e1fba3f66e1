// authctx-test-utils: conformance tooling for auth adapters.
//
// - `Database` seeds and inspects storage canonically, bypassing the adapter
// - `test_adapter` runs every canonical adapter check against an adapter
// - Generators for users, sessions, and keys with unique ids

pub mod database;
pub mod generators;
pub mod test_adapter;

pub use database::{Database, EntityTable};
pub use generators::{generate_key, generate_session, generate_user};
pub use test_adapter::{test_adapter, TestFailure, TestReport};
