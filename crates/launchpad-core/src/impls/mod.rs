//! Port implementations: real adapters (Docker CLI, JSONL log, GitHub) and
//! in-memory implementations for development and tests.

pub mod docker;
pub mod fake_runtime;
pub mod github_catalog;
pub mod inmem_history;
pub mod jsonl_history;

pub use self::docker::{DockerConfig, DockerRuntime};
pub use self::fake_runtime::FakeRuntime;
pub use self::github_catalog::GithubCatalog;
pub use self::inmem_history::InMemoryHistoryStore;
pub use self::jsonl_history::JsonlHistoryStore;
