// Ядро: имена снапшотов, фильтр, каталог, retention
pub mod naming;
pub mod filter;
pub mod policy;
pub mod catalog;
pub mod retention;

// Окружение: ошибки, настройки, backing store
pub mod error;
pub mod config;
pub mod store;

// Один цикл ротации + CLI
pub mod rotate;
pub mod cli;

// Удобные реэкспорты
pub use catalog::{build_catalog, SnapshotCatalog};
pub use config::RotateConfig;
pub use error::{AutosnapError, ConfigError, MalformedName, StoreError};
pub use filter::{FilterRule, FilterSet};
pub use naming::{decode, encode, SnapshotRecord};
pub use policy::{load_policy, parse_policy, Command, Policy, PolicyBuilder, CLEAN};
pub use retention::apply_retention;
pub use rotate::{execute, RotateOptions, RunReport};
pub use store::{BackingStore, MemoryStore, RawSnapshot, ZfsCli};
