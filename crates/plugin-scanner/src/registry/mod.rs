//! 플러그인 레지스트리 -- 페이지네이션, 레코드, 대기 집합

pub mod paginator;
pub mod plugin;
pub mod plugin_set;

pub use paginator::RegistryPaginator;
pub use plugin::{Icons, PluginRecord, Ratings, RegistryInfo, RegistryPage};
pub use plugin_set::{LastPick, PaginationState, PickPolicy, PluginSet, RandomPick};
