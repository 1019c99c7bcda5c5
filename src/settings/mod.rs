//! Configuration: schema, loading, and persistence.

pub mod loader;
pub mod schema;

pub use loader::{default_data_dir, settings_path, SettingsManager};
pub use schema::{
    ProviderSettings, SkillfabSettings, StoreSettings, TaxonomySettings, WorkflowSettings,
};
