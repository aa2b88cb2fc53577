pub mod sync_state;

pub use sync_state::SyncStateWrapper;
