pub mod reports;
pub mod util;

pub use reports::print_cycle_summary;
pub use util::{artifacts_dir, capture_artifacts};
