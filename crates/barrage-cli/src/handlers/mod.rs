//! Command handlers - one module per subcommand

pub mod list;
pub mod plan;
pub mod run;

pub use list::{execute_list, render_list};
pub use plan::{execute_plan, render_plan};
pub use run::{execute_run, parse_test_types, resolve_configs};
