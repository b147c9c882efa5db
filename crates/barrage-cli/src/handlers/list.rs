//! `barrage list`: show what a catalog offers.

use crate::catalog::Catalog;
use crate::commands::ListArgs;
use crate::error::CliResult;

/// One numbered line per request
#[must_use]
pub fn render_list(catalog: &Catalog) -> String {
    catalog
        .requests
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}) {} ({} {})\n",
                i + 1,
                r.name,
                r.method.to_uppercase(),
                r.endpoint
            )
        })
        .collect()
}

/// Execute the list command
pub fn execute_list(args: &ListArgs) -> CliResult<()> {
    let catalog = Catalog::load(&args.catalog)?;
    print!("{}", render_list(&catalog));
    Ok(())
}
