//! `hwlink classify`: run a raw failure through the error taxonomy.

use hwlink_core::RawError;
use hwlink_core::error::classify;

use super::ErrorReport;
use crate::cli::{ClassifyArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ClassifyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut raw = RawError::new(args.message);
    if let Some(name) = args.name {
        raw = raw.with_name(name);
    }
    if let Some(status) = args.status {
        raw = raw.with_status(status);
    }

    let error = classify(&raw, args.wallet);
    tracing::debug!(code = %error.code, "classified");

    let report = ErrorReport::from(error);
    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &report, |r| r.detail(color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
