//! `hwlink decode`: rebuild an error that crossed a process boundary.

use std::io::Read;

use serde_json::Value;

use hwlink_core::error::classify_value;
use hwlink_core::{HardwareWalletError, RpcErrorEnvelope};

use super::ErrorReport;
use crate::cli::{DecodeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = if args.payload == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.payload
    };

    let value: Value = serde_json::from_str(text.trim())?;
    let error = decode(&value, args.wallet);

    let report = ErrorReport::from(error);
    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &report, |r| r.detail(color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// A JSON-RPC error object (numeric `code`) is unwrapped through its
/// `data`; anything else is classified as it stands.
fn decode(value: &Value, wallet: Option<hwlink_core::HardwareWalletType>) -> HardwareWalletError {
    if value.get("code").is_some_and(Value::is_i64) {
        if let Ok(envelope) = serde_json::from_value::<RpcErrorEnvelope>(value.clone()) {
            let error = HardwareWalletError::from_rpc_error(&envelope);
            return match wallet {
                Some(_) => error.with_wallet_type(wallet),
                None => error,
            };
        }
    }
    classify_value(value, wallet)
}
