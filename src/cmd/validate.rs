//! `service-broadcast validate`: check a targets file without serving.
//!
//! Parses the file, resolves it against the given service / port name and
//! checks that every resulting address can be used as a broadcast target.
//! Results are reported as human-readable text or machine-readable JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::DiscoverySettings;
use crate::discovery::file_source::parse_targets_str;
use crate::error::BroadcastError;
use crate::proxy::duplicate::outbound_uri;

pub fn execute(args: &ValidateArgs) -> Result<(), BroadcastError> {
    let path = &args.targets_file;

    if !path.exists() {
        return Err(BroadcastError::TargetsFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let document = parse_targets_str(ext, &content, &path.display().to_string())?;

    let settings = DiscoverySettings {
        service: args.service.clone(),
        port_name: args.port_name.clone(),
        namespace: args.namespace.clone(),
    };
    let targets = document.resolve(&settings);

    let mut invalid = Vec::new();
    for target in &targets {
        if let Err(e) = outbound_uri(target, "/") {
            invalid.push(e);
        }
    }

    if !invalid.is_empty() {
        match args.format {
            ValidateFormat::Text => {
                eprintln!(
                    "\u{2717} {} has {} invalid targets\n",
                    path.display(),
                    invalid.len()
                );
                for error in &invalid {
                    eprintln!("  {error}");
                }
            }
            ValidateFormat::Json => {
                let errors: Vec<String> = invalid.iter().map(ToString::to_string).collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": errors,
                    })
                );
            }
        }
        return Err(invalid.swap_remove(0));
    }

    match args.format {
        ValidateFormat::Text => {
            println!("\u{2713} {} resolves to {} targets", path.display(), targets.len());
            for target in &targets {
                println!("  {target}");
            }
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "targets": targets,
                })
            );
        }
    }

    Ok(())
}
