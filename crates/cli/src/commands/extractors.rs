use anyhow::Result;
use serde::Serialize;

use acfg_core::extract::available_extractors;

#[derive(Debug, Serialize)]
pub struct ExtractorInfo {
    pub name: String,
    pub description: String,
}

pub fn extractor_infos() -> Vec<ExtractorInfo> {
    available_extractors()
        .into_iter()
        .map(|name| {
            let description = match name.as_str() {
                "listing" => "IDA-style text listings (<id>.asm)".to_string(),
                "capstone" => "Hex-dump byte listings (<id>.bytes), 32-bit x86 via Capstone"
                    .to_string(),
                other => format!("Extractor '{}'", other),
            };
            ExtractorInfo { name, description }
        })
        .collect()
}

/// List graph extractors compiled into this binary.
pub fn list_extractors_command(json: bool) -> Result<()> {
    let entries = extractor_infos();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Extractors:");
    for entry in entries {
        println!("- {}: {}", entry.name, entry.description);
    }
    Ok(())
}

/// Smoke-test command printing the tool and library versions.
pub fn version_command() {
    println!("acfg-builder v{}", env!("CARGO_PKG_VERSION"));
    println!("acfg-core v{}", acfg_core::version());
}
