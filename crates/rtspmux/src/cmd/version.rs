use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

const UNKNOWN: &str = "unknown";

/// Build provenance printed by `version --extended`.
#[derive(Serialize, Debug)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    build_target: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    async_codec: bool,
}

impl BuildInfo {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build_target: option_env!("RTSPMUX_BUILD_TARGET").unwrap_or(UNKNOWN),
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            rustc: option_env!("RTSPMUX_RUSTC_VERSION").unwrap_or(UNKNOWN),
            git_hash: option_env!("RTSPMUX_GIT_HASH").unwrap_or(UNKNOWN),
            async_codec: cfg!(feature = "async"),
        }
    }

    fn lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.to_string()),
            ("version", self.version.to_string()),
            ("build_target", self.build_target.to_string()),
            ("target_os", self.target_os.to_string()),
            ("target_arch", self.target_arch.to_string()),
            ("rustc", self.rustc.to_string()),
            ("git_hash", self.git_hash.to_string()),
            ("features", format!("async={}, cli=true", self.async_codec)),
        ]
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("rtspmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = BuildInfo::current();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            for (key, value) in info.lines() {
                println!("{key}: {value}");
            }
        }
    }

    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_info_fields_are_set_by_build_script() {
        let info = BuildInfo::current();

        assert_eq!(info.name, "rtspmux");
        assert_ne!(info.build_target, UNKNOWN);
        assert!(info.rustc.starts_with("rustc "), "rustc: {}", info.rustc);
    }

    #[test]
    fn text_lines_cover_every_json_field() {
        let info = BuildInfo::current();
        let json = serde_json::to_value(&info).unwrap();

        for (key, _) in info.lines() {
            if key != "features" {
                assert!(json.get(key).is_some(), "missing {key}");
            }
        }
        assert_eq!(json["async_codec"], cfg!(feature = "async"));
    }
}
