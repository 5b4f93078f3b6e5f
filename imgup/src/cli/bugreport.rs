use bugreport::{
    bugreport,
    collector::{
        Collector, CompileTimeInformation, EnvironmentVariables, OperatingSystem, CollectionError,
        SoftwareVersion,
    },
    format::Markdown,
    report::ReportEntry,
    CrateInfo,
};
use server::config::Config;

pub fn run() {
    bugreport!()
        .info(SoftwareVersion::default())
        .info(OperatingSystem::default())
        .info(EnvironmentVariables::list(&[
            "SHELL",
            "TERM",
            "RUST_LOG",
            "IMGUP_HOST",
            "IMGUP_PORT",
            "IMGUP_PUBLIC_DIR",
            "IMGUP_MAX_FILE_SIZE",
        ]))
        .info(EffectiveConfig(Config::from_env()))
        .info(CompileTimeInformation::default())
        .print::<Markdown>();
}

/// Settings the server would start with, after environment overrides.
struct EffectiveConfig(Config);

impl Collector for EffectiveConfig {
    fn description(&self) -> &str {
        "Effective server configuration"
    }

    fn collect(&mut self, _: &CrateInfo) -> Result<ReportEntry, CollectionError> {
        Ok(ReportEntry::List(
            config_lines(&self.0)
                .into_iter()
                .map(ReportEntry::Text)
                .collect(),
        ))
    }
}

fn config_lines(config: &Config) -> Vec<String> {
    vec![
        format!("address: {}:{}", config.host, config.port),
        format!("public dir: {}", config.public_dir.display()),
        format!("uploads dir: {}", config.gate.uploads_dir.display()),
        format!("max file size: {} bytes", config.gate.max_file_size),
        format!("allowed types: {}", config.gate.allowed_types.join(", ")),
    ]
}
