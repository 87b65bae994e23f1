use std::collections::BTreeMap;

use serde::Serialize;

use crate::env::LauncherEnv;

pub const LAUNCH_REPORT_SCHEMA_VERSION: &str = "gantry.launch-report@0.1.0";

/// The resolved launcher environment, ready to hand to an embedder. The
/// launcher stops here; nothing is spawned or loaded.
#[derive(Debug, Serialize)]
pub struct LaunchReport {
    pub schema_version: String,
    pub install_dir: String,
    pub work_dir: String,
    pub build_dir: Option<String>,
    pub user_name: String,
    pub user_home_dir: String,
    pub user_data_dir: String,
    pub user_config_dir: String,
    pub user_runtime_dir: String,
    /// Per-source entries, lowest to highest priority.
    pub sources: Vec<SourceReport>,
    /// The merged view of all sources.
    pub config: BTreeMap<String, String>,
    pub runtime_home: Option<String>,
    pub program_args: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub path: String,
    pub entries: BTreeMap<String, String>,
}

impl LaunchReport {
    pub fn new(
        env: &LauncherEnv,
        runtime_home: Option<String>,
        program_args: Vec<String>,
    ) -> LaunchReport {
        let sources = env
            .sources
            .iter()
            .map(|s| SourceReport {
                path: s.path.clone(),
                entries: collect(&s.props),
            })
            .collect();

        LaunchReport {
            schema_version: LAUNCH_REPORT_SCHEMA_VERSION.to_owned(),
            install_dir: env.install_dir.clone(),
            work_dir: env.work_dir.clone(),
            build_dir: env.build_dir.clone(),
            user_name: env.user_name.clone(),
            user_home_dir: env.user_home_dir.clone(),
            user_data_dir: env.user_data_dir.clone(),
            user_config_dir: env.user_config_dir.clone(),
            user_runtime_dir: env.user_runtime_dir.clone(),
            sources,
            config: collect(&env.merged_config()),
            runtime_home,
            program_args,
        }
    }

    pub fn print_human(&self) {
        println!("install dir:  {}", self.install_dir);
        println!("work dir:     {}", self.work_dir);
        println!("build dir:    {}", self.build_dir.as_deref().unwrap_or("(none)"));
        println!("user:         {}", self.user_name);
        println!("home dir:     {}", self.user_home_dir);
        println!("data dir:     {}", self.user_data_dir);
        println!("config dir:   {}", self.user_config_dir);
        println!("runtime dir:  {}", self.user_runtime_dir);

        println!("config sources:");
        if self.sources.is_empty() {
            println!("  (none)");
        }
        for source in &self.sources {
            println!("  {} ({} entries)", source.path, source.entries.len());
        }

        if !self.config.is_empty() {
            println!("config:");
            for (key, value) in &self.config {
                println!("  {key} = {value}");
            }
        }

        println!("runtime home: {}", self.runtime_home.as_deref().unwrap_or("(unset)"));
        if !self.program_args.is_empty() {
            println!("program args: {}", self.program_args.join(" "));
        }
    }
}

fn collect(props: &gantry_conf::PropSet) -> BTreeMap<String, String> {
    props.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
}
