use anyhow::Result;
use clap::Parser;

mod env;
mod report;
mod runtime;

use env::LauncherEnv;
use report::LaunchReport;

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(about = "Resolve the gantry launcher environment.", long_about = None)]
#[command(version)]
struct Cli {
    /// Use PATH as the build directory instead of searching upward for a
    /// `.gantry` directory.
    #[arg(long, value_name = "PATH")]
    build_dir: Option<String>,

    /// Emit the resolution report as JSON.
    #[arg(long)]
    json: bool,

    /// Arguments that would be forwarded to the managed runtime.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> std::process::ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();

    let mut scratch = Vec::new();
    let launcher_env = LauncherEnv::resolve(cli.build_dir.as_deref(), &mut scratch)?;
    let runtime_home = runtime::resolve_runtime_home(&launcher_env, &mut scratch)?;

    let report = LaunchReport::new(&launcher_env, runtime_home, cli.args);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_human();
    }

    Ok(std::process::ExitCode::SUCCESS)
}
