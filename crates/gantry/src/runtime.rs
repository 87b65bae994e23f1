use anyhow::{Context, Result};
use gantry_conf::{absolute, strip_last_component};

use crate::env::LauncherEnv;

/// Configuration key naming the managed runtime's installation.
pub const RUNTIME_HOME_KEY: &str = "gantry.runtime.home";

/// Environment fallback consulted when no configuration source defines
/// [`RUNTIME_HOME_KEY`].
pub const RUNTIME_HOME_ENV: &str = "GANTRY_RUNTIME_HOME";

/// Picks the runtime home: the highest-priority source defining the key
/// wins, and its value is resolved relative to that file's own directory,
/// so a source can point at a runtime sitting next to it. The environment
/// variable resolves against the working directory instead. `None` when
/// neither is set; what that means is the embedder's business.
pub fn resolve_runtime_home(env: &LauncherEnv, scratch: &mut Vec<u8>) -> Result<Option<String>> {
    for source in env.sources.iter().rev() {
        if let Some(value) = source.props.get(RUNTIME_HOME_KEY) {
            let mut base = source.path.clone();
            strip_last_component(&mut base);
            let resolved = absolute(value, &base, scratch)
                .with_context(|| format!("resolve {RUNTIME_HOME_KEY} from {}", source.path))?;
            return Ok(Some(resolved));
        }
    }

    if let Ok(value) = std::env::var(RUNTIME_HOME_ENV) {
        let resolved = absolute(&value, &env.work_dir, scratch)
            .with_context(|| format!("resolve {RUNTIME_HOME_ENV}"))?;
        return Ok(Some(resolved));
    }

    Ok(None)
}
