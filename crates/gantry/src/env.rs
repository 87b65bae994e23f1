use std::ffi::CStr;

use anyhow::{bail, Context, Result};
use gantry_conf::{
    absolute, is_canonical, is_directory, is_regular, mkdirs, strip_last_component, PropSet,
};

/// One configuration file that actually existed, with its parsed entries.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: String,
    pub props: PropSet,
}

/// Everything the launcher knows about where it is running: installation
/// layout, per-user directories (created on demand) and the layered
/// configuration sources found on disk.
#[derive(Debug, Clone)]
pub struct LauncherEnv {
    pub install_dir: String,
    pub work_dir: String,
    pub build_dir: Option<String>,
    pub user_name: String,
    pub user_home_dir: String,
    pub user_data_dir: String,
    pub user_config_dir: String,
    pub user_runtime_dir: String,
    /// Ordered lowest to highest priority: install, user, build.
    pub sources: Vec<ConfigSource>,
}

impl LauncherEnv {
    pub fn resolve(build_dir_override: Option<&str>, scratch: &mut Vec<u8>) -> Result<LauncherEnv> {
        let work_dir = std::env::current_dir()
            .context("error getting current working dir")?
            .to_string_lossy()
            .into_owned();

        let exe = std::env::current_exe()
            .context("error resolving the running executable")?
            .to_string_lossy()
            .into_owned();
        let install_dir = install_root(&exe, &work_dir)?;

        let build_dir = match build_dir_override {
            Some(dir) => Some(
                absolute(dir, &work_dir, scratch)
                    .with_context(|| format!("resolve build dir {dir:?}"))?,
            ),
            None => find_build_dir(&work_dir),
        };

        let (user_name, user_home_dir) = user_identity(std::env::var("HOME").ok().as_deref())?;

        let user_data_dir = xdg_dir(
            std::env::var("XDG_DATA_HOME").ok().as_deref(),
            &user_home_dir,
            "/.local/share/gantry",
        );
        mkdirs(&user_data_dir)?;

        let user_config_dir = xdg_dir(
            std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
            &user_home_dir,
            "/.config/gantry",
        );
        mkdirs(&user_config_dir)?;

        let user_runtime_dir = runtime_dir(
            std::env::var("XDG_RUNTIME_DIR").ok().as_deref(),
            std::env::var("TMPDIR").ok().as_deref(),
            &user_name,
        );
        mkdirs(&user_runtime_dir)?;

        let mut candidates = vec![
            format!("{install_dir}/conf/runtime.properties"),
            format!("{user_config_dir}/runtime.properties"),
        ];
        if let Some(bd) = &build_dir {
            candidates.push(format!("{bd}/runtime.properties"));
        }

        let mut sources = Vec::new();
        for path in candidates {
            if !is_regular(&path) {
                continue;
            }
            let mut props = PropSet::new();
            props.load_file(&path, scratch).with_context(|| format!("load {path}"))?;
            sources.push(ConfigSource { path, props });
        }

        Ok(LauncherEnv {
            install_dir,
            work_dir,
            build_dir,
            user_name,
            user_home_dir,
            user_data_dir,
            user_config_dir,
            user_runtime_dir,
            sources,
        })
    }

    /// The layered view: all sources folded lowest to highest priority.
    pub fn merged_config(&self) -> PropSet {
        let mut merged = PropSet::new();
        for source in &self.sources {
            merged.merge_from(source.props.clone());
        }
        merged
    }
}

/// The executable must live in a `bin` directory; the installation root is
/// that directory's parent. A `bin` directly under the filesystem root has
/// no usable parent, in which case the working directory stands in.
fn install_root(exe: &str, work_dir: &str) -> Result<String> {
    let mut parent = exe.to_owned();
    strip_last_component(&mut parent);
    if parent.rsplit('/').next() != Some("bin") {
        bail!("{exe}: invalid gantry directory layout");
    }

    let mut root = parent;
    strip_last_component(&mut root);
    if root == "/" || root.is_empty() {
        Ok(work_dir.to_owned())
    } else {
        Ok(root)
    }
}

/// Walks upward from `work_dir` looking for a `.gantry` directory; the
/// directory itself is the build dir. Absence is not an error.
fn find_build_dir(work_dir: &str) -> Option<String> {
    let mut dir = work_dir.to_owned();
    loop {
        let candidate = if dir == "/" {
            "/.gantry".to_owned()
        } else {
            format!("{dir}/.gantry")
        };
        if is_directory(&candidate) {
            return Some(candidate);
        }
        if dir == "/" || dir.is_empty() {
            return None;
        }
        strip_last_component(&mut dir);
    }
}

/// User name from the effective user's passwd entry; home from `$HOME` when
/// it is canonical, the passwd entry otherwise.
fn user_identity(home_env: Option<&str>) -> Result<(String, String)> {
    let uid = unsafe { libc::geteuid() };
    let pw = unsafe { libc::getpwuid(uid) };
    if pw.is_null() {
        bail!("invalid user data for uid {uid}");
    }
    let name = unsafe { CStr::from_ptr((*pw).pw_name) }
        .to_string_lossy()
        .into_owned();
    let pw_home = unsafe { CStr::from_ptr((*pw).pw_dir) }
        .to_string_lossy()
        .into_owned();

    if let Some(home) = home_env {
        if is_canonical(home) {
            return Ok((name, home.to_owned()));
        }
    }
    Ok((name, pw_home))
}

fn xdg_dir(env_val: Option<&str>, home: &str, fallback: &str) -> String {
    if let Some(v) = env_val {
        if is_canonical(v) {
            return format!("{v}/gantry");
        }
    }
    format!("{home}{fallback}")
}

fn runtime_dir(xdg_runtime: Option<&str>, tmp_dir: Option<&str>, user_name: &str) -> String {
    if let Some(v) = xdg_runtime {
        if is_canonical(v) {
            return format!("{v}/gantry");
        }
    }
    let base = match tmp_dir {
        Some(v) if is_canonical(v) => v,
        _ => "/tmp",
    };
    format!("{base}/gantry-{user_name}")
}
