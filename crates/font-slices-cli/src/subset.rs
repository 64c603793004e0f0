//! External subsetter resolution and invocation.

use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Context;
use font_slices::{SubsetError, SubsetJob, Subsetter};

/// Resolved subsetting tool, in resolution priority order.
#[derive(Debug, Clone)]
pub(crate) enum SubsetTool {
    /// `fonttools subset` CLI.
    FontTools(PathBuf),
    /// Standalone `pyftsubset` CLI.
    Pyftsubset(PathBuf),
    /// `python -m fontTools.subset` module invocation.
    PythonModule(PathBuf),
}

impl SubsetTool {
    /// Resolves the first usable subsetting tool on `PATH`.
    pub(crate) fn resolve() -> anyhow::Result<Self> {
        let path_var = env::var_os("PATH").unwrap_or_default();
        Self::resolve_in(&path_var).context(
            "no usable font subsetter found on PATH; \
             install fonttools (e.g. `pip install 'fonttools[woff]'`)",
        )
    }

    fn resolve_in(path_var: &OsStr) -> Option<Self> {
        if let Some(path) = find_in_path("fonttools", path_var) {
            return Some(Self::FontTools(path));
        }
        if let Some(path) = find_in_path("pyftsubset", path_var) {
            return Some(Self::Pyftsubset(path));
        }
        for python in ["python3", "python"] {
            if let Some(path) = find_in_path(python, path_var) {
                return Some(Self::PythonModule(path));
            }
        }
        None
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::FontTools(path) => format!("fonttools subset ({})", path.display()),
            Self::Pyftsubset(path) => format!("pyftsubset ({})", path.display()),
            Self::PythonModule(path) => format!("{} -m fontTools.subset", path.display()),
        }
    }

    fn command(&self, source_font: &Path) -> Command {
        match self {
            Self::FontTools(path) => {
                let mut command = Command::new(path);
                command.arg("subset").arg(source_font);
                command
            }
            Self::Pyftsubset(path) => {
                let mut command = Command::new(path);
                command.arg(source_font);
                command
            }
            Self::PythonModule(python) => {
                let mut command = Command::new(python);
                command.args(["-m", "fontTools.subset"]).arg(source_font);
                command
            }
        }
    }
}

fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var).find_map(|dir| {
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        let candidate = dir.join(name);
        candidate.is_file().then_some(candidate)
    })
}

/// Options forwarded to the external subsetter.
#[derive(Debug, Clone)]
pub(crate) struct SubsetFlags {
    /// Output container format; `woff2` produces the compressed web
    /// container.
    pub(crate) flavor: String,
    /// Retain all OpenType layout features in the subset.
    pub(crate) keep_layout_features: bool,
    /// Internal tables to drop from the output, e.g. the `DSIG` signature.
    pub(crate) drop_tables: Vec<String>,
    /// Whether to keep glyph hinting instructions.
    pub(crate) hinting: bool,
    /// Tolerate requested codepoints absent from the source font instead of
    /// failing the subset.
    pub(crate) ignore_missing_unicodes: bool,
}

impl Default for SubsetFlags {
    fn default() -> Self {
        Self {
            flavor: "woff2".to_owned(),
            keep_layout_features: true,
            drop_tables: vec!["DSIG".to_owned()],
            hinting: false,
            ignore_missing_unicodes: true,
        }
    }
}

/// [`Subsetter`] implementation shelling out to a resolved [`SubsetTool`].
#[derive(Debug)]
pub(crate) struct ExternalSubsetter {
    tool: SubsetTool,
    source_font: PathBuf,
    out_dir: PathBuf,
    flags: SubsetFlags,
}

impl ExternalSubsetter {
    pub(crate) fn new(tool: SubsetTool, source_font: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            tool,
            source_font,
            out_dir,
            flags: SubsetFlags::default(),
        }
    }

    fn build_command(&self, job: &SubsetJob<'_>) -> Command {
        let output_path = self.out_dir.join(job.file_name);
        let mut command = self.tool.command(&self.source_font);
        command.arg(format!("--output-file={}", output_path.display()));
        command.arg(format!("--flavor={}", self.flags.flavor));
        if self.flags.keep_layout_features {
            command.arg("--layout-features=*");
        }
        for table in &self.flags.drop_tables {
            command.arg(format!("--drop-tables+={table}"));
        }
        if !self.flags.hinting {
            command.arg("--no-hinting");
        }
        if self.flags.ignore_missing_unicodes {
            command.arg("--ignore-missing-unicodes");
        }
        command.arg(format!("--unicodes={}", unicodes_arg(job.unicode_range)));
        command
    }
}

impl Subsetter for ExternalSubsetter {
    fn subset(&self, job: &SubsetJob<'_>) -> Result<(), SubsetError> {
        let mut command = self.build_command(job);
        tracing::debug!("slice {:03}: running {command:?}", job.ordinal);

        let output = command
            .output()
            .map_err(|err| format!("failed to spawn subsetter: {err}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "subsetter exited with {}: {}",
                output.status,
                stderr.trim()
            )
            .into());
        }
        Ok(())
    }
}

/// `fonttools --unicodes=` takes bare hex ranges: the CSS form stripped of
/// `U+` prefixes and spaces.
fn unicodes_arg(unicode_range: &str) -> String {
    unicode_range.replace("U+", "").replace(' ', "")
}
