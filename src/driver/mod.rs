//! Compilation Driver
//!
//! Runs the TeX toolchain on the staged project, one monitored subprocess
//! per pass:
//!
//! ```text
//! engine ─→ bib tool (per .aux/.bcf, if any) ─→ engine × extra_passes
//! ```
//!
//! Every pass is wrapped in its own [`monitor::observe`] scope and its
//! events are appended in pass order. A pass exiting non-zero is tolerated:
//! the compiler is only an oracle for which files get opened.

mod bib;

use crate::{
    config::{BibTool, CompilerConfig},
    core::{check_shutdown, is_shutdown},
    debug,
    error::PackError,
    log,
    logger::is_verbose,
    monitor::{self, AccessEvent, MonitorOptions},
    utils::{
        exec::{Cmd, ExecError, Exit},
        plural::plural_count_with,
    },
    workspace::Workspace,
};
use std::{
    error::Error,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

/// Outcome of one subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    Succeeded,
    /// Exited non-zero (`None` when killed by a signal).
    Failed(Option<i32>),
    /// The program could not be started.
    NotStarted(String),
}

#[derive(Debug, Clone)]
pub struct PassResult {
    /// 1-based position in the run.
    pub index: usize,
    pub tool: &'static str,
    /// Input handed to the tool, relative to its working directory.
    pub target: PathBuf,
    pub status: PassStatus,
    /// Captured output, unless it went to the terminal.
    pub log: Option<PathBuf>,
    pub events: usize,
}

/// Everything observed across all passes.
#[derive(Debug, Default)]
pub struct Compilation {
    pub passes: Vec<PassResult>,
    /// Concatenation of every pass's events, in pass order.
    pub events: Vec<AccessEvent>,
}

/// Resolved executables for one run.
#[derive(Debug, Clone)]
pub struct Toolchain {
    engine: PathBuf,
    engine_name: &'static str,
    bib: Option<(BibTool, PathBuf)>,
}

impl Toolchain {
    /// Locate the configured programs in `PATH`.
    ///
    /// A missing engine is fatal; a missing bibliography tool only disables
    /// the bibliography pass.
    pub fn locate(config: &CompilerConfig) -> Result<Self, PackError> {
        let engine_name = config.compiler.program();
        let engine = which::which(engine_name)
            .map_err(|_| PackError::compilation(format!("`{engine_name}` not found in PATH")))?;

        let bib = config.bibliography.program().and_then(|name| match which::which(name) {
            Ok(path) => Some((config.bibliography, path)),
            Err(_) => {
                log!("warning"; "`{name}` not found in PATH, bibliography pass skipped");
                None
            }
        });

        Ok(Self {
            engine,
            engine_name,
            bib,
        })
    }

    /// Toolchain made of explicit programs, bypassing `PATH`.
    #[cfg(test)]
    pub fn new(engine: PathBuf, engine_name: &'static str, bib: Option<(BibTool, PathBuf)>) -> Self {
        Self {
            engine,
            engine_name,
            bib,
        }
    }
}

/// Compile `main` (relative to the staged root) and collect accesses.
pub fn run(
    toolchain: Toolchain,
    main: &Path,
    config: &CompilerConfig,
    workspace: &Workspace,
) -> Result<Compilation, PackError> {
    Driver::new(toolchain, config, workspace.root(), workspace.out(), main).run()
}

struct Driver<'a> {
    toolchain: Toolchain,
    config: &'a CompilerConfig,
    /// Watched roots (the staged project root only).
    roots: [PathBuf; 1],
    out: &'a Path,
    main: &'a Path,
    options: MonitorOptions,
    compilation: Compilation,
}

impl<'a> Driver<'a> {
    fn new(
        toolchain: Toolchain,
        config: &'a CompilerConfig,
        root: &Path,
        out: &'a Path,
        main: &'a Path,
    ) -> Self {
        Self {
            toolchain,
            config,
            roots: [root.to_path_buf()],
            out,
            main,
            options: MonitorOptions {
                grace: config.grace(),
                ..Default::default()
            },
            compilation: Compilation::default(),
        }
    }

    fn root(&self) -> &Path {
        &self.roots[0]
    }

    fn run(mut self) -> Result<Compilation, PackError> {
        if let PassStatus::NotStarted(reason) = self.engine_pass()? {
            return Err(PackError::compilation(reason));
        }

        if let Some((tool, program)) = self.toolchain.bib.clone() {
            let targets = bib::targets(tool, self.out);
            if targets.is_empty() {
                debug!("bib"; "no bibliography requested");
            }
            for target in targets {
                self.bib_pass(tool, &program, target)?;
            }
        }

        for _ in 0..self.config.extra_passes {
            self.engine_pass()?;
        }

        self.ensure_root_document_seen()?;

        let compilation = self.compilation;
        log!(
            "compile";
            "{} with {} recorded",
            plural_count_with(compilation.passes.len(), "pass", "passes"),
            plural_count_with(compilation.events.len(), "access", "accesses")
        );
        Ok(compilation)
    }

    fn engine_pass(&mut self) -> Result<PassStatus, PackError> {
        let mut output_dir = OsString::from("-output-directory=");
        output_dir.push(self.out);

        let shell_escape = if self.config.shell_escape { "--shell-escape" } else { "" };
        let cmd = Cmd::new(&self.toolchain.engine)
            .args(["-interaction=nonstopmode", shell_escape])
            .arg(output_dir)
            .arg(self.main)
            .cwd(self.root());

        self.pass(self.toolchain.engine_name, self.main.to_path_buf(), cmd)
    }

    fn bib_pass(
        &mut self,
        tool: BibTool,
        program: &Path,
        target: PathBuf,
    ) -> Result<PassStatus, PackError> {
        let cmd = Cmd::new(program).cwd(self.out);
        let cmd = match tool {
            BibTool::Biber => cmd.args([
                OsStr::new("--input-directory"),
                self.root().as_os_str(),
                target.as_os_str(),
            ]),
            _ => cmd
                .envs([
                    ("BIBINPUTS", bib::search_path(self.root(), "BIBINPUTS")),
                    ("BSTINPUTS", bib::search_path(self.root(), "BSTINPUTS")),
                ])
                .arg(&target),
        };

        let name = tool.program().unwrap_or("bib");
        self.pass(name, target, cmd)
    }

    /// Run one monitored subprocess and record its outcome.
    fn pass(
        &mut self,
        tool: &'static str,
        target: PathBuf,
        cmd: Cmd,
    ) -> Result<PassStatus, PackError> {
        check_shutdown()?;

        let index = self.compilation.passes.len() + 1;
        let log = (!is_verbose()).then(|| self.out.join(format!("arxify-pass-{index}-{tool}.log")));
        let cmd = match &log {
            Some(path) => cmd.log_to(path),
            None => cmd,
        };

        log!("compile"; "pass {index}: {tool} {}", target.display());
        let (result, events) =
            monitor::observe(&self.roots, self.options, || cmd.spawn_supervised(is_shutdown))?;

        let status = match result {
            Ok(Exit::Cancelled) => return Err(PackError::Cancelled),
            Ok(Exit::Finished(status)) if status.success() => PassStatus::Succeeded,
            Ok(Exit::Finished(status)) => PassStatus::Failed(status.code()),
            Err(e) => PassStatus::NotStarted(describe(&e)),
        };

        match &status {
            PassStatus::Succeeded => {}
            PassStatus::Failed(code) => {
                let code = code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
                let hint = log
                    .as_ref()
                    .map(|p| format!(", see {}", p.display()))
                    .unwrap_or_default();
                log!("warning"; "{tool} exited with {code}{hint}");
            }
            PassStatus::NotStarted(reason) => log!("warning"; "{reason}"),
        }
        debug!("compile"; "pass {index}: {}", plural_count_with(events.len(), "access", "accesses"));

        self.compilation.passes.push(PassResult {
            index,
            tool,
            target,
            status: status.clone(),
            log,
            events: events.len(),
        });
        self.compilation.events.extend(events);
        Ok(status)
    }

    /// A run that never saw the root document being opened cannot be
    /// trusted to have seen anything else.
    fn ensure_root_document_seen(&self) -> Result<(), PackError> {
        let main = self.root().join(self.main);
        if self.compilation.events.iter().any(|e| e.path == main) {
            Ok(())
        } else {
            Err(PackError::monitor(format!(
                "no access to `{}` was observed during compilation",
                self.main.display()
            )))
        }
    }
}

fn describe(err: &ExecError) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}
