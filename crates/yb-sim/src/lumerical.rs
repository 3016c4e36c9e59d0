//! Lumerical FDTD / MODE session driven through generated script files.
//!
//! Every solver call writes an `.lsf` script into the work directory and
//! runs the solver binary headless on it (`-nw -run <script> -exit`). The
//! project file carries state between calls; results come back through
//! plain text files the script writes next to it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tracing::{debug, info, warn};
use yb_geometry::{GridSpec, Polygon};
use yb_types::{SolverError, SolverKind, SolverResult};

use crate::probe::SolverInstallation;
use crate::session::{ForwardSolution, SensitivityGrid, SessionStats, SolverSession};
use crate::setup::{
    format_number, SetupSummary, SimulationSetup, DEVICE_NAME, FIELD_MONITOR, FOM_MONITORS,
    SOURCE_NAME,
};

/// Failure phrases on a line that mentions the licence. Success banners
/// ("checkout successful", "no errors") must not match.
const LICENCE_FAILURES: [&str; 10] = [
    "checkout failed",
    "failed to check out",
    "failed to checkout",
    "unable to",
    "could not",
    "cannot",
    "expired",
    "not available",
    "no license available",
    "denied",
];

pub struct LumericalSession {
    install: SolverInstallation,
    work_dir: PathBuf,
    extra_args: Vec<String>,
    grid: GridSpec,
    base: Option<SetupSummary>,
    pending_geometry: Option<String>,
    /// Forward fields of the current geometry, saved for the adjoint overlap.
    forward_fields: Option<PathBuf>,
    scripts_written: u64,
    stats: SessionStats,
}

impl LumericalSession {
    pub fn new(
        install: SolverInstallation,
        work_dir: impl Into<PathBuf>,
        grid: GridSpec,
    ) -> SolverResult<Self> {
        let work_dir = work_dir.into();
        std::fs::create_dir_all(&work_dir)?;
        Ok(Self {
            install,
            work_dir,
            extra_args: Vec::new(),
            grid,
            base: None,
            pending_geometry: None,
            forward_fields: None,
            scripts_written: 0,
            stats: SessionStats::default(),
        })
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Working copy of the project, rewritten by every forward solve.
    pub fn project_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("working.{}", self.install.kind.project_extension()))
    }

    fn base(&self) -> SolverResult<&SetupSummary> {
        self.base.as_ref().ok_or_else(|| SolverError::NotInitialised {
            message: "load_base has not been called".into(),
        })
    }

    fn next_path(&mut self, stem: &str, extension: &str) -> PathBuf {
        self.scripts_written += 1;
        self.work_dir
            .join(format!("{}_{:04}.{}", stem, self.scripts_written, extension))
    }

    /// Write `body` to a script file and run the solver on it.
    fn run_script(&mut self, stem: &str, body: &str) -> SolverResult<()> {
        let script = self.next_path(stem, "lsf");
        std::fs::write(&script, body)?;

        let program = self.install.binary.display().to_string();
        debug!(program = %program, script = %script.display(), "launching solver");
        let started = Instant::now();
        let output = Command::new(&self.install.binary)
            .arg("-nw")
            .args(&self.extra_args)
            .arg("-run")
            .arg(&script)
            .arg("-exit")
            .current_dir(&self.work_dir)
            .output()
            .map_err(|source| SolverError::Launch {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(message) = licence_failure(&stdout).or_else(|| licence_failure(&stderr)) {
            warn!(program = %program, "solver licence unavailable");
            return Err(SolverError::License { message });
        }
        if !output.status.success() {
            return Err(SolverError::ProcessFailed {
                program,
                status: output.status.to_string(),
                stderr: tail(&stderr, 20),
            });
        }
        debug!(
            script = %script.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solver finished"
        );
        Ok(())
    }

    fn geometry_script(&self, polygon: &Polygon, depth: f64, n_core: f64) -> String {
        let mut s = String::new();
        s.push_str("switchtolayout;\n");
        let _ = writeln!(
            s,
            "if (getnamednumber(\"{0}\") > 0) {{ select(\"{0}\"); delete; }}",
            DEVICE_NAME
        );
        s.push_str("addpoly;\n");
        let _ = writeln!(s, "set(\"name\", \"{}\");", DEVICE_NAME);
        s.push_str("set(\"x\", 0);\nset(\"y\", 0);\n");
        if self.install.kind.is_3d() {
            let _ = writeln!(s, "set(\"z\", 0);\nset(\"z span\", {});", format_number(depth));
        }
        let vertices: Vec<String> = polygon
            .vertices()
            .iter()
            .map(|p| format!("{}, {}", format_number(p.x), format_number(p.y)))
            .collect();
        let _ = writeln!(s, "set(\"vertices\", [{}]);", vertices.join("; "));
        let _ = writeln!(s, "set(\"index\", {});", format_number(n_core));
        s
    }

    fn adjoint_sources(&self, base: &SetupSummary) -> String {
        let command = if self.install.kind.is_3d() {
            "addmode"
        } else {
            "addmodesource"
        };
        let out_y = base.waveguide_spacing / 2.0;
        let mut s = String::new();
        for (k, y) in [(1, out_y), (2, -out_y)] {
            let _ = writeln!(s, "{};", command);
            let _ = writeln!(s, "set(\"name\", \"adjoint_source_{}\");", k);
            s.push_str("set(\"injection axis\", \"x-axis\");\n");
            s.push_str("set(\"direction\", \"Backward\");\n");
            let _ = writeln!(s, "set(\"x\", {});", format_number(base.fom_plane_x));
            let _ = writeln!(s, "set(\"y\", {});", format_number(y));
            let _ = writeln!(s, "set(\"y span\", {});", format_number(base.fom_span));
            if self.install.kind.is_3d() {
                let _ = writeln!(
                    s,
                    "set(\"z\", 0);\nset(\"z span\", {});",
                    format_number(base.fom_span)
                );
            }
            let _ = writeln!(
                s,
                "set(\"wavelength start\", {});\nset(\"wavelength stop\", {});",
                format_number(base.wavelengths.start),
                format_number(base.wavelengths.stop)
            );
        }
        s
    }
}

impl SolverSession for LumericalSession {
    fn kind(&self) -> SolverKind {
        self.install.kind
    }

    fn load_base(&mut self, setup: &SimulationSetup) -> SolverResult<()> {
        info!(kind = %setup.kind(), "building base project");
        let mut body = setup.to_script();
        let _ = writeln!(body, "\nsave(\"{}\");", lsf_path(&self.project_path()));
        self.run_script("base", &body)?;
        self.base = Some(setup.summary);
        self.pending_geometry = None;
        self.forward_fields = None;
        Ok(())
    }

    fn update_geometry(&mut self, polygon: &Polygon, depth: f64) -> SolverResult<()> {
        let n_core = self.base()?.n_core;
        self.pending_geometry = Some(self.geometry_script(polygon, depth, n_core));
        self.forward_fields = None;
        self.stats.geometry_updates += 1;
        debug!(vertices = polygon.len(), "geometry staged");
        Ok(())
    }

    fn forward_solve(&mut self) -> SolverResult<ForwardSolution> {
        self.base()?;
        let project = self.project_path();
        let out = self.next_path("forward", "txt");
        let fields = self.next_path("forward_fields", "mat");

        let mut body = String::from("format long;\n");
        let _ = writeln!(body, "load(\"{}\");", lsf_path(&project));
        if let Some(geometry) = &self.pending_geometry {
            body.push_str(geometry);
        }
        let _ = writeln!(body, "save(\"{}\");", lsf_path(&project));
        body.push_str("run;\n");
        let _ = writeln!(body, "T1 = transmission(\"{}\");", FOM_MONITORS[0]);
        let _ = writeln!(body, "T2 = transmission(\"{}\");", FOM_MONITORS[1]);
        let _ = writeln!(body, "f = getdata(\"{}\", \"f\");", FOM_MONITORS[0]);
        body.push_str("lambda = c / f;\n");
        let _ = writeln!(body, "out_file = \"{}\";", lsf_path(&out));
        body.push_str("if (fileexists(out_file)) { rm(out_file); }\n");
        body.push_str(
            "for (i = 1:length(lambda)) {\n    write(out_file, num2str(lambda(i)) + \" \" + num2str(abs(T1(i))) + \" \" + num2str(abs(T2(i))));\n}\n",
        );
        let _ = writeln!(body, "fwd = getresult(\"{}\", \"E\");", FIELD_MONITOR);
        let _ = writeln!(body, "matlabsave(\"{}\", fwd);", lsf_path(&fields));

        self.run_script("forward", &body)?;
        let text = read_output(&out)?;
        let solution = parse_forward_output(&text).map_err(|message| SolverError::Output {
            path: out.display().to_string(),
            message,
        })?;

        self.pending_geometry = None;
        self.forward_fields = Some(fields);
        self.stats.forward_solves += 1;
        info!(fom = solution.fom, "forward solve complete");
        Ok(solution)
    }

    fn adjoint_solve(&mut self) -> SolverResult<SensitivityGrid> {
        let base = *self.base()?;
        let fields = self
            .forward_fields
            .clone()
            .ok_or_else(|| SolverError::NotInitialised {
                message: "adjoint solve needs a forward solve of the current geometry".into(),
            })?;
        let out = self.next_path("adjoint", "txt");
        let g = self.grid;

        let mut body = String::from("format long;\n");
        let _ = writeln!(body, "load(\"{}\");", lsf_path(&self.project_path()));
        body.push_str("switchtolayout;\n");
        let _ = writeln!(body, "select(\"{}\");\nset(\"enabled\", 0);", SOURCE_NAME);
        body.push_str(&self.adjoint_sources(&base));
        body.push_str("run;\n");
        let _ = writeln!(body, "adj = getresult(\"{}\", \"E\");", FIELD_MONITOR);
        let _ = writeln!(body, "matlabload(\"{}\");", lsf_path(&fields));
        body.push_str("Ef = fwd.E;\nEa = adj.E;\n");
        body.push_str(
            "overlap = real(Ef(:,:,1,:,1) * Ea(:,:,1,:,1) + Ef(:,:,1,:,2) * Ea(:,:,1,:,2) + Ef(:,:,1,:,3) * Ea(:,:,1,:,3));\n",
        );
        body.push_str("overlap = pinch(sum(overlap, 4)) / length(adj.lambda);\n");
        let _ = writeln!(
            body,
            "scale = eps0 * ({}^2 - {}^2);",
            format_number(base.n_core),
            format_number(base.n_cladding)
        );
        let (x_first, y_first) = g.cell_center(0, 0);
        let (x_last, y_last) = g.cell_center(g.nx - 1, g.ny - 1);
        let _ = writeln!(
            body,
            "xg = linspace({}, {}, {});\nyg = linspace({}, {}, {});",
            format_number(x_first),
            format_number(x_last),
            g.nx,
            format_number(y_first),
            format_number(y_last),
            g.ny
        );
        body.push_str("S = scale * interp(overlap, adj.x, adj.y, xg, yg);\n");
        let _ = writeln!(body, "out_file = \"{}\";", lsf_path(&out));
        body.push_str("if (fileexists(out_file)) { rm(out_file); }\n");
        let _ = writeln!(body, "write(out_file, \"{} {}\");", g.nx, g.ny);
        body.push_str("for (j = 1:length(yg)) {\n    write(out_file, num2str(S(:, j)'));\n}\n");

        self.run_script("adjoint", &body)?;
        let text = read_output(&out)?;
        let values = parse_sensitivity(&text, &g).map_err(|message| SolverError::Output {
            path: out.display().to_string(),
            message,
        })?;
        self.stats.adjoint_solves += 1;
        info!("adjoint solve complete");
        SensitivityGrid::new(g, values)
    }

    fn save_project(&mut self, path: &Path) -> SolverResult<PathBuf> {
        let project = self.project_path();
        if !project.is_file() {
            return Err(SolverError::NotInitialised {
                message: format!("no project at {}", project.display()),
            });
        }
        let target = path.with_extension(self.install.kind.project_extension());
        match self.pending_geometry.clone() {
            // staged geometry has not reached the working project yet
            Some(geometry) => {
                let mut body = String::new();
                let _ = writeln!(body, "load(\"{}\");", lsf_path(&project));
                body.push_str(&geometry);
                let _ = writeln!(body, "save(\"{}\");", lsf_path(&target));
                self.run_script("save", &body)?;
            }
            None => {
                std::fs::copy(&project, &target)?;
            }
        }
        info!(path = %target.display(), "solver project saved");
        Ok(target)
    }

    fn stats(&self) -> SessionStats {
        self.stats
    }
}

/// Paths inside script string literals use forward slashes on every
/// platform.
fn lsf_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn read_output(path: &Path) -> SolverResult<String> {
    std::fs::read_to_string(path).map_err(|e| SolverError::Output {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// First output line reporting a licence problem.
pub fn licence_failure(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let lower = line.to_ascii_lowercase();
        let mentions = lower.contains("license") || lower.contains("licence");
        let failed = lower.trim_start().starts_with("error")
            || LICENCE_FAILURES.iter().any(|phrase| lower.contains(phrase));
        (mentions && failed)
            .then(|| line.trim().to_string())
    })
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Parse `wavelength t1 t2` lines. The figure of merit is the
/// wavelength-averaged total transmission.
pub fn parse_forward_output(text: &str) -> Result<ForwardSolution, String> {
    let mut wavelengths = Vec::new();
    let mut transmission = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| format!("line {}: {}", n + 1, e))?;
        if fields.len() != 3 {
            return Err(format!("line {}: expected 3 columns, got {}", n + 1, fields.len()));
        }
        wavelengths.push(fields[0]);
        transmission.push(fields[1] + fields[2]);
    }
    if transmission.is_empty() {
        return Err("no wavelength samples".into());
    }
    let fom = transmission.iter().sum::<f64>() / transmission.len() as f64;
    Ok(ForwardSolution {
        fom,
        wavelengths,
        transmission,
    })
}

/// Parse an `nx ny` header followed by `nx * ny` values, row by row.
pub fn parse_sensitivity(text: &str, spec: &GridSpec) -> Result<Vec<f64>, String> {
    let mut tokens = text.split_whitespace();
    let mut dim = |what: &str| -> Result<usize, String> {
        tokens
            .next()
            .ok_or_else(|| format!("missing {what} in header"))?
            .parse::<usize>()
            .map_err(|e| format!("bad {what}: {e}"))
    };
    let nx = dim("nx")?;
    let ny = dim("ny")?;
    if nx != spec.nx || ny != spec.ny {
        return Err(format!(
            "grid is {nx}x{ny}, expected {}x{}",
            spec.nx, spec.ny
        ));
    }
    let values: Vec<f64> = tokens
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad value: {e}"))?;
    if values.len() != nx * ny {
        return Err(format!("expected {} values, got {}", nx * ny, values.len()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err("non-finite sensitivity".into());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yb_types::{GridConfig, Wavelengths};

    fn small_grid() -> GridSpec {
        GridSpec::from_config(&GridConfig {
            x_min: 0.0,
            x_max: 3.0,
            y_min: 0.0,
            y_max: 2.0,
            cell: 1.0,
            subsamples: 2,
        })
        .unwrap()
    }

    #[test]
    fn forward_output_parsing() {
        let text = "1.5e-06 0.45 0.44\n\n1.6e-06 0.40 0.41\n";
        let solution = parse_forward_output(text).unwrap();
        assert_eq!(solution.wavelengths, vec![1.5e-6, 1.6e-6]);
        assert!((solution.fom - 0.85).abs() < 1e-12);

        assert!(parse_forward_output("").is_err());
        assert!(parse_forward_output("1.5e-06 0.4").is_err());
        assert!(parse_forward_output("1.5e-06 nope 0.4").is_err());
    }

    #[test]
    fn sensitivity_parsing() {
        let spec = small_grid();
        let values = parse_sensitivity("3 2\n1 2 3\n4 5 6\n", &spec).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert!(parse_sensitivity("2 2\n1 2 3 4", &spec).is_err());
        assert!(parse_sensitivity("3 2\n1 2 3", &spec).is_err());
        assert!(parse_sensitivity("3 2\n1 2 3 4 5 NaN", &spec).is_err());
    }

    #[test]
    fn licence_messages_detected() {
        let out = "Starting\nError: license checkout failed for feature FDTD\n";
        assert_eq!(
            licence_failure(out).as_deref(),
            Some("Error: license checkout failed for feature FDTD")
        );
        assert!(licence_failure("Loaded license file\nrunning").is_none());
        assert_eq!(
            licence_failure("FlexNet: license for FDTD has expired").as_deref(),
            Some("FlexNet: license for FDTD has expired")
        );
    }

    #[test]
    fn licence_success_banners_pass() {
        for banner in [
            "License checkout successful for FDTD_Solutions_engine",
            "Using license server 27011@host (no errors)",
            "License expires in 30 days",
            "Licence checked out: 1 of 4 engines in use",
        ] {
            assert!(licence_failure(banner).is_none(), "{banner}");
        }
    }

    #[test]
    fn geometry_needs_base_project() {
        let dir = tempfile::tempdir().unwrap();
        let install = SolverInstallation {
            root: dir.path().to_path_buf(),
            kind: SolverKind::Fdtd3D,
            binary: dir.path().join("bin/fdtd-solutions"),
        };
        let mut session = LumericalSession::new(install, dir.path().join("solver"), small_grid())
            .unwrap();
        let square = Polygon::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(matches!(
            session.update_geometry(&square, 220e-9),
            Err(SolverError::NotInitialised { .. })
        ));
        assert!(matches!(
            session.adjoint_solve(),
            Err(SolverError::NotInitialised { .. })
        ));
        assert!(matches!(
            session.save_project(&dir.path().join("y_branch.fsp")),
            Err(SolverError::NotInitialised { .. })
        ));
    }

    #[cfg(unix)]
    mod fake_solver {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Stand-in binary: extracts `out_file` from the script and writes
        /// canned results there; touches every `save("...")` target.
        fn install(dir: &Path, body: &str) -> SolverInstallation {
            let bin = dir.join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let binary = bin.join("fdtd-solutions");
            std::fs::write(&binary, format!("#!/bin/sh\nscript=\"$3\"\n{body}\n")).unwrap();
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
            SolverInstallation {
                root: dir.to_path_buf(),
                kind: SolverKind::Fdtd3D,
                binary,
            }
        }

        const WRITE_RESULTS: &str = r#"
for p in $(sed -n 's/^save("\(.*\)");$/\1/p' "$script"); do : > "$p"; done
out=$(sed -n 's/^out_file = "\(.*\)";$/\1/p' "$script")
case "$script" in
  *forward_*) printf '1.3e-06 0.40 0.40\n1.8e-06 0.30 0.30\n' > "$out" ;;
  *adjoint_*) printf '3 2\n1 2 3\n4 5 6\n' > "$out" ;;
esac
exit 0"#;

        #[test]
        fn full_cycle_counts_solves() {
            let dir = tempfile::tempdir().unwrap();
            let install = install(dir.path(), WRITE_RESULTS);
            let mut session =
                LumericalSession::new(install, dir.path().join("solver"), small_grid()).unwrap();

            let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
            session.load_base(&setup).unwrap();
            let square = Polygon::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
            session.update_geometry(&square, 220e-9).unwrap();

            let forward = session.forward_solve().unwrap();
            assert!((forward.fom - 0.7).abs() < 1e-12);
            let sensitivity = session.adjoint_solve().unwrap();
            assert_eq!(sensitivity.values.len(), 6);

            let stats = session.stats();
            assert_eq!(stats.forward_solves, 1);
            assert_eq!(stats.adjoint_solves, 1);

            let saved = session.save_project(&dir.path().join("y_branch.fsp")).unwrap();
            assert!(saved.is_file());

            let scripts: Vec<_> = std::fs::read_dir(session.work_dir())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().map_or(false, |x| x == "lsf"))
                .collect();
            assert_eq!(scripts.len(), 3);
        }

        #[test]
        fn staged_geometry_is_applied_on_save() {
            let dir = tempfile::tempdir().unwrap();
            let install = install(dir.path(), WRITE_RESULTS);
            let mut session =
                LumericalSession::new(install, dir.path().join("solver"), small_grid()).unwrap();
            let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
            session.load_base(&setup).unwrap();
            let square = Polygon::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
            session.update_geometry(&square, 220e-9).unwrap();

            let saved = session.save_project(&dir.path().join("y_branch.fsp")).unwrap();
            assert!(saved.is_file());
            assert_eq!(session.stats().solves(), 0);
            let script = std::fs::read_to_string(session.work_dir().join("save_0002.lsf")).unwrap();
            assert!(script.contains("addpoly;"));
        }

        #[test]
        fn licence_failure_is_surfaced() {
            let dir = tempfile::tempdir().unwrap();
            let install = install(
                dir.path(),
                "echo 'Error: license checkout failed' >&2\nexit 1",
            );
            let mut session =
                LumericalSession::new(install, dir.path().join("solver"), small_grid()).unwrap();
            let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
            assert!(matches!(
                session.load_base(&setup),
                Err(SolverError::License { .. })
            ));
        }

        #[test]
        fn licence_banner_does_not_fail_a_solve() {
            let dir = tempfile::tempdir().unwrap();
            let body = format!(
                "echo 'License checkout successful for FDTD_Solutions_engine'\n{WRITE_RESULTS}"
            );
            let install = install(dir.path(), &body);
            let mut session =
                LumericalSession::new(install, dir.path().join("solver"), small_grid()).unwrap();
            let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
            session.load_base(&setup).unwrap();
            let square = Polygon::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
            session.update_geometry(&square, 220e-9).unwrap();
            assert!(session.forward_solve().is_ok());
        }

        #[test]
        fn non_zero_exit_is_process_failure() {
            let dir = tempfile::tempdir().unwrap();
            let install = install(dir.path(), "echo 'segfault' >&2\nexit 3");
            let mut session =
                LumericalSession::new(install, dir.path().join("solver"), small_grid()).unwrap();
            let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
            match session.load_base(&setup) {
                Err(SolverError::ProcessFailed { stderr, .. }) => assert_eq!(stderr, "segfault"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
