//! Static simulation setup for the Y-branch.
//!
//! The setup is a typed list of solver objects, each carrying an ordered
//! property list. It is rendered to Lumerical script by [`SimulationSetup::to_script`]
//! and never talks to the solver itself.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use yb_types::{to_um, RunConfig, SolverKind, Wavelengths, FS, NM, UM};

/// Name of the optimisable polygon inside the solver project.
pub const DEVICE_NAME: &str = "y_branch";
pub const SOURCE_NAME: &str = "source";
pub const FIELD_MONITOR: &str = "opt_fields";
pub const FOM_MONITORS: [&str; 2] = ["fom_monitor_1", "fom_monitor_2"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => f.write_str(&format_number(*v)),
            Self::Text(s) => write!(f, "\"{}\"", s.replace('"', "'")),
        }
    }
}

/// Whether a failed property assignment aborts setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    /// Not every solver release exposes the property; failures are skipped.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    pub requirement: Requirement,
}

/// One object added to the solver project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObject {
    /// Script command creating the object (`addrect`, `addpower`, ...).
    pub command: String,
    /// `None` for simulation regions, which cannot be renamed.
    pub name: Option<String>,
    pub properties: Vec<Property>,
}

impl SimObject {
    pub fn new(command: &str, name: Option<&str>) -> Self {
        Self {
            command: command.to_string(),
            name: name.map(str::to_string),
            properties: Vec::new(),
        }
    }

    pub fn set(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            value: value.into(),
            requirement: Requirement::Required,
        });
        self
    }

    pub fn soft_set(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            value: value.into(),
            requirement: Requirement::Optional,
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.property(name)? {
            PropertyValue::Number(v) => Some(*v),
            PropertyValue::Text(_) => None,
        }
    }

    fn write_script(&self, out: &mut String) {
        let _ = writeln!(out, "{};", self.command);
        if let Some(name) = &self.name {
            let _ = writeln!(out, "set(\"name\", \"{}\");", name);
        }
        for p in &self.properties {
            match p.requirement {
                Requirement::Required => {
                    let _ = writeln!(out, "set(\"{}\", {});", p.name, p.value);
                }
                Requirement::Optional => {
                    let _ = writeln!(
                        out,
                        "try {{ set(\"{}\", {}); }} catch(setup_msg);",
                        p.name, p.value
                    );
                }
            }
        }
    }
}

/// Key dimensions of the base simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupSummary {
    pub kind: SolverKind,
    pub sim_length: f64,
    pub sim_width: f64,
    /// Only set for 3D runs.
    pub sim_height: Option<f64>,
    pub waveguide_width: f64,
    pub waveguide_height: f64,
    pub waveguide_spacing: f64,
    pub n_core: f64,
    pub n_cladding: f64,
    /// x of the FOM monitor plane.
    pub fom_plane_x: f64,
    /// y span of each FOM monitor.
    pub fom_span: f64,
    pub wavelengths: Wavelengths,
}

impl fmt::Display for SetupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "solver:            {}", self.kind)?;
        write!(
            f,
            "region:            {:.3} x {:.3}",
            to_um(self.sim_length),
            to_um(self.sim_width)
        )?;
        if let Some(h) = self.sim_height {
            write!(f, " x {:.3}", to_um(h))?;
        }
        writeln!(f, " um")?;
        writeln!(f, "waveguide width:   {:.3} um", to_um(self.waveguide_width))?;
        writeln!(f, "waveguide height:  {:.3} um", to_um(self.waveguide_height))?;
        writeln!(f, "output spacing:    {:.3} um", to_um(self.waveguide_spacing))?;
        writeln!(f, "core index:        {}", self.n_core)?;
        writeln!(f, "cladding index:    {}", self.n_cladding)?;
        write!(
            f,
            "wavelengths:       {:.0}-{:.0} nm ({} points)",
            self.wavelengths.start / NM,
            self.wavelengths.stop / NM,
            self.wavelengths.points
        )
    }
}

/// Inputs to [`SimulationSetup::build`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetupParams {
    pub kind: SolverKind,
    pub wavelengths: Wavelengths,
    pub waveguide_width: f64,
    pub waveguide_height: f64,
    /// Centre-to-centre distance of the two output waveguides.
    pub waveguide_spacing: f64,
    pub n_core: f64,
    pub n_cladding: f64,
    /// Optimisation region (field monitor and mesh override), centred.
    pub opt_center: (f64, f64),
    pub opt_span: (f64, f64),
}

impl SetupParams {
    pub fn new(kind: SolverKind, wavelengths: Wavelengths) -> Self {
        Self {
            kind,
            wavelengths,
            waveguide_width: 0.5 * UM,
            waveguide_height: 220.0 * NM,
            waveguide_spacing: 2.0 * UM,
            n_core: 3.48,
            n_cladding: 1.44,
            opt_center: (0.0, 0.0),
            opt_span: (2.5 * UM, 3.0 * UM),
        }
    }

    /// Setup matching a run configuration: output waveguides are placed at
    /// the parameterized port centres and the optimisation region follows
    /// the sensitivity grid.
    pub fn from_config(config: &RunConfig) -> Self {
        let g = &config.geometry;
        let grid = &config.grid;
        Self {
            kind: config.solver.kind,
            wavelengths: config.wavelengths,
            waveguide_width: g.waveguide_width,
            waveguide_height: g.depth,
            waveguide_spacing: 2.0 * g.port_center(),
            n_core: g.core_index,
            n_cladding: g.cladding_index,
            opt_center: (
                0.5 * (grid.x_min + grid.x_max),
                0.5 * (grid.y_min + grid.y_max),
            ),
            opt_span: (grid.x_max - grid.x_min, grid.y_max - grid.y_min),
        }
    }
}

const SIM_LENGTH: f64 = 6.0 * UM;
const SIM_WIDTH: f64 = 6.0 * UM;
const SIM_HEIGHT: f64 = 3.0 * UM;
const MESH_ACCURACY: f64 = 3.0;
const SIM_TIME: f64 = 1000.0 * FS;
const SUBSTRATE_ALPHA: f64 = 0.3;
const WAVEGUIDE_LENGTH: f64 = 2.0 * UM;
const SOURCE_SPAN: f64 = 2.0 * UM;
const FOM_SPAN: f64 = 1.5 * UM;
const OPT_MESH_STEP: f64 = 20.0 * NM;
/// Extra z extent of the mesh override above and below the core.
const OPT_MESH_Z_MARGIN: f64 = 0.5 * UM;

/// The base project: region, materials, waveguides, source, monitors and
/// mesh override. The optimisable device is added later by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSetup {
    pub summary: SetupSummary,
    pub objects: Vec<SimObject>,
}

impl SimulationSetup {
    /// Reference Y-branch setup with 2 um output spacing.
    pub fn y_branch(kind: SolverKind, wavelengths: Wavelengths) -> Self {
        Self::build(&SetupParams::new(kind, wavelengths))
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::build(&SetupParams::from_config(config))
    }

    pub fn build(p: &SetupParams) -> Self {
        let three_d = p.kind.is_3d();
        let half = SIM_LENGTH / 2.0;
        let out_y = p.waveguide_spacing / 2.0;
        let fom_x = half - 0.5 * UM;

        let mut objects = Vec::new();

        let region_cmd = if three_d { "addfdtd" } else { "addvarfdtd" };
        let mut region = SimObject::new(region_cmd, None)
            .set("x", 0.0)
            .set("y", 0.0)
            .set("x span", SIM_LENGTH)
            .set("y span", SIM_WIDTH);
        if three_d {
            region = region.set("z", 0.0).set("z span", SIM_HEIGHT);
        }
        region = region
            .set("mesh accuracy", MESH_ACCURACY)
            .set("simulation time", SIM_TIME)
            .set("x min bc", "PML")
            .set("x max bc", "PML")
            .set("y min bc", "PML")
            .set("y max bc", "PML");
        if three_d {
            region = region.set("z min bc", "PML").set("z max bc", "PML");
        }
        objects.push(region);

        let mut substrate = SimObject::new("addrect", Some("substrate"))
            .set("x", 0.0)
            .set("y", 0.0)
            .set("x span", SIM_LENGTH)
            .set("y span", SIM_WIDTH);
        if three_d {
            substrate = substrate.set("z", 0.0).set("z span", SIM_HEIGHT);
        }
        objects.push(
            substrate
                .set("index", p.n_cladding)
                .soft_set("alpha", SUBSTRATE_ALPHA),
        );

        let waveguides = [
            ("input_waveguide", -half + 1.0 * UM, 0.0),
            ("output_waveguide_1", half - 1.0 * UM, out_y),
            ("output_waveguide_2", half - 1.0 * UM, -out_y),
        ];
        for (name, x, y) in waveguides {
            let mut wg = SimObject::new("addrect", Some(name))
                .set("x", x)
                .set("x span", WAVEGUIDE_LENGTH)
                .set("y", y)
                .set("y span", p.waveguide_width);
            if three_d {
                wg = wg.set("z", 0.0).set("z span", p.waveguide_height);
            }
            objects.push(wg.set("index", p.n_core));
        }

        let source_cmd = if three_d { "addmode" } else { "addmodesource" };
        let mut source = SimObject::new(source_cmd, Some(SOURCE_NAME))
            .soft_set("injection axis", "x-axis")
            .soft_set("direction", "Forward")
            .set("x", -half + 0.5 * UM)
            .set("y", 0.0)
            .set("y span", SOURCE_SPAN);
        if three_d {
            source = source.set("z", 0.0).set("z span", SOURCE_SPAN);
        }
        objects.push(
            source
                .soft_set("wavelength start", p.wavelengths.start)
                .soft_set("wavelength stop", p.wavelengths.stop)
                .soft_set("mode selection", "fundamental TE mode"),
        );

        let mut fields = SimObject::new("addpower", Some(FIELD_MONITOR));
        if three_d {
            fields = fields.set("monitor type", "2D Z-normal");
        }
        fields = fields
            .set("x", p.opt_center.0)
            .set("x span", p.opt_span.0)
            .set("y", p.opt_center.1)
            .set("y span", p.opt_span.1);
        if three_d {
            fields = fields.set("z", 0.0);
        }
        objects.push(
            fields
                .soft_set("override global monitor settings", 1.0)
                .soft_set("frequency points", p.wavelengths.points as f64),
        );

        for (name, y) in [(FOM_MONITORS[0], out_y), (FOM_MONITORS[1], -out_y)] {
            let mut monitor = SimObject::new("addpower", Some(name));
            if three_d {
                monitor = monitor.set("monitor type", "2D X-normal");
            }
            monitor = monitor
                .set("x", fom_x)
                .set("y", y)
                .set("y span", FOM_SPAN);
            if three_d {
                monitor = monitor.set("z", 0.0).set("z span", FOM_SPAN);
            }
            objects.push(monitor);
        }

        let mut mesh = SimObject::new("addmesh", Some("opt_mesh"))
            .set("x", p.opt_center.0)
            .set("x span", p.opt_span.0)
            .set("y", p.opt_center.1)
            .set("y span", p.opt_span.1);
        if three_d {
            mesh = mesh
                .set("z", 0.0)
                .set("z span", p.waveguide_height + OPT_MESH_Z_MARGIN);
        }
        mesh = mesh.set("dx", OPT_MESH_STEP).set("dy", OPT_MESH_STEP);
        if three_d {
            mesh = mesh.set("dz", OPT_MESH_STEP);
        }
        objects.push(mesh);

        Self {
            summary: SetupSummary {
                kind: p.kind,
                sim_length: SIM_LENGTH,
                sim_width: SIM_WIDTH,
                sim_height: three_d.then_some(SIM_HEIGHT),
                waveguide_width: p.waveguide_width,
                waveguide_height: p.waveguide_height,
                waveguide_spacing: p.waveguide_spacing,
                n_core: p.n_core,
                n_cladding: p.n_cladding,
                fom_plane_x: fom_x,
                fom_span: FOM_SPAN,
                wavelengths: p.wavelengths,
            },
            objects,
        }
    }

    pub fn kind(&self) -> SolverKind {
        self.summary.kind
    }

    pub fn object(&self, name: &str) -> Option<&SimObject> {
        self.objects
            .iter()
            .find(|o| o.name.as_deref() == Some(name))
    }

    /// Render the setup as a Lumerical script that rebuilds the project
    /// from scratch.
    pub fn to_script(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Y-branch base setup, {}", self.summary.kind);
        out.push_str("switchtolayout;\ndeleteall;\n");
        for object in &self.objects {
            out.push('\n');
            object.write_script(&mut out);
        }
        out
    }
}

/// Shortest round-trip form; exponent notation for lengths and times.
pub(crate) fn format_number(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else if (1e-3..1e9).contains(&v.abs()) {
        format!("{}", v)
    } else {
        format!("{:e}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fdtd_setup_has_every_object() {
        let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
        for name in [
            "substrate",
            "input_waveguide",
            "output_waveguide_1",
            "output_waveguide_2",
            SOURCE_NAME,
            FIELD_MONITOR,
            FOM_MONITORS[0],
            FOM_MONITORS[1],
            "opt_mesh",
        ] {
            assert!(setup.object(name).is_some(), "missing {name}");
        }
        assert_eq!(setup.objects[0].command, "addfdtd");
        assert_eq!(setup.summary.sim_height, Some(3.0 * UM));

        let out1 = setup.object("output_waveguide_1").unwrap();
        assert_eq!(out1.number("y"), Some(1.0 * UM));
        assert_eq!(out1.number("z span"), Some(220.0 * NM));
    }

    #[test]
    fn mode_setup_is_two_dimensional() {
        let setup = SimulationSetup::y_branch(SolverKind::Mode25D, Wavelengths::default());
        assert_eq!(setup.objects[0].command, "addvarfdtd");
        assert!(setup.summary.sim_height.is_none());
        assert!(setup
            .objects
            .iter()
            .all(|o| o.property("z span").is_none()));
        assert!(setup.object("opt_fields").unwrap().property("monitor type").is_none());
    }

    #[test]
    fn script_wraps_optional_properties() {
        let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
        let script = setup.to_script();
        assert!(script.starts_with("# Y-branch base setup"));
        assert!(script.contains("addfdtd;\nset(\"x\", 0);"));
        assert!(script.contains("set(\"x min bc\", \"PML\");"));
        assert!(script.contains("try { set(\"alpha\", 0.3); } catch(setup_msg);"));
        assert!(script.contains("set(\"name\", \"fom_monitor_2\");"));
        assert!(script.contains("set(\"simulation time\", 1e-12);"));
        // the region is never renamed
        assert!(!script.contains("addfdtd;\nset(\"name\""));
    }

    #[test]
    fn config_setup_follows_geometry() {
        let config = RunConfig::default();
        let setup = SimulationSetup::from_config(&config);
        assert!((setup.summary.waveguide_spacing - 0.9 * UM).abs() < 1e-12);
        let fields = setup.object(FIELD_MONITOR).unwrap();
        assert!((fields.number("x span").unwrap() - 2.5 * UM).abs() < 1e-12);

        let dual = RunConfig::default().with_geometry(yb_types::GeometryConfig::dual_edge());
        let setup = SimulationSetup::from_config(&dual);
        assert!((setup.summary.waveguide_spacing - 2.0 * UM).abs() < 1e-12);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(6e-6), "6e-6");
        assert_eq!(format_number(1.44), "1.44");
        assert_eq!(format_number(-2.5e-6), "-2.5e-6");
    }

    #[test]
    fn summary_display() {
        let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
        let text = setup.summary.to_string();
        assert!(text.contains("6.000 x 6.000 x 3.000 um"));
        assert!(text.contains("1300-1800 nm (21 points)"));
    }
}
