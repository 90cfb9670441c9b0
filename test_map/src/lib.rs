//! 2D test level format parsing, expansion and world building.
#![forbid(unsafe_code)]

use physics_rapier::PhysicsWorld;
use rapier2d::math::{Point, Vector};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct TestMap {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub spawn: Option<[f32; 2]>,
    #[serde(default)]
    pub solids: Vec<SolidSpec>,
    #[serde(default)]
    pub generators: Vec<GeneratorSpec>,
    #[serde(default)]
    pub pads: Vec<PadSpec>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SolidSpec {
    pub id: String,
    pub kind: SolidKind,
    /// Center of the solid's bounding box.
    pub pos: [f32; 2],
    #[serde(default)]
    pub size: Option<[f32; 2]>,
    #[serde(default)]
    pub rotation_deg: Option<f32>,
    #[serde(default)]
    pub angle_deg: Option<f32>,
    #[serde(default)]
    pub length: Option<f32>,
    /// Ramps rise to the right unless mirrored.
    #[serde(default)]
    pub mirrored: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SolidKind {
    Box,
    BoxRot,
    Ramp,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorSpec {
    Stairs {
        id: String,
        /// Bottom corner the first step starts from.
        pos: [f32; 2],
        step_count: u32,
        step_rise: f32,
        step_run: f32,
        #[serde(default)]
        descending: bool,
        #[serde(default)]
        tags: Vec<String>,
    },
    Ramps {
        id: String,
        pos: [f32; 2],
        length: f32,
        angles_deg: Vec<f32>,
        #[serde(default)]
        align_base: bool,
        #[serde(default)]
        gap: f32,
        #[serde(default)]
        tags: Vec<String>,
    },
    /// Two slanted walls meeting at `pos`.
    VPit {
        id: String,
        pos: [f32; 2],
        span: f32,
        angle_deg: f32,
        #[serde(default = "default_wall_thickness")]
        thickness: f32,
        #[serde(default)]
        tags: Vec<String>,
    },
}

/// Launch pad placed in the level.
#[derive(Clone, Debug, Deserialize)]
pub struct PadSpec {
    pub id: String,
    pub pos: [f32; 2],
    pub size: [f32; 2],
    #[serde(default = "default_pad_up")]
    pub up: [f32; 2],
    pub push_force: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSolid {
    pub id: String,
    pub kind: SolidKind,
    pub pos: [f32; 2],
    pub size: [f32; 2],
    pub rotation_deg: f32,
    pub mirrored: bool,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TestMapValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TestMapValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl TestMap {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    pub fn spawn_point(&self) -> [f32; 2] {
        self.spawn.unwrap_or([0.0, 0.0])
    }

    pub fn validate(&self) -> TestMapValidation {
        let mut validation = TestMapValidation::default();
        if self.version != 1 {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }
        match self.spawn {
            Some(spawn) if !vector_is_finite(spawn) => {
                validation.errors.push("spawn must be finite".to_string());
            }
            None => validation
                .warnings
                .push("no spawn given; using the origin".to_string()),
            _ => {}
        }
        if self.solids.is_empty() && self.generators.is_empty() {
            validation
                .warnings
                .push("test map contains no solids or generators".to_string());
        }
        for solid in &self.solids {
            validate_solid(solid, &mut validation);
        }
        for generator in &self.generators {
            validate_generator(generator, &mut validation);
        }
        for pad in &self.pads {
            if !vector_is_finite(pad.pos) {
                validation
                    .errors
                    .push(format!("pad '{}' has invalid pos", pad.id));
            }
            if !vector_is_finite(pad.size) || pad.size.iter().any(|value| *value <= 0.0) {
                validation
                    .errors
                    .push(format!("pad '{}' has invalid size", pad.id));
            }
            if !vector_is_finite(pad.up) || pad.up == [0.0, 0.0] {
                validation
                    .errors
                    .push(format!("pad '{}' up must be a non-zero direction", pad.id));
            }
            if pad.push_force <= 0.0 {
                validation
                    .warnings
                    .push(format!("pad '{}' has no push force", pad.id));
            }
        }
        validation
    }

    pub fn expanded_solids(&self) -> Result<Vec<ResolvedSolid>, String> {
        let validation = self.validate();
        if !validation.is_ok() {
            return Err(validation.errors.join("; "));
        }
        let mut solids = Vec::new();
        for solid in &self.solids {
            solids.push(solid.resolve()?);
        }
        for generator in &self.generators {
            solids.extend(generator.expand());
        }
        let mut seen = std::collections::HashSet::new();
        for solid in &solids {
            if !seen.insert(solid.id.clone()) {
                return Err(format!("duplicate solid id '{}'", solid.id));
            }
        }
        Ok(solids)
    }

    /// Expands the map and inserts every solid as an obstacle.
    pub fn build_world(&self) -> Result<PhysicsWorld, String> {
        let solids = self.expanded_solids()?;
        let mut world = PhysicsWorld::new();
        for solid in &solids {
            insert_solid(&mut world, solid);
        }
        log::info!(
            "map '{}': {} obstacles from {} solids",
            self.name,
            world.obstacle_count(),
            solids.len()
        );
        Ok(world)
    }
}

impl SolidSpec {
    fn resolve(&self) -> Result<ResolvedSolid, String> {
        let size = self
            .effective_size()
            .ok_or_else(|| format!("solid '{}' missing size", self.id))?;
        let rotation_deg = match self.kind {
            SolidKind::BoxRot => self.rotation_deg.unwrap_or(0.0),
            SolidKind::Box | SolidKind::Ramp => 0.0,
        };
        Ok(ResolvedSolid {
            id: self.id.clone(),
            kind: self.kind,
            pos: self.pos,
            size,
            rotation_deg,
            mirrored: self.mirrored,
            tags: self.tags.clone(),
        })
    }

    fn effective_size(&self) -> Option<[f32; 2]> {
        if let Some(size) = self.size {
            return Some(size);
        }
        if self.kind == SolidKind::Ramp {
            let length = self.length?;
            let angle = self.angle_deg?;
            return Some([length, angle.to_radians().tan() * length]);
        }
        None
    }
}

impl GeneratorSpec {
    fn expand(&self) -> Vec<ResolvedSolid> {
        match self {
            GeneratorSpec::Stairs {
                id,
                pos,
                step_count,
                step_rise,
                step_run,
                descending,
                tags,
            } => {
                let direction = if *descending { -1.0 } else { 1.0 };
                (0..*step_count)
                    .map(|index| {
                        let step = index as f32;
                        ResolvedSolid {
                            id: format!("{}/step_{:02}", id, index + 1),
                            kind: SolidKind::Box,
                            pos: [
                                pos[0] + direction * step_run * (step + 0.5),
                                pos[1] + step_rise * (step + 0.5),
                            ],
                            size: [*step_run, *step_rise],
                            rotation_deg: 0.0,
                            mirrored: false,
                            tags: tags.clone(),
                        }
                    })
                    .collect()
            }
            GeneratorSpec::Ramps {
                id,
                pos,
                length,
                angles_deg,
                align_base,
                gap,
                tags,
            } => angles_deg
                .iter()
                .enumerate()
                .map(|(index, angle)| {
                    let height = angle.to_radians().tan() * length;
                    let center_y = if *align_base {
                        pos[1] + height * 0.5
                    } else {
                        pos[1]
                    };
                    ResolvedSolid {
                        id: format!("{}/ramp_{:02}", id, index + 1),
                        kind: SolidKind::Ramp,
                        pos: [pos[0] + (length + gap) * index as f32, center_y],
                        size: [*length, height],
                        rotation_deg: 0.0,
                        mirrored: false,
                        tags: tags.clone(),
                    }
                })
                .collect(),
            GeneratorSpec::VPit {
                id,
                pos,
                span,
                angle_deg,
                thickness,
                tags,
            } => build_v_pit(id, *pos, *span, *angle_deg, *thickness, tags),
        }
    }
}

fn build_v_pit(
    id: &str,
    pos: [f32; 2],
    span: f32,
    angle_deg: f32,
    thickness: f32,
    tags: &[String],
) -> Vec<ResolvedSolid> {
    let angle = angle_deg.to_radians();
    let (sin, cos) = angle.sin_cos();
    let length = span / cos;
    let rise = span * angle.tan();
    let wall = |side: f32| {
        // Surface midpoint, then pushed back along the surface normal by half the thickness.
        let mid = [pos[0] + side * span * 0.5, pos[1] + rise * 0.5];
        let normal = [-side * sin, cos];
        ResolvedSolid {
            id: format!("{}/{}", id, if side < 0.0 { "left" } else { "right" }),
            kind: SolidKind::BoxRot,
            pos: [
                mid[0] - normal[0] * thickness * 0.5,
                mid[1] - normal[1] * thickness * 0.5,
            ],
            size: [length, thickness],
            rotation_deg: side * angle_deg,
            mirrored: false,
            tags: tags.to_vec(),
        }
    };
    vec![wall(-1.0), wall(1.0)]
}

fn insert_solid(world: &mut PhysicsWorld, solid: &ResolvedSolid) {
    let center = Vector::new(solid.pos[0], solid.pos[1]);
    let half = Vector::new(solid.size[0] * 0.5, solid.size[1] * 0.5);
    match solid.kind {
        SolidKind::Box | SolidKind::BoxRot => {
            world.insert_obstacle_box(center, half, solid.rotation_deg.to_radians());
        }
        SolidKind::Ramp => {
            let low = Point::from(center - half);
            let high = Point::from(center + half);
            if solid.mirrored {
                world.insert_obstacle_triangle(
                    Point::new(low.x, high.y),
                    low,
                    Point::new(high.x, low.y),
                );
            } else {
                world.insert_obstacle_triangle(low, Point::new(high.x, low.y), high);
            }
        }
    }
}

fn validate_solid(solid: &SolidSpec, validation: &mut TestMapValidation) {
    if solid.id.trim().is_empty() {
        validation
            .errors
            .push("solid id must not be empty".to_string());
    }
    if !vector_is_finite(solid.pos) {
        validation
            .errors
            .push(format!("solid '{}' has invalid pos", solid.id));
    }
    if let Some(size) = solid.effective_size() {
        if !vector_is_finite(size) || size.iter().any(|value| *value <= 0.0) {
            validation
                .errors
                .push(format!("solid '{}' has invalid size", solid.id));
        }
    } else {
        validation
            .errors
            .push(format!("solid '{}' missing size/length", solid.id));
    }
    match solid.kind {
        SolidKind::Ramp => {
            if let Some(angle) = solid.angle_deg {
                if angle <= 0.0 || angle >= 89.0 {
                    validation.errors.push(format!(
                        "solid '{}' ramp angle_deg must be between 0 and 89",
                        solid.id
                    ));
                }
            }
        }
        SolidKind::BoxRot => {
            if solid.rotation_deg.is_none() {
                validation.warnings.push(format!(
                    "solid '{}' is box_rot without rotation_deg",
                    solid.id
                ));
            }
        }
        SolidKind::Box => {
            if solid.rotation_deg.is_some() {
                validation.warnings.push(format!(
                    "solid '{}' rotation_deg ignored for box; use box_rot",
                    solid.id
                ));
            }
        }
    }
}

fn validate_generator(generator: &GeneratorSpec, validation: &mut TestMapValidation) {
    match generator {
        GeneratorSpec::Stairs {
            id,
            step_count,
            step_rise,
            step_run,
            ..
        } => {
            if id.trim().is_empty() {
                validation
                    .errors
                    .push("stairs generator id must not be empty".to_string());
            }
            if *step_count == 0 {
                validation
                    .errors
                    .push(format!("stairs '{}' step_count must be > 0", id));
            }
            if *step_rise <= 0.0 || *step_run <= 0.0 {
                validation
                    .errors
                    .push(format!("stairs '{}' dimensions must be > 0", id));
            }
        }
        GeneratorSpec::Ramps {
            id,
            length,
            angles_deg,
            gap,
            ..
        } => {
            if id.trim().is_empty() {
                validation
                    .errors
                    .push("ramps generator id must not be empty".to_string());
            }
            if *length <= 0.0 {
                validation
                    .errors
                    .push(format!("ramps '{}' length must be > 0", id));
            }
            if *gap < 0.0 {
                validation
                    .errors
                    .push(format!("ramps '{}' gap must be >= 0", id));
            }
            if angles_deg.is_empty() {
                validation
                    .errors
                    .push(format!("ramps '{}' angles_deg must not be empty", id));
            }
            if angles_deg
                .iter()
                .any(|angle| *angle <= 0.0 || *angle >= 89.0)
            {
                validation
                    .errors
                    .push(format!("ramps '{}' angle out of range", id));
            }
        }
        GeneratorSpec::VPit {
            id,
            span,
            angle_deg,
            thickness,
            ..
        } => {
            if id.trim().is_empty() {
                validation
                    .errors
                    .push("v_pit generator id must not be empty".to_string());
            }
            if *span <= 0.0 || *thickness <= 0.0 {
                validation
                    .errors
                    .push(format!("v_pit '{}' dimensions must be > 0", id));
            }
            if *angle_deg <= 0.0 || *angle_deg >= 89.0 {
                validation
                    .errors
                    .push(format!("v_pit '{}' angle_deg must be between 0 and 89", id));
            }
        }
    }
}

fn vector_is_finite(value: [f32; 2]) -> bool {
    value.iter().all(|component| component.is_finite())
}

fn default_wall_thickness() -> f32 {
    0.5
}

fn default_pad_up() -> [f32; 2] {
    [0.0, 1.0]
}
