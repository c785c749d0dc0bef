/*!
# Model specifications

A [`ModelSpec`] is the immutable description of a statistical model: its
parameters (each with a [`Domain`] and a [`Shape`]), the schema of the data
it conditions on, cross-field data constraints, the joint log-density and
any generated quantities derived from a draw after sampling.

Specs are assembled with [`ModelSpec::builder`]; `build` rejects
contradictory bounds, duplicate names, sizes that refer to unknown data
fields and log-densities that reference undeclared names.

## Example

```rust
use posterior_pipeline::dataset::Dataset;
use posterior_pipeline::model::{DataDecl, LogDensity, ModelSpec, ParamDecl, Params, Shape};
use posterior_pipeline::transform::Domain;

struct Coin;

impl LogDensity for Coin {
    fn parameters(&self) -> &[&str] {
        &["p"]
    }
    fn data_fields(&self) -> &[&str] {
        &["heads", "flips"]
    }
    fn log_density(&self, params: &Params<'_>, data: &Dataset) -> f64 {
        let p = params.scalar("p");
        let heads = data.int("heads").unwrap_or(0) as f64;
        let flips = data.int("flips").unwrap_or(0) as f64;
        heads * p.ln() + (flips - heads) * (1.0 - p).ln()
    }
}

let spec = ModelSpec::builder("coin")
    .data(DataDecl::int("flips", Shape::Scalar).with_lower(0.0))
    .data(DataDecl::int("heads", Shape::Scalar).with_lower(0.0))
    .param(ParamDecl::scalar("p", Domain::interval(0.0, 1.0)))
    .density(Coin)
    .build()
    .unwrap();

let data = Dataset::new().with_int("flips", 10).with_int("heads", 7);
assert!(spec.validate(&data).is_ok());
```
*/

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::dataset::{DataValue, Dataset};
use crate::error::{SchemaError, ValidationError};
pub use crate::transform::Domain;

/// Length of one axis of a parameter or data field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extent {
    Fixed(usize),
    /// Sized by an integer scalar data field.
    Data(String),
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extent::Fixed(n) => write!(f, "{n}"),
            Extent::Data(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Extent {
    fn from(n: usize) -> Self {
        Extent::Fixed(n)
    }
}

impl From<&str> for Extent {
    fn from(name: &str) -> Self {
        Extent::Data(name.to_string())
    }
}

/// Shape of a parameter, data field or generated quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vector(Extent),
    /// Row-major `rows × cols`.
    Matrix(Extent, Extent),
}

impl Shape {
    pub fn vector(n: impl Into<Extent>) -> Self {
        Shape::Vector(n.into())
    }

    pub fn matrix(rows: impl Into<Extent>, cols: impl Into<Extent>) -> Self {
        Shape::Matrix(rows.into(), cols.into())
    }

    fn extents(&self) -> Vec<&Extent> {
        match self {
            Shape::Scalar => vec![],
            Shape::Vector(n) => vec![n],
            Shape::Matrix(r, c) => vec![r, c],
        }
    }

    /// Resolves data-sized extents against `data`.
    fn resolve(&self, data: &Dataset) -> Option<ResolvedShape> {
        let extent = |e: &Extent| match e {
            Extent::Fixed(n) => Some(*n),
            Extent::Data(name) => data.int(name).and_then(|v| usize::try_from(v).ok()),
        };
        Some(match self {
            Shape::Scalar => ResolvedShape::Scalar,
            Shape::Vector(n) => ResolvedShape::Vector(extent(n)?),
            Shape::Matrix(r, c) => ResolvedShape::Matrix(extent(r)?, extent(c)?),
        })
    }
}

/// A [`Shape`] with concrete extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedShape {
    Scalar,
    Vector(usize),
    Matrix(usize, usize),
}

impl ResolvedShape {
    pub fn len(&self) -> usize {
        match *self {
            ResolvedShape::Scalar => 1,
            ResolvedShape::Vector(n) => n,
            ResolvedShape::Matrix(r, c) => r * c,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display name of flat component `i` of `name`: `theta[3]`, `y[1,2]`.
    pub fn component_name(&self, name: &str, i: usize) -> String {
        match *self {
            ResolvedShape::Scalar => name.to_string(),
            ResolvedShape::Vector(_) => format!("{name}[{i}]"),
            ResolvedShape::Matrix(_, c) => format!("{name}[{},{}]", i / c, i % c),
        }
    }
}

/// A declared model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub domain: Domain,
    pub shape: Shape,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, domain: Domain, shape: Shape) -> Self {
        Self {
            name: name.into(),
            domain,
            shape,
        }
    }

    pub fn scalar(name: impl Into<String>, domain: Domain) -> Self {
        Self::new(name, domain, Shape::Scalar)
    }

    pub fn vector(name: impl Into<String>, n: impl Into<Extent>, domain: Domain) -> Self {
        Self::new(name, domain, Shape::vector(n))
    }
}

/// Element type of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Int,
    Real,
}

/// A declared data field.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl {
    pub name: String,
    pub kind: DataKind,
    pub shape: Shape,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl DataDecl {
    pub fn int(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            kind: DataKind::Int,
            shape,
            lower: None,
            upper: None,
        }
    }

    pub fn real(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            kind: DataKind::Real,
            ..Self::int(name, shape)
        }
    }

    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }
}

/// A constraint relating two data fields of the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataConstraint {
    /// `lhs[i] <= rhs[i]` for every `i`.
    ElementwiseLe { lhs: String, rhs: String },
}

impl DataConstraint {
    pub fn le(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        DataConstraint::ElementwiseLe {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    fn fields(&self) -> [&str; 2] {
        match self {
            DataConstraint::ElementwiseLe { lhs, rhs } => [lhs.as_str(), rhs.as_str()],
        }
    }
}

/// The unnormalised log-posterior of a model.
///
/// Implementations must be pure and deterministic: chains call them
/// concurrently with their own parameter values and a shared dataset.
/// Parameters are always passed on their constrained scale.
pub trait LogDensity: Send + Sync {
    /// Parameters the density reads.
    fn parameters(&self) -> &[&str];

    /// Data fields the density reads.
    fn data_fields(&self) -> &[&str];

    /// Joint log-density, up to an additive constant.
    fn log_density(&self, params: &Params<'_>, data: &Dataset) -> f64;

    /// All terms of the log-density that depend on component `index` of
    /// `param`. Component-wise samplers only need differences of this value,
    /// so dropping terms that do not involve the component is allowed.
    fn conditional_log_density(
        &self,
        params: &Params<'_>,
        data: &Dataset,
        param: &str,
        index: usize,
    ) -> f64 {
        let _ = (param, index);
        self.log_density(params, data)
    }
}

type DeriveFn = dyn Fn(&Params<'_>, &Dataset, &mut [f64]) + Send + Sync;

/// A named quantity derived from one draw after sampling.
#[derive(Clone)]
pub struct GeneratedQuantity {
    pub name: String,
    pub shape: Shape,
    derive: Arc<DeriveFn>,
}

impl GeneratedQuantity {
    /// `derive` writes the quantity for one draw into a buffer of the
    /// resolved length of `shape`.
    pub fn new<F>(name: impl Into<String>, shape: Shape, derive: F) -> Self
    where
        F: Fn(&Params<'_>, &Dataset, &mut [f64]) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            shape,
            derive: Arc::new(derive),
        }
    }

    pub fn compute(&self, params: &Params<'_>, data: &Dataset, out: &mut [f64]) {
        (self.derive)(params, data, out)
    }
}

impl fmt::Debug for GeneratedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedQuantity")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Immutable description of a model. Cheap to clone.
#[derive(Clone)]
pub struct ModelSpec {
    name: String,
    params: Vec<ParamDecl>,
    data: Vec<DataDecl>,
    constraints: Vec<DataConstraint>,
    density: Arc<dyn LogDensity>,
    generated: Vec<GeneratedQuantity>,
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("constraints", &self.constraints)
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

/// Collects declarations for a [`ModelSpec`].
#[derive(Default)]
pub struct ModelSpecBuilder {
    name: String,
    params: Vec<ParamDecl>,
    data: Vec<DataDecl>,
    constraints: Vec<DataConstraint>,
    density: Option<Arc<dyn LogDensity>>,
    generated: Vec<GeneratedQuantity>,
}

impl ModelSpecBuilder {
    pub fn param(mut self, decl: ParamDecl) -> Self {
        self.params.push(decl);
        self
    }

    pub fn data(mut self, decl: DataDecl) -> Self {
        self.data.push(decl);
        self
    }

    pub fn constraint(mut self, constraint: DataConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn density(mut self, density: impl LogDensity + 'static) -> Self {
        self.density = Some(Arc::new(density));
        self
    }

    pub fn generated(mut self, quantity: GeneratedQuantity) -> Self {
        self.generated.push(quantity);
        self
    }

    pub fn build(self) -> Result<ModelSpec, SchemaError> {
        let density = self
            .density
            .ok_or_else(|| SchemaError::MissingDensity(self.name.clone()))?;

        let mut names = HashSet::new();
        let all_names = self
            .params
            .iter()
            .map(|p| &p.name)
            .chain(self.data.iter().map(|d| &d.name))
            .chain(self.generated.iter().map(|g| &g.name));
        for name in all_names {
            if !names.insert(name.as_str()) {
                return Err(SchemaError::DuplicateName(name.clone()));
            }
        }

        for p in &self.params {
            check_domain(&p.name, &p.domain)?;
        }
        for d in &self.data {
            check_data_bounds(d)?;
        }

        let int_scalars: HashSet<&str> = self
            .data
            .iter()
            .filter(|d| d.kind == DataKind::Int && d.shape == Shape::Scalar)
            .map(|d| d.name.as_str())
            .collect();
        let sized = self
            .params
            .iter()
            .map(|p| (&p.name, &p.shape))
            .chain(self.data.iter().map(|d| (&d.name, &d.shape)))
            .chain(self.generated.iter().map(|g| (&g.name, &g.shape)));
        for (owner, shape) in sized {
            for extent in shape.extents() {
                if let Extent::Data(field) = extent {
                    if !int_scalars.contains(field.as_str()) {
                        return Err(SchemaError::InvalidExtent {
                            declared_by: owner.clone(),
                            extent: field.clone(),
                        });
                    }
                }
            }
        }

        let param_names: HashSet<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        let data_names: HashSet<&str> = self.data.iter().map(|d| d.name.as_str()).collect();
        let density_owner = format!("log-density of model `{}`", self.name);
        for name in density.parameters() {
            if !param_names.contains(name) {
                return Err(SchemaError::UndeclaredReference {
                    owner: density_owner,
                    kind: "parameter",
                    name: name.to_string(),
                });
            }
        }
        for name in density.data_fields() {
            if !data_names.contains(name) {
                return Err(SchemaError::UndeclaredReference {
                    owner: density_owner,
                    kind: "data field",
                    name: name.to_string(),
                });
            }
        }
        for constraint in &self.constraints {
            for field in constraint.fields() {
                if !data_names.contains(field) {
                    return Err(SchemaError::UndeclaredReference {
                        owner: "data constraint".to_string(),
                        kind: "data field",
                        name: field.to_string(),
                    });
                }
            }
        }

        Ok(ModelSpec {
            name: self.name,
            params: self.params,
            data: self.data,
            constraints: self.constraints,
            density,
            generated: self.generated,
        })
    }
}

fn check_domain(name: &str, domain: &Domain) -> Result<(), SchemaError> {
    let (lower, upper) = domain.bounds();
    if lower.is_nan() || upper.is_nan() {
        return Err(SchemaError::NanBound {
            name: name.to_string(),
        });
    }
    if lower >= upper || lower == f64::INFINITY || upper == f64::NEG_INFINITY {
        return Err(SchemaError::ContradictoryBounds {
            name: name.to_string(),
            lower,
            upper,
        });
    }
    Ok(())
}

fn check_data_bounds(decl: &DataDecl) -> Result<(), SchemaError> {
    if decl.lower.is_some_and(f64::is_nan) || decl.upper.is_some_and(f64::is_nan) {
        return Err(SchemaError::NanBound {
            name: decl.name.clone(),
        });
    }
    if let (Some(lower), Some(upper)) = (decl.lower, decl.upper) {
        if lower > upper {
            return Err(SchemaError::ContradictoryDataBounds {
                name: decl.name.clone(),
                lower,
                upper,
            });
        }
    }
    Ok(())
}

impl ModelSpec {
    pub fn builder(name: impl Into<String>) -> ModelSpecBuilder {
        ModelSpecBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    pub fn data_schema(&self) -> &[DataDecl] {
        &self.data
    }

    pub fn constraints(&self) -> &[DataConstraint] {
        &self.constraints
    }

    pub fn generated(&self) -> &[GeneratedQuantity] {
        &self.generated
    }

    pub fn density(&self) -> &dyn LogDensity {
        self.density.as_ref()
    }

    /// Checks `data` against the declared schema and constraints.
    pub fn validate(&self, data: &Dataset) -> Result<(), ValidationError> {
        // Extents first: every other shape check depends on them.
        for decl in &self.data {
            if decl.kind == DataKind::Int && decl.shape == Shape::Scalar {
                if let Some(v) = data.int(&decl.name) {
                    if v < 0 && self.is_extent(&decl.name) {
                        return Err(ValidationError::NegativeExtent {
                            field: decl.name.clone(),
                            value: v,
                        });
                    }
                }
            }
        }

        for decl in &self.data {
            let value = data
                .get(&decl.name)
                .ok_or_else(|| ValidationError::MissingField(decl.name.clone()))?;
            check_kind(decl, value)?;

            let shape = decl
                .shape
                .resolve(data)
                .ok_or_else(|| ValidationError::TypeMismatch {
                    field: decl.name.clone(),
                    expected: "sized",
                })?;
            if value.len() != shape.len() {
                return Err(ValidationError::ShapeMismatch {
                    field: decl.name.clone(),
                    expected: shape.len(),
                    found: value.len(),
                });
            }

            for index in 0..value.len() {
                let x = value.get_f64(index).unwrap_or(f64::NAN);
                if !x.is_finite() {
                    return Err(ValidationError::NonFinite {
                        field: decl.name.clone(),
                        index,
                        value: x,
                    });
                }
                if let Some(bound) = decl.lower.filter(|b| x < *b) {
                    return Err(ValidationError::BelowLower {
                        field: decl.name.clone(),
                        index,
                        value: x,
                        bound,
                    });
                }
                if let Some(bound) = decl.upper.filter(|b| x > *b) {
                    return Err(ValidationError::AboveUpper {
                        field: decl.name.clone(),
                        index,
                        value: x,
                        bound,
                    });
                }
            }
        }

        for constraint in &self.constraints {
            match constraint {
                DataConstraint::ElementwiseLe { lhs, rhs } => check_le(data, lhs, rhs)?,
            }
        }

        for name in data.names() {
            if !self.data.iter().any(|d| d.name == name) {
                log::debug!("model `{}` ignores data field `{name}`", self.name);
            }
        }
        Ok(())
    }

    fn is_extent(&self, field: &str) -> bool {
        let target = Extent::Data(field.to_string());
        self.params
            .iter()
            .map(|p| &p.shape)
            .chain(self.data.iter().map(|d| &d.shape))
            .chain(self.generated.iter().map(|g| &g.shape))
            .any(|shape| shape.extents().contains(&&target))
    }

    /// Resolves parameter and generated-quantity shapes for `data`.
    pub fn layout(&self, data: &Dataset) -> Result<ParamLayout, ValidationError> {
        let resolve = |name: &str, shape: &Shape| {
            shape
                .resolve(data)
                .ok_or_else(|| ValidationError::TypeMismatch {
                    field: name.to_string(),
                    expected: "sized",
                })
        };

        let mut entries = Vec::with_capacity(self.params.len());
        let mut offset = 0;
        for p in &self.params {
            let shape = resolve(&p.name, &p.shape)?;
            entries.push(LayoutEntry {
                name: p.name.clone(),
                domain: p.domain,
                shape,
                offset,
            });
            offset += shape.len();
        }

        let mut generated = Vec::with_capacity(self.generated.len());
        let mut gen_offset = 0;
        for g in &self.generated {
            let shape = resolve(&g.name, &g.shape)?;
            generated.push(LayoutEntry {
                name: g.name.clone(),
                domain: Domain::Real,
                shape,
                offset: gen_offset,
            });
            gen_offset += shape.len();
        }

        Ok(ParamLayout::new(entries, offset, generated, gen_offset))
    }

    /// Joint log-density at constrained `values` laid out by `layout`.
    pub fn log_density(&self, layout: &ParamLayout, values: &[f64], data: &Dataset) -> f64 {
        self.density.log_density(&Params::new(layout, values), data)
    }
}

fn check_kind(decl: &DataDecl, value: &DataValue) -> Result<(), ValidationError> {
    let scalar = decl.shape == Shape::Scalar;
    let ok = match (decl.kind, value) {
        (DataKind::Int, DataValue::Int(_)) => scalar,
        (DataKind::Int, DataValue::Ints(_)) => !scalar,
        (DataKind::Real, DataValue::Int(_) | DataValue::Real(_)) => scalar,
        (DataKind::Real, DataValue::Reals(_)) => !scalar,
        // Integer arrays (including `[]`) are valid real arrays.
        (DataKind::Real, DataValue::Ints(_)) => !scalar,
        _ => false,
    };
    if ok {
        return Ok(());
    }
    let expected = match (decl.kind, scalar) {
        (DataKind::Int, true) => "a single integer",
        (DataKind::Int, false) => "an integer array",
        (DataKind::Real, true) => "a single real",
        (DataKind::Real, false) => "a real array",
    };
    Err(ValidationError::TypeMismatch {
        field: decl.name.clone(),
        expected,
    })
}

fn check_le(data: &Dataset, lhs: &str, rhs: &str) -> Result<(), ValidationError> {
    let (Some(a), Some(b)) = (data.get(lhs), data.get(rhs)) else {
        let missing = if data.contains(lhs) { rhs } else { lhs };
        return Err(ValidationError::MissingField(missing.to_string()));
    };
    if a.len() != b.len() {
        return Err(ValidationError::ShapeMismatch {
            field: lhs.to_string(),
            expected: b.len(),
            found: a.len(),
        });
    }
    for index in 0..a.len() {
        let (x, bound) = (
            a.get_f64(index).unwrap_or(f64::NAN),
            b.get_f64(index).unwrap_or(f64::NAN),
        );
        if !(x <= bound) {
            return Err(ValidationError::ConstraintViolated {
                field: lhs.to_string(),
                bound_field: rhs.to_string(),
                index,
                value: x,
                bound,
            });
        }
    }
    Ok(())
}

/// Where one parameter (or generated quantity) lives in a flat draw.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub name: String,
    pub domain: Domain,
    pub shape: ResolvedShape,
    pub offset: usize,
}

impl LayoutEntry {
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// Flat layout of a model's parameters for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    entries: Vec<LayoutEntry>,
    by_name: HashMap<String, usize>,
    /// `(entry, component)` for every flat coordinate.
    coords: Vec<(usize, usize)>,
    dim: usize,
    generated: Vec<LayoutEntry>,
    generated_dim: usize,
}

impl ParamLayout {
    fn new(
        entries: Vec<LayoutEntry>,
        dim: usize,
        generated: Vec<LayoutEntry>,
        generated_dim: usize,
    ) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        let coords = entries
            .iter()
            .enumerate()
            .flat_map(|(i, e)| (0..e.len()).map(move |c| (i, c)))
            .collect();
        Self {
            entries,
            by_name,
            coords,
            dim,
            generated,
            generated_dim,
        }
    }

    /// Number of scalar parameter components.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&LayoutEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Parameter entry and component index of flat coordinate `coord`.
    pub fn locate(&self, coord: usize) -> (&LayoutEntry, usize) {
        let (entry, component) = self.coords[coord];
        (&self.entries[entry], component)
    }

    /// Domain of flat coordinate `coord`.
    pub fn domain(&self, coord: usize) -> Domain {
        self.locate(coord).0.domain
    }

    /// Names of every scalar parameter component, in flat order.
    pub fn component_names(&self) -> Vec<String> {
        component_names(&self.entries)
    }

    pub fn generated_entries(&self) -> &[LayoutEntry] {
        &self.generated
    }

    pub fn generated_entry(&self, name: &str) -> Option<&LayoutEntry> {
        self.generated.iter().find(|e| e.name == name)
    }

    pub fn generated_dim(&self) -> usize {
        self.generated_dim
    }

    pub fn generated_component_names(&self) -> Vec<String> {
        component_names(&self.generated)
    }
}

fn component_names(entries: &[LayoutEntry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| (0..e.len()).map(move |i| e.shape.component_name(&e.name, i)))
        .collect()
}

/// Read-only, name-addressed view of one draw's parameter values.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    layout: &'a ParamLayout,
    values: &'a [f64],
}

impl<'a> Params<'a> {
    pub fn new(layout: &'a ParamLayout, values: &'a [f64]) -> Self {
        Self { layout, values }
    }

    /// All components of `name`; empty if `name` is not a parameter.
    pub fn get(&self, name: &str) -> &'a [f64] {
        match self.layout.entry(name) {
            Some(e) => &self.values[e.range()],
            None => &[],
        }
    }

    /// First component of `name`, or NaN if `name` is not a parameter.
    pub fn scalar(&self, name: &str) -> f64 {
        self.get(name).first().copied().unwrap_or(f64::NAN)
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn layout(&self) -> &'a ParamLayout {
        self.layout
    }
}
