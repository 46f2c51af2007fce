//! Uniform values and the per-program upload cache.
//!
//! [`UniformCache`] remembers, for every `(program, name)` pair, where the
//! uniform lives and which value was pushed last. A value that compares equal to
//! the cached one never reaches the device. Names the program does not expose
//! are remembered as absent and skipped silently from then on.

use std::collections::HashMap;

use cgmath::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

use crate::gpu::{GpuDevice, ProgramId, UniformLocation};

/// A value that can be pushed to a shader uniform.
///
/// The variant fixes the upload arity, so dispatch onto the device is an
/// exhaustive `match` instead of a guess based on array length.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat3([f32; 9]),
    /// Column-major.
    Mat4([f32; 16]),
    Int(i32),
    IntArray(Vec<i32>),
}

impl UniformValue {
    /// Push the value through the device upload matching its arity.
    pub fn upload(&self, device: &dyn GpuDevice, location: UniformLocation) {
        match self {
            UniformValue::Float(v) => device.uniform_1f(location, *v),
            UniformValue::Vec2(v) => device.uniform_2f(location, *v),
            UniformValue::Vec3(v) => device.uniform_3f(location, *v),
            UniformValue::Vec4(v) => device.uniform_4f(location, *v),
            UniformValue::Mat3(v) => device.uniform_matrix3(location, v),
            UniformValue::Mat4(v) => device.uniform_matrix4(location, v),
            UniformValue::Int(v) => device.uniform_1i(location, *v),
            UniformValue::IntArray(v) => device.uniform_1iv(location, v),
        }
    }

    /// Number of scalar components.
    pub fn arity(&self) -> usize {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) => 1,
            UniformValue::Vec2(_) => 2,
            UniformValue::Vec3(_) => 3,
            UniformValue::Vec4(_) => 4,
            UniformValue::Mat3(_) => 9,
            UniformValue::Mat4(_) => 16,
            UniformValue::IntArray(v) => v.len(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(v: [f32; 9]) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(v: [f32; 16]) -> Self {
        UniformValue::Mat4(v)
    }
}

impl From<Vec<i32>> for UniformValue {
    fn from(v: Vec<i32>) -> Self {
        UniformValue::IntArray(v)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v.into())
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v.into())
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(m: Matrix3<f32>) -> Self {
        let cols: [[f32; 3]; 3] = m.into();
        let mut flat = [0.0; 9];
        for (i, col) in cols.iter().enumerate() {
            flat[i * 3..i * 3 + 3].copy_from_slice(col);
        }
        UniformValue::Mat3(flat)
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(m: Matrix4<f32>) -> Self {
        let cols: [[f32; 4]; 4] = m.into();
        let mut flat = [0.0; 16];
        for (i, col) in cols.iter().enumerate() {
            flat[i * 4..i * 4 + 4].copy_from_slice(col);
        }
        UniformValue::Mat4(flat)
    }
}

/// Outcome of [`UniformCache::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformUpload {
    /// The value reached the device.
    Uploaded,
    /// The device already holds this value.
    Unchanged,
    /// The program has no such uniform.
    Absent,
}

/// Upload counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformStats {
    pub uploads: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct ProgramUniforms {
    locations: HashMap<String, Option<UniformLocation>>,
    values: HashMap<String, UniformValue>,
}

/// Per-program memory of uniform locations and last uploaded values.
#[derive(Debug, Default)]
pub struct UniformCache {
    programs: HashMap<ProgramId, ProgramUniforms>,
    stats: UniformStats,
}

impl UniformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `value` to `name` on `program` unless the device already holds it.
    ///
    /// `program` must be the program currently in use on `device`.
    pub fn apply(
        &mut self,
        device: &dyn GpuDevice,
        program: ProgramId,
        name: &str,
        value: &UniformValue,
    ) -> UniformUpload {
        let entry = self.programs.entry(program).or_default();

        let location = match entry.locations.get(name) {
            Some(location) => *location,
            None => {
                let location = device.uniform_location(program, name);
                if location.is_none() {
                    log::debug!("uniform {name} is not used by program {program}");
                }
                entry.locations.insert(name.to_owned(), location);
                location
            }
        };
        let Some(location) = location else {
            return UniformUpload::Absent;
        };

        match entry.values.get_mut(name) {
            Some(previous) if previous == value => {
                self.stats.skipped += 1;
                UniformUpload::Unchanged
            }
            Some(previous) => {
                value.upload(device, location);
                *previous = value.clone();
                self.stats.uploads += 1;
                UniformUpload::Uploaded
            }
            None => {
                value.upload(device, location);
                entry.values.insert(name.to_owned(), value.clone());
                self.stats.uploads += 1;
                UniformUpload::Uploaded
            }
        }
    }

    /// The value last uploaded for `name` on `program`.
    pub fn cached(&self, program: ProgramId, name: &str) -> Option<&UniformValue> {
        self.programs.get(&program)?.values.get(name)
    }

    /// Forget everything about `program`; the next uploads always reach the
    /// device. Needed whenever the device state may have diverged, e.g. after
    /// the program was deleted and its id handed out again.
    pub fn invalidate(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            log::debug!("invalidated uniform cache of program {program}");
        }
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }

    pub fn stats(&self) -> UniformStats {
        self.stats
    }
}
