//! Attribute values and time-sampled attributes.

use strata_math::{DMat4, DVec2, DVec3, DVec4};

/// A resolved attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `string`, `token` and `asset` values
    String(String),
    Vec2(DVec2),
    Vec3(DVec3),
    Vec4(DVec4),
    Matrix(DMat4),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StringArray(Vec<String>),
    Vec2Array(Vec<DVec2>),
    Vec3Array(Vec<DVec3>),
    Vec4Array(Vec<DVec4>),
    MatrixArray(Vec<DMat4>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<DVec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            // single-element arrays show up for constant primvars
            Value::Vec3Array(a) if a.len() == 1 => Some(a[0]),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<DMat4> {
        match self {
            Value::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::IntArray(_)
                | Value::FloatArray(_)
                | Value::StringArray(_)
                | Value::Vec2Array(_)
                | Value::Vec3Array(_)
                | Value::Vec4Array(_)
                | Value::MatrixArray(_)
        )
    }

    /// Linear interpolation towards `other`. Values that cannot be blended
    /// (strings, mismatched types or array lengths) hold the left sample.
    pub fn lerp(&self, other: &Value, t: f64) -> Value {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * t),
            (Value::Vec2(a), Value::Vec2(b)) => Value::Vec2(a.lerp(*b, t)),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(a.lerp(*b, t)),
            (Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(a.lerp(*b, t)),
            (Value::FloatArray(a), Value::FloatArray(b)) if a.len() == b.len() => {
                Value::FloatArray(a.iter().zip(b).map(|(x, y)| x + (y - x) * t).collect())
            }
            (Value::Vec3Array(a), Value::Vec3Array(b)) if a.len() == b.len() => {
                Value::Vec3Array(a.iter().zip(b).map(|(x, y)| x.lerp(*y, t)).collect())
            }
            _ => self.clone(),
        }
    }
}

/// A composed attribute: default value, time samples and connections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attribute {
    /// Full namespaced name (e.g. `primvars:displayColor`)
    pub name: String,

    /// Declared type name without the array suffix (e.g. `color3f`)
    pub type_name: String,

    /// Whether the declaration carried `[]`
    pub is_array: bool,

    /// Default (non time-sampled) value
    pub default: Option<Value>,

    /// Time samples sorted by time
    pub samples: Vec<(f64, Value)>,

    /// Connection targets as property paths (e.g. `/Mat/Tex.outputs:rgb`)
    pub connections: Vec<String>,

    /// `interpolation` metadata, only meaningful for primvars
    pub interpolation: Option<String>,
}

impl Attribute {
    /// Namespace part of the name (`primvars` for `primvars:displayColor`).
    pub fn namespace(&self) -> &str {
        match self.name.rfind(':') {
            Some(pos) => &self.name[..pos],
            None => "",
        }
    }

    /// Last component of the name (`displayColor` for `primvars:displayColor`).
    pub fn base_name(&self) -> &str {
        match self.name.rfind(':') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    pub fn has_authored_value(&self) -> bool {
        self.default.is_some() || !self.samples.is_empty()
    }

    pub fn has_authored_connections(&self) -> bool {
        !self.connections.is_empty()
    }

    /// More than one time sample means the value can change over time.
    pub fn might_be_time_varying(&self) -> bool {
        self.samples.len() > 1
    }

    /// Value at `time`. Time samples win over the default value; times
    /// outside the sampled range hold the nearest sample.
    pub fn get(&self, time: f64) -> Option<Value> {
        if self.samples.is_empty() {
            return self.default.clone();
        }

        let first = &self.samples[0];
        if time <= first.0 {
            return Some(first.1.clone());
        }
        let last = &self.samples[self.samples.len() - 1];
        if time >= last.0 {
            return Some(last.1.clone());
        }

        let upper = self.samples.partition_point(|(t, _)| *t <= time);
        let (t0, v0) = &self.samples[upper - 1];
        let (t1, v1) = &self.samples[upper];
        if *t0 == time {
            return Some(v0.clone());
        }
        Some(v0.lerp(v1, (time - t0) / (t1 - t0)))
    }

    /// Sample times strictly inside `(start, end)`.
    pub fn samples_in_open_interval(&self, start: f64, end: f64) -> impl Iterator<Item = f64> + '_ {
        self.samples
            .iter()
            .map(|(t, _)| *t)
            .filter(move |t| *t > start && *t < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animated() -> Attribute {
        Attribute {
            name: "xformOp:translate".to_string(),
            type_name: "double3".to_string(),
            samples: vec![
                (0.0, Value::Vec3(DVec3::ZERO)),
                (10.0, Value::Vec3(DVec3::new(10.0, 0.0, 0.0))),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_namespace_and_base_name() {
        let attr = Attribute {
            name: "primvars:arnold:subdiv_type".to_string(),
            ..Default::default()
        };
        assert_eq!(attr.namespace(), "primvars:arnold");
        assert_eq!(attr.base_name(), "subdiv_type");

        let plain = Attribute {
            name: "radius".to_string(),
            ..Default::default()
        };
        assert_eq!(plain.namespace(), "");
        assert_eq!(plain.base_name(), "radius");
    }

    #[test]
    fn test_samples_interpolate_and_hold() {
        let attr = animated();

        assert_eq!(attr.get(-5.0), Some(Value::Vec3(DVec3::ZERO)));
        assert_eq!(attr.get(5.0), Some(Value::Vec3(DVec3::new(5.0, 0.0, 0.0))));
        assert_eq!(attr.get(20.0), Some(Value::Vec3(DVec3::new(10.0, 0.0, 0.0))));
        assert!(attr.might_be_time_varying());
    }

    #[test]
    fn test_samples_win_over_default() {
        let mut attr = animated();
        attr.default = Some(Value::Vec3(DVec3::ONE));
        assert_eq!(attr.get(0.0), Some(Value::Vec3(DVec3::ZERO)));
    }

    #[test]
    fn test_open_interval_excludes_bounds() {
        let mut attr = animated();
        attr.samples.insert(1, (5.0, Value::Vec3(DVec3::ONE)));

        let inside: Vec<f64> = attr.samples_in_open_interval(0.0, 10.0).collect();
        assert_eq!(inside, vec![5.0]);
    }

    #[test]
    fn test_strings_hold() {
        let a = Value::String("a".to_string());
        let b = Value::String("b".to_string());
        assert_eq!(a.lerp(&b, 0.9), a);
    }
}
