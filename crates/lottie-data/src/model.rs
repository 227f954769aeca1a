use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LottieJson {
    pub v: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    pub ip: f64,
    pub op: f64,
    pub fr: f64,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub ddd: u8,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8, // 0 = precomp, 4 = shape
    #[serde(default)]
    pub ind: u32,
    #[serde(default)]
    pub ddd: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f64,
    #[serde(default)]
    pub op: f64,
    #[serde(default)]
    pub st: f64,
    #[serde(default = "default_one")]
    pub sr: f64, // Time stretch
    #[serde(default)]
    pub ao: u8, // Auto orient
    #[serde(default)]
    pub bm: u8, // Blend mode
    #[serde(default)]
    pub ks: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tm: Option<Property<f64>>, // Time remap (precomp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd: Option<bool>,

    // Type specific
    #[serde(default, rename = "refId", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>, // PreComp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>, // PreComp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>, // PreComp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapes: Option<Vec<Shape>>, // Shape layer
}

fn default_one() -> f64 {
    1.0
}

impl Layer {
    /// An empty layer of the given type spanning `[ip, op]`.
    pub fn new(ty: u8, ind: u32, ip: f64, op: f64) -> Self {
        Layer {
            ty,
            ind,
            ddd: 0,
            nm: None,
            ip,
            op,
            st: 0.0,
            sr: 1.0,
            ao: 0,
            bm: 0,
            ks: Transform::default(),
            tm: None,
            hd: None,
            ref_id: None,
            w: None,
            h: None,
            shapes: None,
        }
    }
}

// Shapes

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub np: u32, // Number of properties
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub d: u8, // Direction
    pub s: Property<Vec<f64>>,
    pub p: Property<Vec<f64>>,
    pub r: Property<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub d: u8,
    pub s: Property<Vec<f64>>,
    pub p: Property<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    pub c: Property<Vec<f64>>,
    pub o: Property<f64>,
    #[serde(default = "default_fill_rule")]
    pub r: u8, // 1 = non-zero, 2 = even-odd
}

fn default_fill_rule() -> u8 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub ind: u32,
    pub ks: Property<BezierPath>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transform {
    #[serde(default = "zero_vector")]
    pub a: Property<Vec<f64>>, // Anchor
    #[serde(default = "zero_vector")]
    pub p: Property<Vec<f64>>, // Position
    #[serde(default = "full_scale")]
    pub s: Property<Vec<f64>>, // Scale in percent
    #[serde(default, alias = "rz")]
    pub r: Property<f64>, // Rotation in degrees, clockwise
    #[serde(default = "full_opacity")]
    pub o: Property<f64>, // Opacity in percent
}

fn zero_vector() -> Property<Vec<f64>> {
    Property::fixed(vec![0.0, 0.0, 0.0])
}

fn full_scale() -> Property<Vec<f64>> {
    Property::fixed(vec![100.0, 100.0, 100.0])
}

fn full_opacity() -> Property<f64> {
    Property::fixed(100.0)
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            a: zero_vector(),
            p: zero_vector(),
            s: full_scale(),
            r: Property::fixed(0.0),
            o: full_opacity(),
        }
    }
}

/// Marks how a keyframe value sits inside `s`/`e`.
///
/// Scalars and shapes are written wrapped in a one element array
/// (`"s": [12.5]`), multi-dimensional values are written as they are
/// (`"s": [10, 20]`).
pub trait KeyframeValue {
    fn is_wrapped() -> bool {
        true
    }
}

impl KeyframeValue for f64 {}
impl KeyframeValue for BezierPath {}
impl KeyframeValue for Vec<f64> {
    fn is_wrapped() -> bool {
        false
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(
    serialize = "T: Serialize + KeyframeValue",
    deserialize = "T: DeserializeOwned"
))]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    pub k: Value<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ix: Option<u32>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
        }
    }
}

impl<T> Property<T> {
    /// A non-animated property, `{"a": 0, "k": v}`.
    pub fn fixed(value: T) -> Self {
        Property {
            a: 0,
            k: Value::Static(value),
            ix: None,
        }
    }

    /// An animated property, `{"a": 1, "k": [...]}`.
    pub fn animated(keyframes: Vec<Keyframe<T>>) -> Self {
        Property {
            a: 1,
            k: Value::Animated(keyframes),
            ix: None,
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self.k, Value::Animated(_))
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        match &self.k {
            Value::Animated(kfs) => kfs,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<T: Serialize + KeyframeValue> Serialize for Value<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Default => serializer.serialize_none(),
            Value::Static(v) => v.serialize(serializer),
            Value::Animated(keyframes) => keyframes.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        if let Ok(keyframes) = serde_json::from_value::<Vec<Keyframe<T>>>(v.clone()) {
            return Ok(Value::Animated(keyframes));
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        Ok(Value::Default)
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(
    serialize = "T: Serialize + KeyframeValue",
    deserialize = "T: DeserializeOwned"
))]
pub struct Keyframe<T> {
    pub t: f64,
    #[serde(
        default,
        deserialize_with = "deserialize_keyframe_value",
        serialize_with = "serialize_keyframe_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub s: Option<T>,
    #[serde(
        default,
        deserialize_with = "deserialize_keyframe_value",
        serialize_with = "serialize_keyframe_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub e: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i: Option<BezierTangent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<BezierTangent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ti: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u8>,
}

impl<T> Keyframe<T> {
    /// The time-only entry closing an animated property.
    pub fn sentinel(t: f64) -> Self {
        Keyframe {
            t,
            s: None,
            e: None,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
        }
    }

    /// A keyframe holding `value` until the next keyframe.
    pub fn hold(t: f64, value: T) -> Self {
        Keyframe {
            s: Some(value),
            h: Some(1),
            ..Keyframe::sentinel(t)
        }
    }
}

fn serialize_keyframe_value<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + KeyframeValue,
{
    match value {
        Some(v) if T::is_wrapped() => [v].serialize(serializer),
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
        if let Some(first) = vec.into_iter().next() {
            return Ok(Some(first));
        }
    }

    Ok(None)
}

pub type Vec2 = [f64; 2];

/// Bezier tangent control points for keyframe easing
/// Matches the JSON format: {"x": [0.48], "y": [1]}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BezierTangent {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl BezierTangent {
    pub fn scalar(x: f64, y: f64) -> Self {
        BezierTangent {
            x: vec![x],
            y: vec![y],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
    #[serde(default)]
    pub c: bool,
}

impl BezierPath {
    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn push(&mut self, vertex: Vec2, in_tangent: Vec2, out_tangent: Vec2) {
        self.v.push(vertex);
        self.i.push(in_tangent);
        self.o.push(out_tangent);
    }

    /// Repeats the last vertex until the path has `count` vertices.
    ///
    /// The last vertex's out tangent moves onto the final copy, so the
    /// closing edge keeps its curve and the copies add no visible geometry.
    pub fn pad_to(&mut self, count: usize) {
        let Some(&last) = self.v.last() else {
            return;
        };
        if self.v.len() >= count {
            return;
        }
        let len = self.v.len();
        self.i.resize(len, [0.0, 0.0]);
        self.o.resize(len, [0.0, 0.0]);
        let out = std::mem::replace(&mut self.o[len - 1], [0.0, 0.0]);
        while self.v.len() < count {
            self.push(last, [0.0, 0.0], [0.0, 0.0]);
        }
        if let Some(o) = self.o.last_mut() {
            *o = out;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Asset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Marker {
    #[serde(default)]
    pub cm: Option<String>,
    #[serde(default)]
    pub tm: Option<f64>,
    #[serde(default)]
    pub dr: Option<f64>,
}
