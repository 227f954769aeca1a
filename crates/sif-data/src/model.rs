use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::LoadError;

/// Root of a scene document.
///
/// Layers are listed bottom-most first, the way the source format stores
/// them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub width: f64,
    pub height: f64,
    pub view_box: [f64; 4], // [left, top, right, bottom] in units
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub begin_time: Time,
    #[serde(default)]
    pub end_time: Time,
    #[serde(default = "default_gamma")]
    pub gamma: [f64; 3],
    #[serde(flatten)]
    pub canvas: Canvas,
}

fn default_fps() -> f64 {
    24.0
}

fn default_gamma() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Canvas {
    #[serde(default)]
    pub defs: BTreeMap<String, Node>, // Exported values, referenced by id
    #[serde(default)]
    pub bones: Vec<Bone>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bone {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>, // None = root
    #[serde(default = "zero_vector")]
    pub origin: Node,
    #[serde(default = "zero_angle")]
    pub angle: Node,
    #[serde(default = "unit_real", alias = "scalelx")]
    pub local_length_scale: Node,
    #[serde(default = "unit_real", alias = "scalex")]
    pub recursive_length_scale: Node,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Layer {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub params: BTreeMap<String, Node>,
    #[serde(default)]
    pub canvas: Option<Canvas>, // group and switch layers
}

impl Layer {
    pub fn param(&self, name: &str) -> Option<&Node> {
        self.params.get(name)
    }
}

/// A time value, either plain seconds or a text such as `"1m 2.5s"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Time {
    Seconds(f64),
    Text(String),
}

impl Default for Time {
    fn default() -> Self {
        Time::Seconds(0.0)
    }
}

impl Time {
    /// Seconds represented by this time.
    ///
    /// Text times are space separated tokens with an `h`, `m`, `s` or `f`
    /// (frames) suffix; a bare number counts as seconds.
    pub fn to_seconds(&self, fps: f64) -> Result<f64, LoadError> {
        match self {
            Time::Seconds(s) => Ok(*s),
            Time::Text(text) => parse_time(text, fps),
        }
    }
}

fn parse_time(text: &str, fps: f64) -> Result<f64, LoadError> {
    let invalid = || LoadError::InvalidTime(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let mut seconds = 0.0;
    for token in trimmed.split_whitespace() {
        let (number, scale) = match token.char_indices().last() {
            Some((idx, 'h')) => (&token[..idx], 3600.0),
            Some((idx, 'm')) => (&token[..idx], 60.0),
            Some((idx, 's')) => (&token[..idx], 1.0),
            Some((idx, 'f')) => {
                if fps <= 0.0 {
                    return Err(invalid());
                }
                (&token[..idx], 1.0 / fps)
            }
            _ => (token, 1.0),
        };
        let value: f64 = number.parse().map_err(|_| invalid())?;
        seconds += value * scale;
    }
    Ok(seconds)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Real,
    Angle,
    Integer,
    Bool,
    Vector,
    Color,
    Gradient,
    Time,
    String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Constant,
    Linear,
    #[serde(alias = "halt")]
    Ease,
    #[serde(alias = "auto")]
    Tcb,
    #[default]
    Clamped,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradientStop {
    pub pos: f64,
    pub color: [f64; 4],
}

/// A value node. Externally tagged: `{"real": 1.5}`, `{"add": {...}}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    // Constants
    Real(f64),
    Angle(f64), // degrees
    Integer(i64),
    Bool(bool),
    Vector([f64; 2]),
    Color([f64; 4]),
    Gradient(Vec<GradientStop>),
    Time(Time),
    String(String),

    Animated(Animated),
    Reference(String), // id into the canvas defs

    // Converts
    Add(Arithmetic),
    Subtract(Arithmetic),
    Average(Entries),
    WeightedAverage(WeightedEntries),
    Switch(Switch),
    Exponential(Exponential),
    Power(Power),
    Cos(Trig),
    Sin(Trig),
    Atan2(Atan2),
    Composite(Composite),
    RadialComposite(RadialComposite),
    Linear(Linear),
    Scale(Scale),
    Reciprocal(Reciprocal),
    VectorLength(VectorOf),
    VectorAngle(VectorOf),
    VectorX(VectorOf),
    VectorY(VectorOf),
    BoneLink(BoneLink),
    Transformation(Transformation),

    // Lists
    Bline(Bline),
    Wplist(WidthPointList),
    Dilist(DashItemList),
    VectorList(Vec<Node>),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Animated {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub waypoints: Vec<WaypointRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WaypointRecord {
    pub time: Time,
    pub value: Box<Node>,
    #[serde(default)]
    pub before: Interpolation,
    #[serde(default)]
    pub after: Interpolation,
    #[serde(default)]
    pub tension: f64,
    #[serde(default)]
    pub continuity: f64,
    #[serde(default)]
    pub bias: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Arithmetic {
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
    #[serde(default = "boxed_unit_real")]
    pub scalar: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Entries {
    pub entries: Vec<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WeightedEntries {
    pub entries: Vec<WeightedEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WeightedEntry {
    pub weight: Node,
    pub value: Node,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Switch {
    pub link_off: Box<Node>,
    pub link_on: Box<Node>,
    pub switch: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Exponential {
    pub exp: Box<Node>,
    #[serde(default = "boxed_unit_real")]
    pub scale: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Power {
    pub base: Box<Node>,
    pub power: Box<Node>,
    #[serde(default = "boxed_epsilon")]
    pub epsilon: Box<Node>,
    #[serde(default = "boxed_infinite")]
    pub infinite: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Trig {
    pub angle: Box<Node>,
    #[serde(default = "boxed_unit_real")]
    pub amp: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Atan2 {
    pub x: Box<Node>,
    pub y: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Composite {
    pub x: Box<Node>,
    pub y: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RadialComposite {
    pub radius: Box<Node>,
    pub theta: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Linear {
    pub slope: Box<Node>,
    pub offset: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Scale {
    pub link: Box<Node>,
    pub scalar: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reciprocal {
    pub link: Box<Node>,
    #[serde(default = "boxed_epsilon")]
    pub epsilon: Box<Node>,
    #[serde(default = "boxed_infinite")]
    pub infinite: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VectorOf {
    pub vector: Box<Node>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoneLink {
    pub bone: String,
    pub base_value: Box<Node>,
    #[serde(default = "default_true")]
    pub translate: bool,
    #[serde(default = "default_true")]
    pub rotate: bool,
    #[serde(default = "default_true")]
    pub scale: bool,
}

/// Offset, rotation, skew and scale of a group layer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transformation {
    #[serde(default = "boxed_zero_vector")]
    pub offset: Box<Node>,
    #[serde(default = "boxed_zero_angle")]
    pub angle: Box<Node>,
    #[serde(default = "boxed_zero_angle")]
    pub skew_angle: Box<Node>,
    #[serde(default = "boxed_unit_vector")]
    pub scale: Box<Node>,
}

impl Default for Transformation {
    fn default() -> Self {
        Transformation {
            offset: boxed_zero_vector(),
            angle: boxed_zero_angle(),
            skew_angle: boxed_zero_angle(),
            scale: boxed_unit_vector(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Activepoint {
    pub time: Time,
    pub on: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bline {
    #[serde(default, rename = "loop")]
    pub looped: bool,
    pub entries: Vec<BlineEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlineEntry {
    pub point: Node,
    #[serde(default = "unit_real")]
    pub width: Node,
    #[serde(default = "half_real")]
    pub origin: Node,
    #[serde(default = "zero_vector")]
    pub t1: Node,
    #[serde(default = "zero_vector")]
    pub t2: Node,
    #[serde(default = "true_bool")]
    pub split_radius: Node,
    #[serde(default = "false_bool")]
    pub split_angle: Node,
    #[serde(default)]
    pub activepoints: Vec<Activepoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WidthPointList {
    #[serde(default, rename = "loop")]
    pub looped: bool,
    #[serde(default)]
    pub entries: Vec<WidthPointEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WidthPointEntry {
    pub position: Node,
    #[serde(default = "unit_real")]
    pub width: Node,
    #[serde(default = "zero_integer")]
    pub side_before: Node,
    #[serde(default = "zero_integer")]
    pub side_after: Node,
    #[serde(default = "zero_real")]
    pub lower_bound: Node,
    #[serde(default = "unit_real")]
    pub upper_bound: Node,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub activepoints: Vec<Activepoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DashItemList {
    #[serde(default)]
    pub entries: Vec<DashItemEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DashItemEntry {
    #[serde(default = "dash_default")]
    pub offset: Node,
    #[serde(default = "dash_default")]
    pub length: Node,
    #[serde(default = "flat_side")]
    pub side_before: Node,
    #[serde(default = "flat_side")]
    pub side_after: Node,
    #[serde(default)]
    pub activepoints: Vec<Activepoint>,
}

fn default_true() -> bool {
    true
}

fn zero_real() -> Node {
    Node::Real(0.0)
}

fn unit_real() -> Node {
    Node::Real(1.0)
}

fn half_real() -> Node {
    Node::Real(0.5)
}

fn dash_default() -> Node {
    Node::Real(0.1)
}

fn zero_vector() -> Node {
    Node::Vector([0.0, 0.0])
}

fn zero_angle() -> Node {
    Node::Angle(0.0)
}

fn zero_integer() -> Node {
    Node::Integer(0)
}

fn flat_side() -> Node {
    Node::Integer(4)
}

fn true_bool() -> Node {
    Node::Bool(true)
}

fn false_bool() -> Node {
    Node::Bool(false)
}

fn boxed_unit_real() -> Box<Node> {
    Box::new(unit_real())
}

fn boxed_zero_vector() -> Box<Node> {
    Box::new(zero_vector())
}

fn boxed_zero_angle() -> Box<Node> {
    Box::new(zero_angle())
}

fn boxed_unit_vector() -> Box<Node> {
    Box::new(Node::Vector([1.0, 1.0]))
}

fn boxed_epsilon() -> Box<Node> {
    Box::new(Node::Real(0.000001))
}

fn boxed_infinite() -> Box<Node> {
    Box::new(Node::Real(999999.0))
}
