pub mod model;

/// Rounds every floating point number in a serialized document to
/// `precision` decimal places. Integers are left untouched.
pub fn round_floats(value: &mut serde_json::Value, precision: u32) {
    match value {
        serde_json::Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    let factor = 10f64.powi(precision as i32);
                    let rounded = (f * factor).round() / factor;
                    if let Some(r) = serde_json::Number::from_f64(rounded) {
                        *n = r;
                    }
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                round_floats(item, precision);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                round_floats(item, precision);
            }
        }
        _ => {}
    }
}
