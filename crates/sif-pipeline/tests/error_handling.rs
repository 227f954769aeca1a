use serde_json::{json, Value};
use sif_core::ConvertError;
use sif_pipeline::{convert_document, Conversion, ConvertOptions};

fn convert(bones: Value, layers: Value) -> Conversion {
    let doc = json!({
        "width": 480,
        "height": 270,
        "view_box": [-4.0, 2.25, 4.0, -2.25],
        "fps": 24,
        "end_time": "2s",
        "bones": bones,
        "layers": layers
    });
    let doc = sif_data::from_str(&doc.to_string()).unwrap();
    convert_document(&doc, &ConvertOptions::default())
}

fn names(conv: &Conversion) -> Vec<String> {
    conv.lottie
        .layers
        .iter()
        .filter_map(|l| l.nm.clone())
        .collect()
}

fn circle(name: &str) -> Value {
    json!({"type": "circle", "desc": name, "params": {}})
}

#[test]
fn test_dangling_reference_drops_only_its_layer() {
    let broken = json!({
        "type": "circle",
        "desc": "broken",
        "params": {"radius": {"reference": "missing"}}
    });
    let conv = convert(json!([]), json!([circle("below"), broken, circle("above")]));
    assert_eq!(names(&conv), vec!["above", "below"]);
    assert_eq!(conv.errors.len(), 1);
    assert_eq!(conv.errors[0].layer, "broken");
    assert!(matches!(
        &conv.errors[0].source,
        ConvertError::DanglingReference { id, .. } if id == "missing"
    ));
    assert!(conv.has_fatal());
}

#[test]
fn test_dangling_bone_link() {
    let linked = json!({
        "type": "circle",
        "desc": "hand",
        "params": {"origin": {"bone_link": {"bone": "ghost", "base_value": {"vector": [0.0, 0.0]}}}}
    });
    let conv = convert(json!([]), json!([linked]));
    assert!(conv.lottie.layers.is_empty());
    assert_eq!(
        conv.errors[0].source,
        ConvertError::DanglingBone {
            bone: "ghost".into(),
            layer: "hand".into()
        }
    );
}

#[test]
fn test_bone_cycle_is_reported_on_the_linking_layer() {
    let bones = json!([
        {"id": "a", "parent": "b"},
        {"id": "b", "parent": "a"}
    ]);
    let linked = json!({
        "type": "circle",
        "desc": "hand",
        "params": {"origin": {"bone_link": {"bone": "a", "base_value": {"vector": [0.0, 0.0]}}}}
    });
    let conv = convert(bones, json!([linked, circle("free")]));
    assert_eq!(names(&conv), vec!["free"]);
    assert_eq!(conv.errors.len(), 1);
    assert_eq!(conv.errors[0].layer, "hand");
    assert!(matches!(conv.errors[0].source, ConvertError::BoneCycle { .. }));
}

#[test]
fn test_missing_bline() {
    let conv = convert(json!([]), json!([{"type": "region", "desc": "blob", "params": {}}]));
    assert_eq!(
        conv.errors[0].source,
        ConvertError::MissingParam {
            layer: "blob".into(),
            param: "bline".into()
        }
    );
    assert!(conv.has_fatal());
}

#[test]
fn test_single_point_region_is_omitted_silently() {
    let dot = json!({
        "type": "region",
        "params": {"bline": {"bline": {"loop": true, "entries": [
            {"point": {"vector": [1.0, 1.0]}}
        ]}}}
    });
    let conv = convert(json!([]), json!([dot]));
    assert!(conv.lottie.layers.is_empty());
    assert!(conv.errors.is_empty());
}

#[test]
fn test_unsupported_layer_is_not_fatal() {
    let conv = convert(
        json!([]),
        json!([{"type": "text", "desc": "title", "params": {}}, circle("dot")]),
    );
    assert_eq!(names(&conv), vec!["dot"]);
    assert_eq!(conv.errors.len(), 1);
    assert!(matches!(conv.errors[0].source, ConvertError::Unsupported { .. }));
    assert!(!conv.has_fatal());
}

#[test]
fn test_invalid_waypoint_time() {
    let layer = json!({
        "type": "circle",
        "desc": "pulse",
        "params": {"radius": {"animated": {"type": "real", "waypoints": [
            {"time": "soon", "value": {"real": 1.0}}
        ]}}}
    });
    let conv = convert(json!([]), json!([layer]));
    assert!(conv.lottie.layers.is_empty());
    assert_eq!(conv.errors[0].source, ConvertError::InvalidTime("soon".into()));
    assert!(conv.errors[0].is_fatal());
}

#[test]
fn test_errors_inside_groups_keep_the_group() {
    let group = json!({
        "type": "group",
        "desc": "holder",
        "canvas": {"layers": [
            circle("kept"),
            {"type": "circle", "desc": "broken", "params": {"radius": {"reference": "nope"}}}
        ]}
    });
    let conv = convert(json!([]), json!([group]));
    assert_eq!(names(&conv), vec!["holder"]);
    let inner: Vec<_> = conv.lottie.assets[0]
        .layers
        .iter()
        .filter_map(|l| l.nm.clone())
        .collect();
    assert_eq!(inner, vec!["kept"]);
    assert_eq!(conv.errors[0].layer, "broken");
}
