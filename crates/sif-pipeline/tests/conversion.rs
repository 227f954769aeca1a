use serde_json::{json, Value};
use sif_pipeline::{convert_document, ConvertOptions};

fn scene(extra: Value) -> Value {
    let mut doc = json!({
        "name": "scene",
        "width": 480,
        "height": 270,
        "view_box": [-4.0, 2.25, 4.0, -2.25],
        "fps": 24,
        "begin_time": "0f",
        "end_time": "2s",
        "layers": []
    });
    if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            doc.insert(k.clone(), v.clone());
        }
    }
    doc
}

fn convert(doc: Value) -> Value {
    let doc = sif_data::from_str(&doc.to_string()).unwrap();
    let conv = convert_document(&doc, &ConvertOptions::default());
    assert!(conv.errors.is_empty(), "{:?}", conv.errors);
    serde_json::to_value(&conv.lottie).unwrap()
}

fn straight_line(width: f64) -> Value {
    json!({
        "type": "outline",
        "desc": "line",
        "params": {
            "bline": {"bline": {"loop": false, "entries": [
                {"point": {"vector": [0.0, 0.0]}},
                {"point": {"vector": [2.0, 0.0]}}
            ]}},
            "width": {"real": width},
            "round_tip[0]": {"bool": false},
            "round_tip[1]": {"bool": false}
        }
    })
}

fn ys(path: &Value) -> Vec<f64> {
    path["v"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p[1].as_f64().unwrap())
        .collect()
}

#[test]
fn test_outline_becomes_static_rectangle() {
    let out = convert(scene(json!({"layers": [straight_line(2.0)]})));
    let layer = &out["layers"][0];
    assert_eq!(layer["ty"], json!(4));
    assert_eq!(layer["nm"], json!("line"));

    let group = &layer["shapes"][0];
    assert_eq!(group["ty"], json!("gr"));
    assert_eq!(group["it"][0]["ty"], json!("sh"));
    assert_eq!(group["it"][1]["ty"], json!("fl"));
    assert_eq!(group["it"][2]["ty"], json!("tr"));

    let path = &group["it"][0]["ks"];
    assert_eq!(path["a"], json!(0));
    assert_eq!(path["k"]["c"], json!(true));
    // One unit is 60 pixels and the canvas center sits at (240, 135)
    assert_eq!(ys(&path["k"]), vec![195.0, 195.0, 75.0, 75.0]);
    let xs: Vec<f64> = path["k"]["v"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p[0].as_f64().unwrap())
        .collect();
    assert_eq!(xs, vec![240.0, 360.0, 360.0, 240.0]);
}

#[test]
fn test_animated_star_keeps_vertex_count() {
    let star = json!({
        "type": "star",
        "params": {
            "points": {"animated": {"type": "integer", "waypoints": [
                {"time": "0f", "value": {"integer": 3}},
                {"time": "10f", "value": {"integer": 5}}
            ]}}
        }
    });
    let out = convert(scene(json!({"layers": [star]})));
    let path = &out["layers"][0]["shapes"][0]["it"][0]["ks"];
    assert_eq!(path["a"], json!(1));
    let keyframes = path["k"].as_array().unwrap();
    // Frames 0 through 11, then the closing entry
    assert_eq!(keyframes.len(), 12);
    for kf in &keyframes[..keyframes.len() - 1] {
        assert_eq!(kf["s"][0]["v"].as_array().unwrap().len(), 10);
        assert_eq!(kf["e"][0]["v"].as_array().unwrap().len(), 10);
    }
    assert!(keyframes.last().unwrap().get("s").is_none());
}

#[test]
fn test_animated_amount_keyframes() {
    let circle = json!({
        "type": "circle",
        "params": {
            "amount": {"animated": {"type": "real", "waypoints": [
                {"time": "0s", "value": {"real": 0.0}, "before": "linear", "after": "linear"},
                {"time": "1s", "value": {"real": 1.0}, "before": "linear", "after": "linear"}
            ]}}
        }
    });
    let out = convert(scene(json!({"layers": [circle]})));
    let opacity = &out["layers"][0]["ks"]["o"];
    assert_eq!(opacity["a"], json!(1));
    let k = opacity["k"].as_array().unwrap();
    assert_eq!(k.len(), 2);
    assert_eq!(k[0]["t"], json!(0.0));
    assert_eq!(k[0]["s"], json!([0.0]));
    assert_eq!(k[0]["e"], json!([100.0]));
    assert_eq!(k[1], json!({"t": 24.0}));
}

#[test]
fn test_layers_are_emitted_top_first() {
    let bottom = json!({"type": "circle", "desc": "bottom", "params": {}});
    let top = json!({"type": "rectangle", "desc": "top", "params": {}});
    let out = convert(scene(json!({"layers": [bottom, top]})));
    assert_eq!(out["layers"][0]["nm"], json!("top"));
    assert_eq!(out["layers"][1]["nm"], json!("bottom"));
}

#[test]
fn test_group_becomes_precomposition() {
    let group = json!({
        "type": "group",
        "desc": "holder",
        "params": {
            "transformation": {"transformation": {
                "offset": {"vector": [1.0, 0.0]},
                "angle": {"angle": 30.0},
                "scale": {"vector": [2.0, 2.0]}
            }}
        },
        "canvas": {"layers": [{"type": "circle", "desc": "dot", "params": {}}]}
    });
    let out = convert(scene(json!({"layers": [group]})));
    let layer = &out["layers"][0];
    assert_eq!(layer["ty"], json!(0));
    assert_eq!(layer["refId"], json!("precomp_0"));
    assert_eq!(layer["ks"]["p"]["k"], json!([300.0, 135.0]));
    assert_eq!(layer["ks"]["a"]["k"], json!([240.0, 135.0]));
    assert_eq!(layer["ks"]["r"]["k"], json!(-30.0));
    assert_eq!(layer["ks"]["s"]["k"], json!([200.0, 200.0]));
    assert!(layer.get("tm").is_none());

    let asset = &out["assets"][0];
    assert_eq!(asset["id"], json!("precomp_0"));
    assert_eq!(asset["layers"][0]["nm"], json!("dot"));
    assert!(asset["layers"][0]["ind"].as_u64().unwrap() > layer["ind"].as_u64().unwrap());
}

#[test]
fn test_outline_grow_widens_nested_outlines() {
    let group = json!({
        "type": "group",
        "params": {"outline_grow": {"real": std::f64::consts::LN_2}},
        "canvas": {"layers": [straight_line(2.0)]}
    });
    let out = convert(scene(json!({"layers": [group]})));
    let path = &out["assets"][0]["layers"][0]["shapes"][0]["it"][0]["ks"]["k"];
    let ys = ys(path);
    assert!((ys[0] - 255.0).abs() < 1e-9, "{:?}", ys);
    assert!((ys[2] - 15.0).abs() < 1e-9, "{:?}", ys);
}

#[test]
fn test_switch_shows_named_child() {
    let switch = json!({
        "type": "switch",
        "params": {"layer_name": {"string": "b"}},
        "canvas": {"layers": [
            {"type": "circle", "desc": "a", "params": {}},
            {"type": "circle", "desc": "b", "params": {}}
        ]}
    });
    let out = convert(scene(json!({"layers": [switch]})));
    let children = out["assets"][0]["layers"].as_array().unwrap();
    let fill_opacity = |name: &str| {
        let child = children.iter().find(|l| l["nm"] == json!(name)).unwrap();
        child["shapes"][0]["it"][1]["o"]["k"].clone()
    };
    assert_eq!(fill_opacity("a"), json!(0.0));
    assert_eq!(fill_opacity("b"), json!(100.0));
}

#[test]
fn test_bone_linked_origin() {
    let doc = scene(json!({
        "bones": [{"id": "arm", "origin": {"vector": [1.0, 0.0]}}],
        "layers": [{
            "type": "circle",
            "params": {
                "origin": {"bone_link": {"bone": "arm", "base_value": {"vector": [0.0, 0.0]}}}
            }
        }]
    }));
    let out = convert(doc);
    let p = &out["layers"][0]["shapes"][0]["it"][2]["p"]["k"];
    assert_eq!(p[0].as_f64().unwrap(), 60.0);
    assert_eq!(p[1].as_f64().unwrap(), 0.0);
}

#[test]
fn test_region_color_is_gamma_corrected() {
    let doc = scene(json!({
        "gamma": [2.0, 2.0, 2.0],
        "layers": [{
            "type": "region",
            "params": {
                "color": {"color": [0.25, 1.0, 0.0, 0.5]},
                "bline": {"bline": {"loop": true, "entries": [
                    {"point": {"vector": [0.0, 0.0]}},
                    {"point": {"vector": [1.0, 0.0]}},
                    {"point": {"vector": [0.0, 1.0]}}
                ]}}
            }
        }]
    }));
    let out = convert(doc);
    let fill = &out["layers"][0]["shapes"][0]["it"][1];
    assert_eq!(fill["c"]["k"], json!([0.5, 1.0, 0.0, 0.5]));
    assert_eq!(fill["o"]["k"], json!(100.0));
}
