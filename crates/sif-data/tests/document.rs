use serde_json::json;
use sif_data::{from_reader, from_str, LoadError, Node};

fn scene() -> serde_json::Value {
    json!({
        "version": "1.2",
        "name": "nested",
        "width": 480,
        "height": 270,
        "view_box": [-4.0, 2.25, 4.0, -2.25],
        "fps": 25,
        "begin_time": "0f",
        "end_time": "1s 5f",
        "defs": {
            "radius": {"real": 1.5}
        },
        "bones": [{"id": "root"}],
        "layers": [
            {
                "type": "circle",
                "desc": "dot",
                "params": {
                    "radius": {"reference": "radius"},
                    "color": {"color": [1.0, 0.0, 0.0, 1.0]}
                }
            },
            {
                "type": "group",
                "active": false,
                "params": {},
                "canvas": {
                    "layers": [
                        {
                            "type": "region",
                            "params": {
                                "bline": {"bline": {"loop": true, "entries": [
                                    {"point": {"vector": [0.0, 0.0]}},
                                    {"point": {"vector": [1.0, 0.0]}, "width": {"real": 2.0}},
                                    {"point": {"vector": [0.0, 1.0]}}
                                ]}}
                            }
                        }
                    ]
                }
            }
        ]
    })
}

#[test]
fn test_nested_canvas_survives_loading() {
    let doc = from_str(&scene().to_string()).unwrap();
    assert_eq!(doc.fps, 25.0);
    assert!((doc.end_time.to_seconds(doc.fps).unwrap() - 1.2).abs() < 1e-12);
    assert!(doc.canvas.defs.contains_key("radius"));
    assert_eq!(doc.canvas.bones.len(), 1);

    let group = &doc.canvas.layers[1];
    assert!(!group.active);
    let inner = group.canvas.as_ref().unwrap();
    assert_eq!(inner.layers[0].kind, "region");

    let Some(Node::Bline(bline)) = inner.layers[0].param("bline") else {
        panic!("expected a bline parameter");
    };
    assert!(bline.looped);
    assert_eq!(bline.entries.len(), 3);
    assert!(matches!(bline.entries[0].width, Node::Real(w) if w == 1.0));
    assert!(matches!(bline.entries[1].width, Node::Real(w) if w == 2.0));
    assert!(matches!(bline.entries[0].split_radius, Node::Bool(true)));
    assert!(matches!(bline.entries[0].split_angle, Node::Bool(false)));
}

#[test]
fn test_reader_matches_text() {
    let text = scene().to_string();
    let a = from_str(&text).unwrap();
    let b = from_reader(text.as_bytes()).unwrap();
    assert_eq!(a.canvas.layers.len(), b.canvas.layers.len());
    assert_eq!(a.view_box, b.view_box);
}

#[test]
fn test_bad_document_times_fail() {
    let mut doc = scene();
    doc["end_time"] = json!("soon");
    assert!(matches!(
        from_str(&doc.to_string()),
        Err(LoadError::InvalidTime(t)) if t == "soon"
    ));
}

#[test]
fn test_unknown_node_kind_is_a_parse_error() {
    let mut doc = scene();
    doc["layers"][0]["params"]["radius"] = json!({"mystery": 1.0});
    assert!(matches!(from_str(&doc.to_string()), Err(LoadError::Json(_))));
}
