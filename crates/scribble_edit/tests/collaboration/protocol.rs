use super::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

#[test]
fn test_client_message_shapes() {
    let submit: ClientMessage = serde_json::from_value(json!({
        "type": "SubmitOp",
        "parent_id": 4,
        "filter": {"kind": "SaturationAdjust", "params": {"factor": 1.5}}
    }))
    .unwrap();
    assert_eq!(
        submit,
        ClientMessage::SubmitOp {
            parent_id: 4,
            filter: Filter::SaturationAdjust { factor: 1.5 },
            mask: None,
            message: None,
        }
    );

    assert_eq!(serde_json::to_value(ClientMessage::Undo).unwrap(), json!({"type": "Undo"}));
    assert_eq!(serde_json::to_value(ClientMessage::Redo { node_id: Some(3) }).unwrap(), json!({"type": "Redo", "node_id": 3}));
    let redo: ClientMessage = serde_json::from_value(json!({"type": "Redo"})).unwrap();
    assert_eq!(redo, ClientMessage::Redo { node_id: None });
}

#[test]
fn test_mask_travels_with_submit() {
    let mut mask = Mask::new(9, 3);
    mask.add_rectangle(1, 1, 7, 1);
    let message = ClientMessage::SubmitOp {
        parent_id: 0,
        filter: Filter::Inpainting { smoothing_passes: 2 },
        mask: Some(mask.clone()),
        message: Some("patch".to_string()),
    };
    let text = serde_json::to_string(&message).unwrap();
    let decoded: ClientMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_server_message_shapes() {
    let conflict = serde_json::to_value(ServerMessage::Conflict { expected_head: 7 }).unwrap();
    assert_eq!(conflict, json!({"type": "Conflict", "expected_head": 7}));

    let rejected = serde_json::to_value(ServerMessage::Rejected {
        reason: RejectReason::NameInUse,
    })
    .unwrap();
    assert_eq!(rejected, json!({"type": "Rejected", "reason": "NameInUse"}));

    let error = serde_json::to_value(ServerMessage::error(ErrorCode::AtRoot, "nothing to undo")).unwrap();
    assert_eq!(error, json!({"type": "Error", "code": "AtRoot", "message": "nothing to undo"}));

    let applied = serde_json::to_value(ServerMessage::Applied {
        node_id: 2,
        parent_id: Some(1),
        filter_kind: Some(FilterKind::Emboss),
        result: AppliedImage::Full {
            image: Image::blank(1, 1).unwrap(),
        },
        author: "a".to_string(),
        cause: ApplyCause::Submit,
    })
    .unwrap();
    assert_eq!(applied["type"], "Applied");
    assert_eq!(applied["filter_kind"], "Emboss");
    assert_eq!(applied["result"]["encoding"], "Full");
    assert_eq!(applied["result"]["image"]["width"], 1);
    assert!(applied["result"]["image"]["data"].is_string());
    assert_eq!(serde_json::to_value(ServerMessage::ServerShutdown).unwrap(), json!({"type": "ServerShutdown"}));
}

#[test]
fn test_joined_round_trip() {
    let joined = ServerMessage::Joined {
        room_name: "r".to_string(),
        participant_id: 3,
        head_node_id: 12,
        head_image: gradient(3, 2),
        participants: vec!["a".to_string(), "b".to_string()],
    };
    let value: Value = serde_json::to_value(&joined).unwrap();
    let back: ServerMessage = serde_json::from_value(value).unwrap();
    assert_eq!(back, joined);
}

#[test]
fn test_corrupt_image_payload_is_rejected() {
    let text = json!({
        "type": "Node",
        "node": {"node_id": 0, "parent_id": null, "filter_kind": null, "author": "", "children": []},
        "image": {"width": 2, "height": 2, "data": "AAAA"}
    });
    assert!(serde_json::from_value::<ServerMessage>(text).is_err());
}
