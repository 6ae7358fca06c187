use super::*;
use pretty_assertions::assert_eq;
use std::sync::Barrier;

fn blur() -> Filter {
    Filter::GaussianBlur { size: 3, sigma: 1.0 }
}

#[test]
fn test_two_participant_session() {
    let room = blank_room(2, 2);
    let mut a = join(&room, "A");
    let mut b = join(&room, "B");
    assert_eq!(room.head(), 0);

    assert_eq!(room.submit(a.id, 0, blur(), None, None), Ok(1));
    assert_eq!(
        room.submit(b.id, 0, Filter::EdgeDetection { size: 3 }, None, None),
        Err(RoomError::Conflict {
            submitted: 0,
            expected_head: 1
        })
    );
    assert_eq!(room.submit(b.id, 1, Filter::EdgeDetection { size: 3 }, None, None), Ok(2));
    assert_eq!(room.undo(a.id), Ok(1));
    assert_eq!(room.submit(a.id, 1, Filter::SaturationAdjust { factor: 0.5 }, None, None), Ok(3));

    assert_eq!(room.head(), 3);
    room.with_tree(|tree| {
        assert_eq!(tree.children_of(1), &[2, 3]);
        assert!(tree.is_side_node(3));
        assert_eq!(tree.len(), 4);
    });

    let expected = vec![(1, ApplyCause::Submit), (2, ApplyCause::Submit), (1, ApplyCause::Undo), (3, ApplyCause::Submit)];
    assert_eq!(a.applied(), expected);
    assert_eq!(b.applied(), expected);
}

#[test]
fn test_join_order_and_participant_lists() {
    let room = blank_room(3, 3);
    let mut a = join(&room, "A");
    let mut b = join(&room, "B");

    let first = b.drain();
    match &first[0] {
        ServerMessage::Joined {
            participant_id,
            head_node_id,
            participants,
            head_image,
            ..
        } => {
            assert_eq!(*participant_id, b.id);
            assert_eq!(*head_node_id, 0);
            assert_eq!(participants, &vec!["A".to_string(), "B".to_string()]);
            assert_eq!(head_image, &Image::blank(3, 3).unwrap());
        }
        other => panic!("expected Joined, got {other:?}"),
    }
    assert_eq!(
        first[1],
        ServerMessage::Participants {
            names: vec!["A".to_string(), "B".to_string()]
        }
    );

    assert_eq!(room.leave(b.id), Some(1));
    assert_eq!(room.leave(b.id), None);
    let last = a.drain().pop().unwrap();
    assert_eq!(last, ServerMessage::Participants { names: vec!["A".to_string()] });
}

#[test]
fn test_name_in_use_and_room_full() {
    let room = Room::new(
        "small",
        Image::blank(2, 2).unwrap(),
        RoomConfig {
            max_participants: 2,
            send_diffs: false,
        },
    );
    let _a = join(&room, "A");
    assert_eq!(join_with_capacity(&room, "A", 8).err(), Some(RoomError::NameInUse("A".to_string())));
    let _b = join(&room, "B");
    assert_eq!(join_with_capacity(&room, "C", 8).err(), Some(RoomError::RoomFull(2)));
    assert_eq!(room.participant_count(), 2);
}

#[test]
fn test_validation_errors_leave_room_unchanged() {
    let room = blank_room(4, 4);
    let mut a = join(&room, "A");
    a.drain();

    let bad_kernel = room.submit(a.id, 0, Filter::MeanBlur { size: 4 }, None, None);
    assert!(matches!(bad_kernel, Err(RoomError::Filter(FilterError::InvalidFilterParameters(_)))));

    let bad_mask = room.submit(a.id, 0, Filter::Invert, Some(Mask::new(2, 2)), None);
    assert!(matches!(bad_mask, Err(RoomError::Filter(FilterError::DimensionMismatch { .. }))));

    assert_eq!(room.submit(a.id, 9, Filter::Invert, None, None), Err(RoomError::UnknownParent(9)));
    assert_eq!(room.undo(a.id), Err(RoomError::AtRoot));
    assert_eq!(room.submit(77, 0, Filter::Invert, None, None), Err(RoomError::NotJoined(77)));

    assert_eq!(room.head(), 0);
    assert_eq!(room.with_tree(VersionTree::len), 1);
    assert!(a.drain().is_empty());
}

#[test]
fn test_undo_redo() {
    let room = blank_room(2, 2);
    let mut a = join(&room, "A");
    let n1 = room.submit(a.id, 0, Filter::Invert, None, None).unwrap();
    let n2 = room.submit(a.id, n1, Filter::Grayscale, None, None).unwrap();

    assert_eq!(room.undo(a.id), Ok(n1));
    assert_eq!(room.undo(a.id), Ok(0));
    assert_eq!(room.undo(a.id), Err(RoomError::AtRoot));
    assert_eq!(room.redo(a.id, None), Ok(n1));
    assert_eq!(room.redo(a.id, None), Ok(n2));
    assert_eq!(room.redo(a.id, None), Err(RoomError::NoChildren(n2)));

    assert_eq!(room.undo(a.id), Ok(n1));
    let n3 = room.submit(a.id, n1, Filter::FlipHorizontal, None, None).unwrap();
    assert_eq!(room.undo(a.id), Ok(n1));
    // Without an explicit target the newest child wins.
    assert_eq!(room.redo(a.id, None), Ok(n3));
    assert_eq!(room.undo(a.id), Ok(n1));
    assert_eq!(room.redo(a.id, Some(n2)), Ok(n2));
    assert_eq!(room.redo(a.id, Some(n1)), Err(RoomError::NotAChild { node_id: n1, head: n2 }));
    assert_eq!(room.redo(a.id, Some(99)), Err(RoomError::UnknownNode(99)));

    // Undone nodes stay in the tree.
    assert_eq!(room.with_tree(VersionTree::len), 4);
    let causes: Vec<ApplyCause> = a.applied().into_iter().map(|(_, cause)| cause).collect();
    assert_eq!(causes.iter().filter(|c| **c == ApplyCause::Redo).count(), 4);
}

#[test]
fn test_undo_broadcasts_full_image_of_new_head() {
    let room = blank_room(2, 2);
    let mut a = join(&room, "A");
    room.submit(a.id, 0, Filter::Invert, None, None).unwrap();
    a.drain();
    room.undo(a.id).unwrap();
    match a.drain().pop() {
        Some(ServerMessage::Applied {
            node_id,
            parent_id,
            result: AppliedImage::Full { image },
            author,
            cause: ApplyCause::Undo,
            ..
        }) => {
            assert_eq!(node_id, 0);
            assert_eq!(parent_id, None);
            assert_eq!(image, Image::blank(2, 2).unwrap());
            assert_eq!(author, "A");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_diffs_rebuild_head_image() {
    let room = Room::new(
        "diffs",
        gradient(8, 6),
        RoomConfig {
            max_participants: 0,
            send_diffs: true,
        },
    );
    let mut a = join(&room, "A");
    a.drain();
    let mut region = Mask::new(8, 6);
    region.add_rectangle(2, 1, 3, 2);
    let id = room.submit(a.id, 0, Filter::Invert, Some(region), None).unwrap();

    let Some(ServerMessage::Applied { result, .. }) = a.drain().pop() else {
        panic!("no Applied message");
    };
    let AppliedImage::Diff { diff } = &result else {
        panic!("expected a diff, got {result:?}");
    };
    assert_eq!((diff.x, diff.y, diff.width, diff.height), (2, 1, 3, 2));
    let rebuilt = result.resolve(&gradient(8, 6)).unwrap();
    assert_eq!(rebuilt, room.node(id).unwrap().1);
}

#[test]
fn test_rotation_is_sent_as_full_image() {
    let room = Room::new(
        "turn",
        gradient(8, 6),
        RoomConfig {
            max_participants: 0,
            send_diffs: true,
        },
    );
    let mut a = join(&room, "A");
    a.drain();
    let id = room.submit(a.id, 0, Filter::RotateClockwise, None, None).unwrap();

    let Some(ServerMessage::Applied { result, .. }) = a.drain().pop() else {
        panic!("no Applied message");
    };
    let AppliedImage::Full { image } = &result else {
        panic!("expected a full image, got {result:?}");
    };
    assert_eq!(image.dimensions(), (6, 8));
    assert_eq!(&room.head_image(), image);

    let masked = room.submit(a.id, id, Filter::RotateClockwise, Some(Mask::full(6, 8)), None);
    assert!(matches!(masked, Err(RoomError::Filter(FilterError::InvalidFilterParameters(_)))));
}

#[test]
fn test_queries() {
    let room = Room::new("q", gradient(6, 6), RoomConfig::default());
    let a = join(&room, "A");
    let n1 = room.submit(a.id, 0, Filter::Invert, None, Some("first".to_string())).unwrap();
    let n2 = room.submit(a.id, n1, Filter::Grayscale, None, None).unwrap();

    let history = room.history(None).unwrap();
    assert_eq!(history.iter().map(|n| n.node_id).collect::<Vec<_>>(), vec![n2, n1, 0]);
    assert_eq!(history[1].message.as_deref(), Some("first"));
    assert_eq!(history[1].filter_kind, Some(FilterKind::Invert));
    assert_eq!(room.history(Some(n1)).unwrap().len(), 2);
    assert_eq!(room.history(Some(50)).unwrap_err(), RoomError::UnknownNode(50));

    let (summary, image) = room.node(n1).unwrap();
    assert_eq!(summary.children, vec![n2]);
    assert_eq!(image, Filter::Invert.apply(&gradient(6, 6), None).unwrap());

    let (node_id, mask) = room.select(Some(0), 0, 0, 255).unwrap();
    assert_eq!(node_id, 0);
    assert_eq!(mask.count(), 36);
    assert_eq!(room.select(None, 0, 0, 0).unwrap().0, n2);
    assert!(matches!(room.select(None, 6, 0, 0), Err(RoomError::Filter(_))));
}

#[tokio::test]
async fn test_slow_consumer_is_dropped() {
    let room = blank_room(2, 2);
    let mut fast = join(&room, "fast");
    // Joined and the participant list fill this queue completely.
    let slow = join_with_capacity(&room, "slow", 2).unwrap();

    let id = room.submit(fast.id, 0, Filter::Invert, None, None).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), slow.shed.notified())
        .await
        .expect("slow participant was not signalled");

    assert_eq!(room.participant_names(), vec!["fast".to_string()]);
    let messages = fast.drain();
    assert!(messages.iter().any(|m| matches!(m, ServerMessage::Applied { node_id, .. } if *node_id == id)));
    assert_eq!(messages.last(), Some(&ServerMessage::Participants { names: vec!["fast".to_string()] }));
    assert_eq!(room.submit(slow.id, id, Filter::Invert, None, None), Err(RoomError::NotJoined(slow.id)));
}

#[test]
fn test_concurrent_submissions_on_same_head() {
    const WRITERS: usize = 12;
    let room = blank_room(16, 16);
    let mut participants: Vec<TestParticipant> = (0..WRITERS).map(|i| join(&room, &format!("p{i}"))).collect();
    let ids: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
    let barrier = Barrier::new(WRITERS);

    let results: Vec<Result<NodeId, RoomError>> = std::thread::scope(|s| {
        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let room = &room;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    room.submit(id, 0, Filter::MeanBlur { size: 5 }, None, None)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let accepted: Vec<NodeId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(accepted, vec![1]);
    for result in &results {
        if let Err(err) = result {
            assert_eq!(
                err,
                &RoomError::Conflict {
                    submitted: 0,
                    expected_head: 1
                }
            );
        }
    }
    assert_eq!(room.with_tree(VersionTree::len), 2);
    for p in &mut participants {
        assert_eq!(p.applied(), vec![(1, ApplyCause::Submit)]);
    }
}

#[test]
fn test_concurrent_writers_see_one_total_order() {
    const WRITERS: usize = 6;
    const EDITS: usize = 5;
    let room = blank_room(8, 8);
    let mut participants: Vec<TestParticipant> = (0..WRITERS).map(|i| join(&room, &format!("w{i}"))).collect();
    let ids: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();

    std::thread::scope(|s| {
        for &id in &ids {
            let room = &room;
            s.spawn(move || {
                let mut head = 0;
                let mut done = 0;
                while done < EDITS {
                    match room.submit(id, head, Filter::Brightness { delta: 1 }, None, None) {
                        Ok(node) => {
                            head = node;
                            done += 1;
                        }
                        Err(RoomError::Conflict { expected_head, .. }) => head = expected_head,
                        Err(err) => panic!("unexpected error {err}"),
                    }
                }
            });
        }
    });

    let total = (WRITERS * EDITS) as NodeId;
    assert_eq!(room.head(), total);
    room.with_tree(|tree| {
        // Every accepted edit extended the previous head, so the history is one chain.
        for id in 1..=total {
            assert_eq!(tree.get(id).unwrap().parent, Some(id - 1));
        }
    });
    let reference = participants[0].applied();
    assert_eq!(reference.len(), WRITERS * EDITS);
    for p in &mut participants[1..] {
        assert_eq!(p.applied(), reference);
    }
}
