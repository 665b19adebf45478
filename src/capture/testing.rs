//! Capture fixtures shared by unit tests.

use serde_json::{Value, json};

use super::Capture;

fn source_locations() -> Value {
    json!({
        "1": { "name": "A", "function": "do_a", "file": "a.cc", "line": 3 },
        "2": { "name": "B", "function": "do_b", "file": "b.cc", "line": 7 },
        "3": { "function": "dispatch" },
    })
}

/// One CPU thread running A [0, 10) and B [10, 30), with a nested A [15, 20)
/// inside B.
pub(crate) fn single_thread() -> Capture {
    Capture::from_value(json!({
        "name": "single",
        "cpu_arch": "x86_64",
        "source_locations": source_locations(),
        "threads": [{
            "id": 4242,
            "name": "main",
            "timeline": {
                "storage": "inline",
                "events": [
                    { "zone": 1, "start": 0, "end": 10 },
                    { "zone": 2, "start": 10, "end": 30, "children": 0 },
                ],
            },
        }],
        "child_lists": [
            { "storage": "inline", "events": [{ "zone": 1, "start": 15, "end": 20 }] },
        ],
    }))
    .expect("fixture is valid")
}

/// Two CPU threads and one GPU stream. Thread `main` nests three levels deep,
/// `worker` has no name and only top-level zones, and the GPU stream shares
/// the raw id 0 with the first CPU thread's compressed id.
///
/// With `indirect` set, every list is stored as indices into the event pools;
/// otherwise events are stored inline. Both encodings describe the same trace.
pub(crate) fn multi_thread(indirect: bool) -> Capture {
    let main_top = vec![
        json!({ "zone": 2, "start": 0, "end": 100, "children": 0 }),
        json!({ "zone": 1, "start": 120, "end": 150 }),
    ];
    let main_children = vec![
        json!({ "zone": 1, "start": 10, "end": 40, "children": 1 }),
        json!({ "zone": 3, "start": 50, "end": 50 }),
    ];
    let grandchildren = vec![json!({ "zone": 3, "start": 20, "end": 30 })];
    let worker_top = vec![
        json!({ "zone": 1, "start": 5, "end": 25 }),
        json!({ "zone": 1, "start": 20, "end": 60 }),
    ];
    let gpu_top = vec![
        json!({ "zone": 3, "start": 30, "end": 70 }),
        json!({ "zone": 3, "start": 80, "end": 90 }),
    ];

    let mut cpu_pool = Vec::new();
    let mut gpu_pool = Vec::new();
    let encode = |events: Vec<Value>, pool: &mut Vec<Value>| {
        if indirect {
            let indices: Vec<usize> = events
                .into_iter()
                .map(|event| {
                    pool.push(event);
                    pool.len() - 1
                })
                .collect();
            json!({ "storage": "indirect", "events": indices })
        } else {
            json!({ "storage": "inline", "events": events })
        }
    };

    let main_timeline = encode(main_top, &mut cpu_pool);
    let child_list_0 = encode(main_children, &mut cpu_pool);
    let child_list_1 = encode(grandchildren, &mut cpu_pool);
    let worker_timeline = encode(worker_top, &mut cpu_pool);
    let gpu_timeline = encode(gpu_top, &mut gpu_pool);

    Capture::from_value(json!({
        "name": "multi",
        "cpu_arch": "aarch64",
        "source_locations": source_locations(),
        "threads": [
            { "id": 100, "name": "main", "timeline": main_timeline },
            { "id": 200, "timeline": worker_timeline },
            { "id": 300, "name": "idle" },
        ],
        "gpu_threads": [
            { "id": 0, "name": "queue", "timeline": gpu_timeline },
        ],
        "cpu_event_pool": cpu_pool,
        "gpu_event_pool": gpu_pool,
        "child_lists": [child_list_0, child_list_1],
    }))
    .expect("fixture is valid")
}

/// One CPU thread whose single event nests `depth` levels below the top
/// through a chain of child lists, all spanning [0, 100).
pub(crate) fn deep_chain(depth: u32) -> Capture {
    let child_lists: Vec<Value> = (0..depth)
        .map(|index| {
            let mut event = json!({ "zone": 1, "start": 0, "end": 100 });
            if index + 1 < depth {
                event["children"] = json!(index + 1);
            }
            json!({ "storage": "inline", "events": [event] })
        })
        .collect();
    let mut root = json!({ "zone": 1, "start": 0, "end": 100 });
    if depth > 0 {
        root["children"] = json!(0);
    }

    Capture::from_value(json!({
        "name": "deep",
        "source_locations": source_locations(),
        "threads": [{
            "id": 1,
            "name": "main",
            "timeline": { "storage": "inline", "events": [root] },
        }],
        "child_lists": child_lists,
    }))
    .expect("fixture is valid")
}
