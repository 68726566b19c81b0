//! # Registry Property Tests (R0-R4)
//!
//! If ANY tier fails, the registry is INVALID.
//!
//! ## Tiers
//! - R0: Parse Once
//! - R1: Scene Isolation and Merging
//! - R2: Namespaces
//! - R3: Instances
//! - R4: Reset and Concurrency

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use storyreg_core::{DslDocument, SceneId, Story, StoryRegistry, parse_document};

fn doc(source: &str) -> DslDocument {
    parse_document(source, "test").unwrap()
}

// =============================================================================
// TIER R0: PARSE ONCE
// =============================================================================

mod r0_parse_once {
    use super::*;

    /// R0.1: Loading the same key twice scans once, even into another scene.
    #[test]
    fn same_key_scanned_once() {
        let reg: StoryRegistry = StoryRegistry::new();
        let d = doc("story(a) { }; story(b) { };");

        let first = reg.load_document("d.dsl", SceneId(1), None, &d);
        let second = reg.load_document("d.dsl", SceneId(2), None, &d);

        assert!(first.parsed);
        assert!(!second.parsed);
        assert_eq!(reg.scan_count(), 1);
        assert_eq!(
            reg.list_instances(SceneId(1)).unwrap().keys().collect::<Vec<_>>(),
            reg.list_instances(SceneId(2)).unwrap().keys().collect::<Vec<_>>()
        );
    }

    /// R0.2: A changed tree under a cached key is ignored.
    #[test]
    fn changed_tree_ignored() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document("d.dsl", SceneId(1), None, &doc("story(a) { };"));
        let before = reg.list_instances_by_document("d.dsl").unwrap();

        reg.load_document("d.dsl", SceneId(1), None, &doc("story(z) { };"));

        let after = reg.list_instances_by_document("d.dsl").unwrap();
        assert_eq!(after.keys().collect::<Vec<_>>(), vec!["a"]);
        assert!(Arc::ptr_eq(&before["a"], &after["a"]));
        assert!(!reg.instance_exists("z", SceneId(1)));
    }
}

// =============================================================================
// TIER R1: SCENE ISOLATION AND MERGING
// =============================================================================

mod r1_scenes {
    use super::*;

    /// R1.1: Loading into scene A does not touch scene B.
    #[test]
    fn scene_isolation() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document("d.dsl", SceneId(1), None, &doc("story(a) { };"));

        assert!(reg.list_instances(SceneId(2)).is_none());
        assert!(!reg.instance_exists("a", SceneId(2)));
        assert_eq!(reg.scene_ids(), vec![SceneId(1)]);
    }

    /// R1.2: The later document wins a conflict; the earlier document's
    /// cached definition is unchanged.
    #[test]
    fn merge_overwrite() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document("d1.dsl", SceneId(1), None, &doc("story(a) { say(1); };"));
        reg.load_document("d2.dsl", SceneId(1), None, &doc("story(a) { say(2); };"));

        let scene = reg.list_instances(SceneId(1)).unwrap();
        let d1 = reg.list_instances_by_document("d1.dsl").unwrap();
        let d2 = reg.list_instances_by_document("d2.dsl").unwrap();

        assert!(Arc::ptr_eq(&scene["a"], &d2["a"]));
        assert!(!Arc::ptr_eq(&scene["a"], &d1["a"]));
        assert_ne!(d1["a"].script(), d2["a"].script());
    }

    /// R1.3: Scene contents follow load order.
    #[test]
    fn scene_is_function_of_load_order() {
        let d1 = doc("story(a) { say(1); }; story(b) { };");
        let d2 = doc("story(a) { say(2); };");

        let forward: StoryRegistry = StoryRegistry::new();
        forward.load_document("d1", SceneId(1), None, &d1);
        forward.load_document("d2", SceneId(1), None, &d2);

        let backward: StoryRegistry = StoryRegistry::new();
        backward.load_document("d2", SceneId(1), None, &d2);
        backward.load_document("d1", SceneId(1), None, &d1);

        let f = forward.new_instance("a", SceneId(1)).unwrap();
        let b = backward.new_instance("a", SceneId(1)).unwrap();
        assert_eq!(f.script(), d2.nodes[0].functions[0].statements.as_slice());
        assert_eq!(b.script(), d1.nodes[0].functions[0].statements.as_slice());
        assert!(forward.instance_exists("b", SceneId(1)));
        assert!(backward.instance_exists("b", SceneId(1)));
    }
}

// =============================================================================
// TIER R2: NAMESPACES
// =============================================================================

mod r2_namespaces {
    use super::*;

    /// R2.1: "intro" under "npc1" is "npc1:intro"; without a namespace it
    /// stays "intro".
    #[test]
    fn namespace_composition() {
        let d = doc("story(intro) { };");

        let with_ns: StoryRegistry = StoryRegistry::new();
        with_ns.load_document("d.dsl", SceneId(1), Some("npc1"), &d);
        assert!(with_ns.instance_exists("npc1:intro", SceneId(1)));
        assert!(!with_ns.instance_exists("intro", SceneId(1)));

        let without: StoryRegistry = StoryRegistry::new();
        without.load_document("d.dsl", SceneId(1), None, &d);
        assert!(without.instance_exists("intro", SceneId(1)));
    }

    /// R2.2: Two namespaces keep same-named stories apart in one scene.
    #[test]
    fn namespaces_disambiguate() {
        let reg: StoryRegistry = StoryRegistry::new();
        let d = doc("story(intro) { };");
        reg.load_document("npc1.dsl", SceneId(1), Some("npc1"), &d);
        reg.load_document("npc2.dsl", SceneId(1), Some("npc2"), &d);

        let ids: Vec<_> = reg
            .list_instances(SceneId(1))
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(ids, vec!["npc1:intro", "npc2:intro"]);
    }
}

// =============================================================================
// TIER R3: INSTANCES
// =============================================================================

mod r3_instances {
    use super::*;

    /// R3.1: Two instances never alias each other or the definition.
    #[test]
    fn clone_independence() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document("d.dsl", SceneId(1), None, &doc("story(a) { };"));

        let mut first = reg.new_instance("a", SceneId(1)).unwrap();
        let second = reg.new_instance("a", SceneId(1)).unwrap();
        first.set_variable("hp", "10");
        first.terminate();
        first.set_story_id("renamed".to_string());

        assert!(second.variable("hp").is_none());
        assert!(!second.is_terminated());
        let cached = &reg.list_instances(SceneId(1)).unwrap()["a"];
        assert!(cached.variables().is_empty());
        assert_eq!(cached.story_id(), "a");
    }

    /// R3.2: Unknown story or scene is absent, not a default instance.
    #[test]
    fn absence_semantics() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document("d.dsl", SceneId(1), None, &doc("story(a) { };"));

        assert!(reg.new_instance("b", SceneId(1)).is_none());
        assert!(!reg.instance_exists("b", SceneId(1)));
        assert!(reg.new_instance("a", SceneId(2)).is_none());
        assert!(!reg.instance_exists("a", SceneId(2)));
    }

    /// R3.3: End-to-end: greet + farewell into scene 1.
    #[test]
    fn end_to_end() {
        let reg: StoryRegistry = StoryRegistry::new();
        reg.load_document(
            "greetings.dsl",
            SceneId(1),
            None,
            &doc("story(greet) { say(\"hi\"); };\nstory(farewell) { say(\"bye\"); };"),
        );

        assert!(reg.instance_exists("greet", SceneId(1)));
        assert_eq!(reg.list_instances(SceneId(1)).unwrap().len(), 2);
        assert!(reg.new_instance("greet", SceneId(1)).is_some());
        assert!(reg.new_instance("greet", SceneId(2)).is_none());
    }
}

// =============================================================================
// TIER R4: RESET AND CONCURRENCY
// =============================================================================

mod r4_reset_and_concurrency {
    use super::*;

    /// R4.1: clear_all drops every story and forces a re-parse.
    #[test]
    fn clear_resets_reachability() {
        let reg: StoryRegistry = StoryRegistry::new();
        let d = doc("story(a) { };");
        reg.load_document("d.dsl", SceneId(1), None, &d);
        let kept = reg.new_instance("a", SceneId(1)).unwrap();

        reg.clear_all();
        assert!(!reg.instance_exists("a", SceneId(1)));
        assert_eq!(kept.story_id(), "a");

        let again = reg.load_document("d.dsl", SceneId(1), None, &d);
        assert!(again.parsed);
        assert_eq!(reg.scan_count(), 1);
    }

    /// R4.2: Parallel loads into distinct scenes each see their own stories,
    /// and a shared document is scanned exactly once.
    #[test]
    fn concurrent_loads() {
        let reg = StoryRegistry::<storyreg_core::StoryInstance>::shared();
        let shared = doc("story(common) { };");

        std::thread::scope(|scope| {
            for scene in 0..8 {
                let reg = Arc::clone(&reg);
                let shared = &shared;
                scope.spawn(move || {
                    let own = doc(&format!("story(s{}) {{ }};", scene));
                    reg.load_document(&format!("scene{}.dsl", scene), SceneId(scene), None, &own);
                    reg.load_document("common.dsl", SceneId(scene), None, shared);
                    for _ in 0..50 {
                        assert!(reg.new_instance("common", SceneId(scene)).is_some());
                    }
                });
            }
        });

        assert_eq!(reg.scan_count(), 9);
        for scene in 0..8 {
            let ids: Vec<_> = reg
                .list_instances(SceneId(scene))
                .unwrap()
                .keys()
                .cloned()
                .collect();
            assert_eq!(ids, vec!["common".to_string(), format!("s{}", scene)]);
        }
    }
}
