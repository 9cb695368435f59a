//! Scene Graph Integration Tests
//!
//! Tests for:
//! - Registration, parenting and cycle rejection
//! - Enable state and hierarchy-active propagation
//! - Local/world transforms, dirty propagation, world-position-stays
//! - Node views: axes, look-at, translate, rotate
//! - Snapshots: round trip, JSON, rejection of inconsistent input

use approx::assert_relative_eq;
use glam::{Mat4, Quat, Vec3};
use lumen::core::ids::{GameObjectId, VIRTUAL_ROOT_ID};
use lumen::scene::{LocalTransform, SceneGraph, SceneGraphSnapshot};

fn id(value: u64) -> GameObjectId {
    GameObjectId::new(value)
}

fn graph_with(count: u64) -> SceneGraph {
    let mut graph = SceneGraph::new();
    for value in 1..=count {
        assert!(graph.register_node(id(value)));
    }
    graph
}

fn assert_vec3_eq(a: Vec3, b: Vec3) {
    assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
    assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
    assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
}

// ============================================================================
// Registration & Hierarchy
// ============================================================================

#[test]
fn register_rejects_invalid_and_duplicate_ids() {
    let mut graph = graph_with(1);
    assert!(!graph.register_node(id(1)));
    assert!(!graph.register_node(GameObjectId::INVALID));
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.parent(id(1)), Some(VIRTUAL_ROOT_ID));
}

#[test]
fn cycle_is_rejected_and_graph_unchanged() {
    let mut graph = graph_with(3);
    assert!(graph.set_parent(id(2), id(1), false));
    assert!(graph.set_parent(id(3), id(2), false));
    let before = graph.to_snapshot();

    assert!(!graph.set_parent(id(1), id(3), false));
    assert!(!graph.set_parent(id(1), id(1), false));
    assert_eq!(graph.to_snapshot(), before);
}

#[test]
fn unknown_nodes_cannot_be_parented() {
    let mut graph = graph_with(1);
    assert!(!graph.set_parent(id(1), id(99), false));
    assert!(!graph.set_parent(id(99), id(1), false));
}

#[test]
fn reparenting_moves_child_between_lists() {
    let mut graph = graph_with(3);
    assert!(graph.set_parent(id(3), id(1), false));
    assert_eq!(graph.children(id(1)), Some(&[id(3)][..]));
    assert_eq!(graph.root_children(), &[id(1), id(2)]);

    assert!(graph.set_parent(id(3), id(2), false));
    assert_eq!(graph.children(id(1)), Some(&[][..]));
    assert_eq!(graph.children(id(2)), Some(&[id(3)][..]));

    assert!(graph.clear_parent(id(3), false));
    assert_eq!(graph.root_children(), &[id(1), id(2), id(3)]);
    assert_eq!(graph.children(VIRTUAL_ROOT_ID), Some(&[id(1), id(2), id(3)][..]));
}

#[test]
fn subtree_is_collected_children_first_and_unregistered() {
    let mut graph = graph_with(4);
    graph.set_parent(id(2), id(1), false);
    graph.set_parent(id(3), id(2), false);
    graph.set_parent(id(4), id(1), false);

    assert_eq!(graph.collect_subtree_postorder(id(1)), vec![id(3), id(2), id(4), id(1)]);
    assert!(graph.collect_subtree_postorder(id(42)).is_empty());

    let removed = graph.unregister_subtree(id(2));
    assert_eq!(removed, vec![id(3), id(2)]);
    assert_eq!(graph.children(id(1)), Some(&[id(4)][..]));
    assert!(!graph.has_node(id(3)));
}

// ============================================================================
// Enable State
// ============================================================================

#[test]
fn active_nodes_are_exactly_the_hierarchy_active_ones() {
    let mut graph = graph_with(4);
    graph.set_parent(id(2), id(1), false);
    graph.set_parent(id(3), id(2), false);
    graph.set_enabled(id(2), false);

    let active = graph.active_nodes();
    assert_eq!(active, vec![id(1), id(4)]);
    for node in &active {
        assert!(graph.is_active_in_hierarchy(*node));
    }
    assert!(graph.is_enabled(id(3)));
    assert!(!graph.is_active_in_hierarchy(id(3)));

    graph.set_enabled(id(2), true);
    assert_eq!(graph.active_nodes(), vec![id(1), id(2), id(3), id(4)]);
}

#[test]
fn moving_under_a_disabled_parent_deactivates() {
    let mut graph = graph_with(2);
    graph.set_enabled(id(1), false);
    graph.set_parent(id(2), id(1), false);
    assert!(!graph.is_active_in_hierarchy(id(2)));
    graph.clear_parent(id(2), false);
    assert!(graph.is_active_in_hierarchy(id(2)));
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn world_matrix_composes_parent_chain() {
    let mut graph = graph_with(2);
    graph.set_parent(id(2), id(1), false);
    graph.set_local_position(id(1), Vec3::new(1.0, 0.0, 0.0));
    graph.set_local_scale(id(1), Vec3::splat(2.0));
    graph.set_local_position(id(2), Vec3::new(0.0, 1.0, 0.0));

    let world = graph.world_matrix(id(2)).unwrap();
    assert_vec3_eq(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));

    graph.update_world_transforms();
    assert_eq!(graph.world_matrix(id(2)).unwrap(), world);
    assert!(!graph.record(id(2)).unwrap().is_dirty());
}

#[test]
fn parent_change_marks_children_dirty() {
    let mut graph = graph_with(2);
    graph.set_parent(id(2), id(1), false);
    graph.update_world_transforms();
    graph.set_local_position(id(1), Vec3::new(0.0, 0.0, 5.0));
    assert!(graph.record(id(2)).unwrap().is_dirty());
    assert_vec3_eq(graph.node(id(2)).unwrap().world_position(), Vec3::new(0.0, 0.0, 5.0));
}

#[test]
fn world_position_stays_on_reparent() {
    let mut graph = graph_with(2);
    graph.set_local_transform(
        id(1),
        LocalTransform {
            position: Vec3::new(3.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(90f32.to_radians()),
            scale: Vec3::splat(2.0),
        },
    );
    graph.set_local_position(id(2), Vec3::new(0.0, 1.0, 4.0));

    assert!(graph.set_parent(id(2), id(1), true));
    let node = graph.node(id(2)).unwrap();
    assert_vec3_eq(node.world_position(), Vec3::new(0.0, 1.0, 4.0));
    assert_vec3_eq(node.world_scale(), Vec3::ONE);

    let mut graph_no_keep = graph_with(2);
    graph_no_keep.set_local_position(id(1), Vec3::new(3.0, 0.0, 0.0));
    graph_no_keep.set_local_position(id(2), Vec3::new(0.0, 1.0, 4.0));
    graph_no_keep.set_parent(id(2), id(1), false);
    assert_vec3_eq(
        graph_no_keep.node(id(2)).unwrap().world_position(),
        Vec3::new(3.0, 1.0, 4.0),
    );
}

#[test]
fn local_model_matrix_is_decomposed_into_trs() {
    let mut graph = graph_with(1);
    let matrix = Mat4::from_scale_rotation_translation(
        Vec3::new(1.0, 2.0, 3.0),
        Quat::from_rotation_x(0.5),
        Vec3::new(-1.0, 4.0, 2.0),
    );
    assert!(graph.set_local_model_matrix(id(1), &matrix));
    let local = graph.local_transform(id(1)).unwrap();
    assert_vec3_eq(local.position, Vec3::new(-1.0, 4.0, 2.0));
    assert_vec3_eq(local.scale, Vec3::new(1.0, 2.0, 3.0));
    assert!(local.rotation.angle_between(Quat::from_rotation_x(0.5)) < 1e-4);
}

#[test]
fn set_world_position_under_rotated_parent() {
    let mut graph = graph_with(2);
    graph.set_parent(id(2), id(1), false);
    graph.set_local_rotation(id(1), Quat::from_rotation_z(90f32.to_radians()));
    graph.set_local_position(id(1), Vec3::new(1.0, 1.0, 0.0));
    graph.set_world_position(id(2), Vec3::new(5.0, 5.0, 5.0));
    assert_vec3_eq(graph.node(id(2)).unwrap().world_position(), Vec3::new(5.0, 5.0, 5.0));
}

// ============================================================================
// Node Views
// ============================================================================

#[test]
fn default_axes_follow_the_convention() {
    let graph = graph_with(1);
    let node = graph.node(id(1)).unwrap();
    assert_vec3_eq(node.up(), Vec3::Y);
    assert_vec3_eq(node.right(), Vec3::X);
    assert_vec3_eq(node.front(), Vec3::Z);
    assert_vec3_eq(node.back(), Vec3::NEG_Z);
    assert_vec3_eq(node.down(), Vec3::NEG_Y);
    assert_vec3_eq(node.left(), Vec3::NEG_X);
}

#[test]
fn look_at_point_turns_front_toward_target() {
    let mut graph = graph_with(1);
    let mut node = graph.node_mut(id(1)).unwrap();
    node.set_local_position(Vec3::new(1.0, 0.0, 0.0));
    node.look_at_point(Vec3::new(1.0, 0.0, -10.0));
    assert_vec3_eq(node.front(), Vec3::NEG_Z);

    node.look_at_direction(Vec3::ZERO);
    assert_vec3_eq(node.front(), Vec3::NEG_Z);

    node.look_at_direction(Vec3::X);
    assert_vec3_eq(node.front(), Vec3::X);
}

#[test]
fn look_at_world_accounts_for_parent_rotation() {
    let mut graph = graph_with(2);
    graph.set_parent(id(2), id(1), false);
    graph.set_local_rotation(id(1), Quat::from_rotation_y(90f32.to_radians()));
    graph.node_mut(id(2)).unwrap().look_at_direction_world(Vec3::Y);
    assert_vec3_eq(graph.node(id(2)).unwrap().world_front(), Vec3::Y);
}

#[test]
fn translate_and_rotate() {
    let mut graph = graph_with(1);
    let mut node = graph.node_mut(id(1)).unwrap();
    node.translate(Vec3::X, 2.0).rotate(90.0, Vec3::Y);
    assert_vec3_eq(node.local_position(), Vec3::new(2.0, 0.0, 0.0));
    assert_vec3_eq(node.front(), Vec3::X);

    node.rotate(45.0, Vec3::ZERO);
    assert_vec3_eq(node.front(), Vec3::X);
}

#[test]
fn normal_matrix_undoes_non_uniform_scale() {
    let mut graph = graph_with(1);
    graph.set_local_scale(id(1), Vec3::new(2.0, 1.0, 1.0));
    let normal = graph.node(id(1)).unwrap().normal_matrix();
    assert_vec3_eq(normal.transform_vector3(Vec3::X), Vec3::new(0.5, 0.0, 0.0));
}

// ============================================================================
// Snapshots
// ============================================================================

fn sample_graph() -> SceneGraph {
    let mut graph = graph_with(4);
    graph.set_parent(id(2), id(1), false);
    graph.set_parent(id(4), id(1), false);
    graph.set_parent(id(3), id(2), false);
    graph.set_local_position(id(3), Vec3::new(1.0, 2.0, 3.0));
    graph.set_enabled(id(4), false);
    graph
}

#[test]
fn snapshot_round_trip_reconstructs_the_graph() {
    let graph = sample_graph();
    let snapshot = graph.to_snapshot();
    let rebuilt = SceneGraph::from_snapshot(&snapshot).expect("consistent snapshot");

    assert_eq!(rebuilt.to_snapshot(), snapshot);
    assert_eq!(rebuilt.children(id(1)), graph.children(id(1)));
    assert_eq!(rebuilt.active_nodes(), graph.active_nodes());
    assert_eq!(rebuilt.world_matrix(id(3)), graph.world_matrix(id(3)));
}

#[test]
fn snapshot_survives_json() {
    let snapshot = sample_graph().to_snapshot();
    let text = serde_json::to_string(&snapshot).unwrap();
    let parsed: SceneGraphSnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, snapshot);
}

#[test]
fn inconsistent_snapshots_are_rejected() {
    let snapshot = sample_graph().to_snapshot();

    let mut duplicate = snapshot.clone();
    duplicate.nodes.push(duplicate.nodes[0].clone());
    assert!(SceneGraph::from_snapshot(&duplicate).is_none());

    let mut wrong_parent = snapshot.clone();
    let three = wrong_parent.nodes.iter_mut().find(|node| node.id == id(3)).unwrap();
    three.parent = id(4);
    assert!(SceneGraph::from_snapshot(&wrong_parent).is_none());

    let mut unknown_child = snapshot.clone();
    unknown_child.nodes[0].children.push(id(77));
    assert!(SceneGraph::from_snapshot(&unknown_child).is_none());

    let mut orphan = snapshot;
    orphan.root_children.retain(|root| *root != id(1));
    assert!(SceneGraph::from_snapshot(&orphan).is_none());
}
