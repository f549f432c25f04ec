//! Patch engine.
//!
//! Pure functions that fold server-issued [`PatchOperation`]s into the ordered
//! component collection. Operations are applied strictly in order, later ones
//! observing the effects of earlier ones. The engine never fails: operations
//! that reference missing components are no-ops and unknown operations are
//! skipped, so redelivered or newer-protocol batches are always safe to apply.
//!
//! Timestamps are server-owned. `updatedAt` only changes when a patch carries
//! it, so every client holding the same patches holds the same components.

use orbit_protocol::{ComponentChanges, PatchOperation, WorkspaceComponent};

/// Apply `ops` to `collection`.
///
/// Deterministic, and redelivering an `add`, `remove` or `update` yields the
/// same collection as delivering it once.
pub fn apply_patches(
    collection: &[WorkspaceComponent],
    ops: &[PatchOperation],
) -> Vec<WorkspaceComponent> {
    let mut items = collection.to_vec();
    for op in ops {
        apply_operation(&mut items, op);
    }
    items
}

/// Build a collection from scratch out of `ops`.
///
/// Used for the answer to a sync request, which replaces local state instead of
/// merging into it.
pub fn replace_all(ops: &[PatchOperation]) -> Vec<WorkspaceComponent> {
    apply_patches(&[], ops)
}

fn apply_operation(items: &mut Vec<WorkspaceComponent>, op: &PatchOperation) {
    match op {
        PatchOperation::Add { component, index } => {
            items.retain(|existing| existing.id != component.id);
            let position = index
                .and_then(|i| usize::try_from(i).ok())
                .filter(|&i| i < items.len());
            match position {
                Some(i) => items.insert(i, component.clone()),
                None => items.push(component.clone()),
            }
        }
        PatchOperation::Remove { component_id } => {
            items.retain(|existing| existing.id != *component_id);
        }
        PatchOperation::Update {
            component_id,
            changes,
        } => {
            if let Some(component) = items.iter_mut().find(|c| c.id == *component_id) {
                merge_changes(component, changes);
            }
        }
        PatchOperation::Reorder {
            component_id,
            new_index,
        } => {
            if let Some(current) = items.iter().position(|c| c.id == *component_id) {
                let component = items.remove(current);
                let target = usize::try_from(*new_index).unwrap_or(0).min(items.len());
                items.insert(target, component);
            }
        }
        PatchOperation::Unknown => {}
    }
}

/// Shallow merge. Fields absent from `changes` are left as they are.
fn merge_changes(component: &mut WorkspaceComponent, changes: &ComponentChanges) {
    let ComponentChanges {
        component_type,
        title,
        description,
        priority,
        date,
        time_slot,
        completed,
        created_at,
        updated_at,
    } = changes;

    if let Some(component_type) = component_type {
        component.component_type = *component_type;
    }
    if let Some(title) = title {
        component.title.clone_from(title);
    }
    if let Some(description) = description {
        component.description = Some(description.clone());
    }
    if let Some(priority) = priority {
        component.priority = *priority;
    }
    if let Some(date) = date {
        component.date = Some(date.clone());
    }
    if let Some(time_slot) = time_slot {
        component.time_slot = Some(time_slot.clone());
    }
    if let Some(completed) = completed {
        component.completed = *completed;
    }
    if let Some(created_at) = created_at {
        component.created_at = *created_at;
    }
    if let Some(updated_at) = updated_at {
        component.updated_at = *updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use orbit_protocol::{ComponentType, Priority};

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 9, 0, 0).unwrap()
    }

    fn component(id: &str) -> WorkspaceComponent {
        WorkspaceComponent {
            id: id.to_string(),
            component_type: ComponentType::Task,
            title: format!("Task {id}"),
            description: Some(format!("About {id}")),
            priority: Priority::Normal,
            date: Some("2026-02-15".to_string()),
            time_slot: Some("morning".to_string()),
            completed: false,
            created_at: created(),
            updated_at: created(),
        }
    }

    fn abc() -> Vec<WorkspaceComponent> {
        vec![component("a"), component("b"), component("c")]
    }

    fn ids(items: &[WorkspaceComponent]) -> Vec<&str> {
        items.iter().map(|c| c.id.as_str()).collect()
    }

    fn add(id: &str, index: Option<i64>) -> PatchOperation {
        PatchOperation::Add {
            component: component(id),
            index,
        }
    }

    fn remove(id: &str) -> PatchOperation {
        PatchOperation::Remove {
            component_id: id.to_string(),
        }
    }

    fn reorder(id: &str, new_index: i64) -> PatchOperation {
        PatchOperation::Reorder {
            component_id: id.to_string(),
            new_index,
        }
    }

    #[test]
    fn test_add_twice_keeps_one_entry() {
        let mut second = component("c1");
        second.title = "Second delivery".to_string();
        let ops = vec![
            add("c1", None),
            PatchOperation::Add {
                component: second,
                index: None,
            },
        ];

        let result = apply_patches(&[], &ops);
        assert_eq!(ids(&result), vec!["c1"]);
        assert_eq!(result[0].title, "Second delivery");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let before = abc();
        let result = apply_patches(&before, &[remove("x")]);
        assert_eq!(result, before);
    }

    #[test]
    fn test_update_preserves_order_and_other_fields() {
        let before = abc();
        let ops = vec![PatchOperation::Update {
            component_id: "b".to_string(),
            changes: ComponentChanges {
                title: Some("Z".to_string()),
                ..Default::default()
            },
        }];

        let result = apply_patches(&before, &ops);
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
        assert_eq!(result[0], before[0]);
        assert_eq!(result[2], before[2]);

        let updated = &result[1];
        assert_eq!(updated.title, "Z");
        assert_eq!(updated.description, before[1].description);
        assert_eq!(updated.date, before[1].date);
        assert_eq!(updated.time_slot, before[1].time_slot);
        assert_eq!(updated.priority, before[1].priority);
        assert_eq!(updated.created_at, before[1].created_at);
        assert_eq!(updated.updated_at, before[1].updated_at);
    }

    #[test]
    fn test_update_uses_server_timestamp_when_given() {
        let stamp = Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap();
        let ops = vec![PatchOperation::Update {
            component_id: "a".to_string(),
            changes: ComponentChanges {
                completed: Some(true),
                updated_at: Some(stamp),
                ..Default::default()
            },
        }];

        let result = apply_patches(&abc(), &ops);
        assert!(result[0].completed);
        assert_eq!(result[0].updated_at, stamp);
    }

    #[test]
    fn test_update_missing_is_noop() {
        let before = abc();
        let ops = vec![PatchOperation::Update {
            component_id: "zz".to_string(),
            changes: ComponentChanges {
                priority: Some(Priority::Urgent),
                ..Default::default()
            },
        }];
        assert_eq!(apply_patches(&before, &ops), before);
    }

    #[test]
    fn test_update_redelivery_is_idempotent() {
        let op = PatchOperation::Update {
            component_id: "c".to_string(),
            changes: ComponentChanges {
                priority: Some(Priority::High),
                ..Default::default()
            },
        };
        let once = apply_patches(&abc(), std::slice::from_ref(&op));
        let twice = apply_patches(&abc(), &[op.clone(), op]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reorder_clamps_to_end() {
        let result = apply_patches(&abc(), &[reorder("a", 99)]);
        assert_eq!(ids(&result), vec!["b", "c", "a"]);
        assert_eq!(result[2].updated_at, created());
    }

    #[test]
    fn test_redelivered_batch_gives_same_collection() {
        let ops = vec![
            PatchOperation::Update {
                component_id: "a".to_string(),
                changes: ComponentChanges {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            },
            reorder("a", 2),
        ];
        let first = apply_patches(&abc(), &ops);
        let redelivered = apply_patches(&first, &ops);
        assert_eq!(first, redelivered);
        assert_eq!(first[2].updated_at, created());
    }

    #[test]
    fn test_reorder_within_bounds_and_negative() {
        let result = apply_patches(&abc(), &[reorder("c", 0)]);
        assert_eq!(ids(&result), vec!["c", "a", "b"]);

        let result = apply_patches(&abc(), &[reorder("b", -4)]);
        assert_eq!(ids(&result), vec!["b", "a", "c"]);

        let result = apply_patches(&abc(), &[reorder("missing", 0)]);
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_at_index_or_append() {
        let result = apply_patches(&abc(), &[add("d", Some(1))]);
        assert_eq!(ids(&result), vec!["a", "d", "b", "c"]);

        let result = apply_patches(&abc(), &[add("e", Some(50))]);
        assert_eq!(ids(&result), vec!["a", "b", "c", "e"]);

        let result = apply_patches(&abc(), &[add("f", Some(-1))]);
        assert_eq!(ids(&result), vec!["a", "b", "c", "f"]);
    }

    #[test]
    fn test_add_existing_id_moves_to_index() {
        let result = apply_patches(&abc(), &[add("c", Some(0))]);
        assert_eq!(ids(&result), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_batch_applies_sequentially() {
        let result = apply_patches(&[], &[add("a", None), remove("a")]);
        assert!(result.is_empty());

        let result = apply_patches(
            &[],
            &[add("a", None), add("b", None), reorder("b", 0), remove("a")],
        );
        assert_eq!(ids(&result), vec!["b"]);
    }

    #[test]
    fn test_unknown_operations_are_skipped() {
        let result = apply_patches(
            &abc(),
            &[PatchOperation::Unknown, remove("b"), PatchOperation::Unknown],
        );
        assert_eq!(ids(&result), vec!["a", "c"]);
    }

    #[test]
    fn test_replace_all_drops_previous_state() {
        let snapshot = vec![add("b", Some(0)), add("c", Some(1))];
        let result = replace_all(&snapshot);
        assert_eq!(ids(&result), vec!["b", "c"]);
        assert!(replace_all(&[]).is_empty());
    }

    #[test]
    fn test_input_collection_untouched() {
        let before = abc();
        let _ = apply_patches(&before, &[remove("a"), reorder("c", 0)]);
        assert_eq!(ids(&before), vec!["a", "b", "c"]);
    }
}
