use super::node::Node;
use super::snapshot::Snapshot;

/// Reconstruct the members of the set stored at `id`
///
/// Every reference-valued field of the node is looked up in the snapshot, in
/// field order. Scalar fields, the metadata field and references to entities
/// that have not arrived yet are skipped. An unknown `id` is an empty set.
pub fn members_of<'a>(snapshot: &'a Snapshot, id: &str) -> Vec<&'a Node> {
    let Some(set) = snapshot.get(id) else {
        return Vec::new();
    };

    set.fields()
        .filter_map(|(_, value)| value.as_reference())
        .filter_map(|reference| {
            let member = snapshot.get(&reference.id);
            if member.is_none() {
                tracing::trace!(set = id, member = %reference.id, "set member not yet received");
            }
            member
        })
        .collect()
}
